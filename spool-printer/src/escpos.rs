//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::raster::MonoBitmap;

/// Rows per GS v 0 block. The height field is 16-bit, so taller bitmaps
/// are emitted as consecutive bands.
const MAX_BAND_ROWS: u32 = 0xFFFF;

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. A full print job is
/// assembled as `new()` (which emits the init sequence) + one `raster_image`
/// per page + `feed` + `cut`, so the whole job goes out as a single buffer.
pub struct EscPosBuilder {
    buf: Vec<u8>,
}

impl EscPosBuilder {
    /// Create a new builder, emitting the initialize command (ESC @)
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(4096);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf }
    }

    // === Text Output ===

    /// Write raw text bytes
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Feed paper by n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        // ESC d n - Print and feed n lines
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Align to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    // === Raster Images ===

    /// Append a packed 1-bpp bitmap as a GS v 0 raster block
    ///
    /// Bit 1 in the bitmap means "print dot", matching the command's
    /// data polarity. Bitmaps taller than the 16-bit height field are
    /// split into consecutive bands, which print seamlessly.
    pub fn raster_image(&mut self, bitmap: &MonoBitmap) -> &mut Self {
        let bytes_per_row = bitmap.bytes_per_row();
        let mut row = 0u32;

        while row < bitmap.height() {
            let band_rows = (bitmap.height() - row).min(MAX_BAND_ROWS);

            // GS v 0 m xL xH yL yH
            self.buf.extend_from_slice(&[0x1D, 0x76, 0x30, 0x00]);
            self.buf.push((bytes_per_row & 0xFF) as u8);
            self.buf.push((bytes_per_row >> 8) as u8);
            self.buf.push((band_rows & 0xFF) as u8);
            self.buf.push((band_rows >> 8) as u8);

            let start = row as usize * bytes_per_row;
            let end = (row + band_rows) as usize * bytes_per_row;
            self.buf.extend_from_slice(&bitmap.data()[start..end]);

            row += band_rows;
        }
        self
    }

    // === QR Code ===

    /// Print a QR code
    ///
    /// Size: 1-16 (module size in dots)
    pub fn qr_code(&mut self, data: &str, size: u8) -> &mut Self {
        let size = size.clamp(1, 16);

        // Function 165: Select model (Model 2)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x31, 0x00]);

        // Function 167: Set module size
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);

        // Function 169: Set error correction (L)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x31]);

        // Function 180: Store data
        let data_bytes = data.as_bytes();
        let len = data_bytes.len() + 3;
        let p_l = (len & 0xFF) as u8;
        let p_h = ((len >> 8) & 0xFF) as u8;
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
        self.buf.extend_from_slice(data_bytes);

        // Function 181: Print
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);

        self
    }

    // === Paper Control ===

    /// Cut paper (full cut)
    pub fn cut(&mut self) -> &mut Self {
        // GS V 0 - Full cut
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    /// Full cut with feed — feeds n lines then cuts.
    /// Uses GS V 66 n, which lets the printer manage cutter-to-head distance.
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        // GS V 66 n - Full cut after feeding n lines
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, lines]);
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Reset printer to default state
    pub fn reset(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x40]);
        self
    }

    // === Build ===

    /// Build the final byte buffer
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_sequence() {
        let b = EscPosBuilder::new();
        assert_eq!(b.build(), vec![0x1B, 0x40]);
    }

    #[test]
    fn test_builder_basic() {
        let mut b = EscPosBuilder::new();
        b.center()
            .double_size()
            .line("RECEIPT")
            .reset_size()
            .left()
            .line("content");

        let data = b.build();
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("RECEIPT"));
        assert!(s.contains("content"));
    }

    #[test]
    fn test_raster_header() {
        // 16x2 all-black bitmap -> 2 bytes per row
        let bitmap = MonoBitmap::from_fn(16, 2, |_, _| true);
        let mut b = EscPosBuilder::new();
        b.raster_image(&bitmap);

        let data = b.build();
        // Skip ESC @
        assert_eq!(&data[2..6], &[0x1D, 0x76, 0x30, 0x00]);
        // xL xH = 2, 0; yL yH = 2, 0
        assert_eq!(&data[6..10], &[0x02, 0x00, 0x02, 0x00]);
        // 4 data bytes, all ones
        assert_eq!(&data[10..], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_qr_length_fields() {
        let url = "http://192.168.1.10:8080/";
        let mut b = EscPosBuilder::new();
        b.qr_code(url, 12);

        let data = b.build();
        let needle: &[u8] = &[0x31, 0x50, 0x30];
        let pos = data
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("store-data function present");
        // pL pH precede "1P0"
        let p_l = data[pos - 2];
        let p_h = data[pos - 1];
        assert_eq!(u16::from_le_bytes([p_l, p_h]) as usize, url.len() + 3);
    }

    #[test]
    fn test_cut_commands() {
        let mut b = EscPosBuilder::new();
        b.cut();
        assert!(b.build().ends_with(&[0x1D, 0x56, 0x00]));

        let mut b = EscPosBuilder::new();
        b.cut_feed(4);
        assert!(b.build().ends_with(&[0x1D, 0x56, 0x42, 4]));
    }

    #[test]
    fn test_feed() {
        let mut b = EscPosBuilder::new();
        b.feed(4);
        assert!(b.build().ends_with(&[0x1B, 0x64, 4]));
    }
}
