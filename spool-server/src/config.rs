//! Service configuration
//!
//! All configuration comes from environment variables, read once at startup.
//! The printer is never reconfigured mid-run.

use std::path::PathBuf;

/// Printer interface selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterInterface {
    Usb,
    Tcp,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub http_port: u16,
    /// Queue state directory (holds queue.json and job payloads)
    pub queue_dir: PathBuf,

    // Printer
    pub interface: PrinterInterface,
    pub tcp_host: String,
    pub tcp_port: u16,
    /// 0 means autodetect
    pub usb_vendor_id: u16,
    /// 0 means autodetect
    pub usb_product_id: u16,
    /// Device file override for the USB fallback backend
    pub usb_device_path: Option<PathBuf>,

    // Rendering
    /// Target raster width: 384 dots for 58mm paper, 576 for 80mm
    pub paper_width_px: u32,
    /// PDF rasterization DPI; 203 is standard for 58mm thermal heads
    pub raster_dpi: u32,

    // Worker
    /// Idle polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Print a welcome ticket at startup to validate connectivity
    pub startup_selftest: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let interface = match std::env::var("PRINTER_IF")
            .unwrap_or_else(|_| "usb".into())
            .to_lowercase()
            .as_str()
        {
            "tcp" => PrinterInterface::Tcp,
            _ => PrinterInterface::Usb,
        };

        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            queue_dir: std::env::var("QUEUE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),

            interface,
            tcp_host: std::env::var("PRINTER_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            tcp_port: std::env::var("PRINTER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9100),
            usb_vendor_id: std::env::var("USB_VENDOR")
                .ok()
                .and_then(|v| parse_id(&v))
                .unwrap_or(0),
            usb_product_id: std::env::var("USB_PRODUCT")
                .ok()
                .and_then(|v| parse_id(&v))
                .unwrap_or(0),
            usb_device_path: std::env::var("USB_DEVICE").ok().map(PathBuf::from),

            paper_width_px: std::env::var("PAPER_WIDTH_PX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(384),
            raster_dpi: std::env::var("RASTER_DPI")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(203),

            poll_interval_ms: std::env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            startup_selftest: std::env::var("STARTUP_SELFTEST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Interface name as reported by the health endpoint
    pub fn interface_name(&self) -> &'static str {
        match self.interface {
            PrinterInterface::Usb => "usb",
            PrinterInterface::Tcp => "tcp",
        }
    }
}

/// Parse a USB id, accepting both decimal and 0x-prefixed hex
fn parse_id(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_decimal_and_hex() {
        assert_eq!(parse_id("1208"), Some(1208));
        assert_eq!(parse_id("0x04b8"), Some(0x04b8));
        assert_eq!(parse_id("garbage"), None);
    }
}
