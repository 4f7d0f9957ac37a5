//! Image-to-monochrome conversion for thermal printing
//!
//! Converts arbitrary raster images into packed 1-bpp bitmaps sized to the
//! paper width. The pipeline runs in a fixed order: Lanczos resize, grayscale,
//! brightness normalization, auto-levels (percentile stretch), then
//! Floyd-Steinberg error-diffusion dithering. Error diffusion is what keeps
//! photos and gradients printable on thermal paper; plain thresholding turns
//! them into solid blocks.

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::debug;

/// Mean luminance below which an image is considered too dark
const DARK_MEAN: f32 = 100.0;

/// Mean luminance above which an image is considered too light
const LIGHT_MEAN: f32 = 180.0;

/// Contrast boost applied when brightness is corrected (+30%)
const CONTRAST_FACTOR: f32 = 1.3;

/// Brightness factor applied to overly light images
const DARKEN_FACTOR: f32 = 0.85;

/// Percentile bounds for the auto-levels stretch
const LEVELS_LO_PCT: f32 = 0.02;
const LEVELS_HI_PCT: f32 = 0.98;

/// A packed 1-bit-per-pixel bitmap, row-major, MSB first
///
/// Bit 1 means "print dot" (black), matching the polarity of the
/// ESC/POS GS v 0 raster command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MonoBitmap {
    /// Build a bitmap from a per-pixel predicate (true = print dot)
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let bytes_per_row = (width as usize).div_ceil(8);
        let mut data = vec![0u8; bytes_per_row * height as usize];
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    data[y as usize * bytes_per_row + (x / 8) as usize] |= 1 << (7 - (x % 8));
                }
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Bitmap width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bitmap height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed bytes per row
    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Packed bit data, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the dot at (x, y) is set
    pub fn get(&self, x: u32, y: u32) -> bool {
        let byte = self.data[y as usize * self.bytes_per_row() + (x / 8) as usize];
        byte & (1 << (7 - (x % 8))) != 0
    }

    /// Number of set (printed) dots
    pub fn count_set(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }
}

/// Convert an image to a monochrome bitmap sized to the paper width
///
/// Height preserves the aspect ratio. Images narrower or wider than the
/// target are always rescaled, never cropped.
pub fn to_thermal_mono(img: &DynamicImage, paper_width_px: u32) -> MonoBitmap {
    let (w, h) = (img.width(), img.height());

    let resized = if w != paper_width_px {
        let new_h = ((paper_width_px as f64 * h as f64 / w as f64).round() as u32).max(1);
        img.resize_exact(paper_width_px, new_h, FilterType::Lanczos3)
    } else {
        img.clone()
    };

    let gray = resized.to_luma8();
    let (width, height) = gray.dimensions();

    // Work in f32 so diffusion error can go below 0 / above 255
    let mut px: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32).collect();

    normalize_brightness(&mut px);
    auto_levels(&mut px);
    floyd_steinberg(&mut px, width as usize, height as usize);

    debug!(width, height, "image converted to monochrome");

    MonoBitmap::from_fn(width, height, |x, y| {
        // After dithering every pixel is 0 or 255; 0 = black = print dot
        px[y as usize * width as usize + x as usize] < 128.0
    })
}

/// Brightness normalization
///
/// Dark images (mean < 100) are brightened proportionally to how far the
/// mean is below the threshold; light images (mean > 180) are slightly
/// darkened. Either correction is followed by a +30% contrast boost around
/// the midpoint. Mid-range images pass through untouched, as do zero-variance
/// images: a solid fill carries no content to correct, and pushing it toward
/// the midpoint would make flat white pages dither to speckle.
fn normalize_brightness(px: &mut [f32]) {
    if px.is_empty() {
        return;
    }
    let first = px[0];
    if px.iter().all(|&v| v == first) {
        return;
    }
    let mean = px.iter().sum::<f32>() / px.len() as f32;

    let brightness = if mean < DARK_MEAN {
        1.0 + (DARK_MEAN - mean) / 200.0
    } else if mean > LIGHT_MEAN {
        DARKEN_FACTOR
    } else {
        return;
    };

    for v in px.iter_mut() {
        let adjusted = *v * brightness;
        let contrasted = (adjusted - 128.0) * CONTRAST_FACTOR + 128.0;
        *v = contrasted.clamp(0.0, 255.0);
    }
}

/// Auto-levels (histogram stretch)
///
/// Remaps the 2nd..98th percentile intensity range to 0..255, clamping.
/// A flat histogram (uniform image) is a no-op rather than a divide-by-zero.
fn auto_levels(px: &mut [f32]) {
    if px.is_empty() {
        return;
    }

    let mut sorted = px.to_vec();
    sorted.sort_by(f32::total_cmp);

    let last = sorted.len() - 1;
    let lo = sorted[(last as f32 * LEVELS_LO_PCT).round() as usize];
    let hi = sorted[(last as f32 * LEVELS_HI_PCT).round() as usize];

    if hi - lo < 1.0 {
        return;
    }

    let scale = 255.0 / (hi - lo);
    for v in px.iter_mut() {
        *v = ((*v - lo) * scale).clamp(0.0, 255.0);
    }
}

/// Floyd-Steinberg error-diffusion dithering
///
/// Raster scan order; each pixel is thresholded at 128 and its quantization
/// error distributed to the not-yet-visited neighbors with weights
/// 7/16 (right), 3/16 (below-left), 5/16 (below), 1/16 (below-right).
fn floyd_steinberg(px: &mut [f32], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = px[idx];
            let new = if old > 127.0 { 255.0 } else { 0.0 };
            px[idx] = new;
            let error = old - new;

            if x + 1 < width {
                px[idx + 1] += error * 7.0 / 16.0;
            }
            if y + 1 < height {
                if x > 0 {
                    px[idx + width - 1] += error * 3.0 / 16.0;
                }
                px[idx + width] += error * 5.0 / 16.0;
                if x + 1 < width {
                    px[idx + width + 1] += error * 1.0 / 16.0;
                }
            }
        }
    }
}
