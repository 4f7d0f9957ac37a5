//! # spool-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building (text, raster images, QR codes, cut/feed)
//! - Image-to-monochrome conversion tuned for thermal paper
//!   (brightness normalization, auto-levels, Floyd-Steinberg dithering)
//! - Network printing (TCP port 9100)
//! - USB printing (libusb bulk transfer, `/dev/usb/lp*` fallback)
//!
//! Business logic (WHAT to print, job queueing) should stay in application
//! code - see `spool-server`.
//!
//! ## Example
//!
//! ```ignore
//! use spool_printer::{EscPosBuilder, TcpTransport, Transport, to_thermal_mono};
//!
//! let img = image::open("page.png")?;
//! let bitmap = to_thermal_mono(&img, 384);
//!
//! let mut builder = EscPosBuilder::new();
//! builder.raster_image(&bitmap);
//! builder.feed(4);
//! builder.cut();
//!
//! let printer = TcpTransport::new("192.168.1.100", 9100)?;
//! printer.send(&builder.build()).await?;
//! ```

mod error;
mod escpos;
mod raster;
mod transport;
mod usb;

// Re-exports
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use raster::{MonoBitmap, to_thermal_mono};
pub use transport::{ProbeReport, TcpTransport, Transport};
pub use usb::UsbTransport;
