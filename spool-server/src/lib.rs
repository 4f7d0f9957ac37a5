//! ESC/POS print-spooling service
//!
//! Accepts documents (PDF or raster images) over HTTP, converts them to
//! monochrome printer-native bytes and delivers them to a thermal printer
//! over TCP or USB - one job at a time, surviving restarts without losing
//! or duplicating work.
//!
//! # Module structure
//!
//! ```text
//! spool-server/src/
//! ├── config/     # Environment configuration
//! ├── queue/      # Durable FIFO job queue (queue.json)
//! ├── worker/     # Sequential print worker
//! ├── rasterize/  # PDF -> page images (pdftoppm)
//! ├── printer/    # Transport selection (TCP / USB)
//! ├── selftest/   # Startup welcome ticket
//! ├── routes/     # HTTP API (axum)
//! └── error/      # API error envelope
//! ```

pub mod config;
pub mod error;
pub mod printer;
pub mod queue;
pub mod rasterize;
pub mod routes;
pub mod selftest;
pub mod state;
pub mod worker;

// Re-export public types
pub use config::{Config, PrinterInterface};
pub use error::{AppError, AppResponse};
pub use printer::PrinterLink;
pub use queue::{JobState, PrintJob, PrintQueue, QueueError, QueueSnapshot, SourceKind};
pub use state::AppState;
pub use worker::PrintWorker;

/// Initialize the logger
///
/// `RUST_LOG` controls the filter; defaults to `info`.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}
