//! Sequential print worker
//!
//! A single long-lived task drains the queue: claim one job, run it through
//! rasterization, image conversion, ESC/POS encoding and transport, record
//! the outcome, then claim the next. Jobs never overlap by construction -
//! a thermal printer cannot interleave two raster streams. A failed job is
//! terminal; the client resubmits.

use crate::config::Config;
use crate::printer::PrinterLink;
use crate::queue::{PrintJob, PrintQueue, SourceKind};
use crate::rasterize::{self, RasterizeError};
use crate::selftest;
use spool_printer::{EscPosBuilder, PrintError, to_thermal_mono};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lines fed before the cut so it clears the printed content
const FEED_BEFORE_CUT: u8 = 4;

/// Per-job failure, labelled with the stage that failed
#[derive(Debug, Error)]
enum StageError {
    #[error("rasterization failed: {0}")]
    Rasterize(#[from] RasterizeError),

    #[error("image conversion failed: {0}")]
    Convert(String),

    #[error("transport failed: {0}")]
    Transport(#[from] PrintError),
}

/// The single background print worker
pub struct PrintWorker {
    queue: Arc<PrintQueue>,
    link: Arc<PrinterLink>,
    config: Config,
}

impl PrintWorker {
    pub fn new(queue: Arc<PrintQueue>, link: Arc<PrinterLink>, config: Config) -> Self {
        Self {
            queue,
            link,
            config,
        }
    }

    /// Run the worker loop until the token is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!("print worker started");

        if self.config.startup_selftest {
            match selftest::print_welcome_ticket(&self.link, &self.config).await {
                Ok(()) => info!("startup self-test ticket printed"),
                Err(e) => warn!(error = %e, "startup self-test failed, continuing"),
            }
        }

        let poll = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let claimed = match self.queue.claim_next() {
                Ok(job) => job,
                Err(e) => {
                    error!(error = %e, "failed to claim next job");
                    None
                }
            };

            match claimed {
                Some(job) => self.process(job).await,
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(poll) => {}
                    }
                }
            }
        }

        info!("print worker stopped");
    }

    /// Process one claimed job to completion
    async fn process(&self, job: PrintJob) {
        info!(
            job_id = %job.id,
            kind = ?job.kind,
            filename = %job.original_filename,
            "processing print job"
        );

        let mut temp_files = vec![job.payload_path.clone()];
        let outcome = self.execute(&job, &mut temp_files).await;

        // Temporary payloads go away whatever the outcome
        for path in temp_files {
            if let Err(e) = std::fs::remove_file(&path)
                && path.exists()
            {
                warn!(path = %path.display(), error = %e, "failed to delete temp file");
            }
        }

        let recorded = match outcome {
            Ok(()) => {
                info!(job_id = %job.id, "job printed");
                self.queue.mark_printed(job.id)
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job failed");
                self.queue.mark_error(job.id, e.to_string())
            }
        };

        if let Err(e) = recorded {
            error!(job_id = %job.id, error = %e, "failed to record job outcome");
        }
    }

    /// The per-job pipeline: resolve pages, convert, encode, send
    async fn execute(
        &self,
        job: &PrintJob,
        temp_files: &mut Vec<PathBuf>,
    ) -> Result<(), StageError> {
        let pages = match job.kind {
            SourceKind::Pdf => {
                let pages = rasterize::pdf_to_pages(
                    &job.payload_path,
                    self.queue.jobs_dir(),
                    self.config.raster_dpi,
                )
                .await?;
                temp_files.extend(pages.iter().cloned());
                pages
            }
            SourceKind::Image => vec![job.payload_path.clone()],
        };

        // One buffer for the whole job: init once, one raster block per
        // page, a cut at the end - sent as a single uninterrupted write.
        let mut builder = EscPosBuilder::new();
        for page in &pages {
            let img = image::open(page)
                .map_err(|e| StageError::Convert(format!("{}: {}", page.display(), e)))?;
            let bitmap = to_thermal_mono(&img, self.config.paper_width_px);
            builder.raster_image(&bitmap);
        }
        builder.feed(FEED_BEFORE_CUT);
        builder.cut();

        self.link.send(&builder.build()).await?;
        Ok(())
    }
}
