//! End-to-end worker tests against a device-file printer
//!
//! The USB transport falls back to writing the kernel printer device file;
//! pointing that at a temp file captures exactly the bytes a printer would
//! receive. Vendor/product ids are set to values no real device carries so
//! the direct backend never matches, even on hosts with USB printers.

use image::{DynamicImage, GrayImage, Luma};
use spool_printer::{EscPosBuilder, to_thermal_mono};
use spool_server::config::{Config, PrinterInterface};
use spool_server::printer::PrinterLink;
use spool_server::queue::{JobState, JobSummary, PrintQueue, SourceKind};
use spool_server::worker::PrintWorker;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const PAPER_WIDTH: u32 = 384;

fn test_config(queue_dir: &Path, device_path: &Path) -> Config {
    Config {
        http_port: 0,
        queue_dir: queue_dir.to_path_buf(),
        interface: PrinterInterface::Usb,
        tcp_host: "127.0.0.1".into(),
        tcp_port: 9100,
        usb_vendor_id: 0xfff0,
        usb_product_id: 0xfff0,
        usb_device_path: Some(device_path.to_path_buf()),
        paper_width_px: PAPER_WIDTH,
        raster_dpi: 203,
        poll_interval_ms: 25,
        startup_selftest: false,
    }
}

fn white_page() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(PAPER_WIDTH, 48, Luma([255u8])))
}

/// Poll the queue until the job shows up in the completed cache
async fn wait_for_completion(queue: &PrintQueue, id: Uuid) -> JobSummary {
    for _ in 0..200 {
        let snapshot = queue.snapshot();
        if let Some(job) = snapshot.recent_completed.iter().find(|j| j.id == id) {
            return job.clone();
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {id} did not complete within the deadline");
}

#[tokio::test]
async fn image_job_reaches_the_printer() {
    let dir = tempfile::tempdir().unwrap();
    let device_file = tempfile::NamedTempFile::new().unwrap();
    let config = test_config(dir.path(), device_file.path());

    let queue = Arc::new(PrintQueue::open(&config.queue_dir).unwrap());
    let link = Arc::new(PrinterLink::from_config(&config).unwrap());

    let payload = queue.jobs_dir().join("page.png");
    white_page().save(&payload).unwrap();
    let id = queue
        .enqueue(SourceKind::Image, "127.0.0.1", "page.png", &payload)
        .unwrap();

    let shutdown = CancellationToken::new();
    let worker = PrintWorker::new(queue.clone(), link, config.clone());
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    let job = wait_for_completion(&queue, id).await;
    assert_eq!(
        job.state,
        JobState::Printed,
        "job failed: {:?}",
        job.error_message
    );

    shutdown.cancel();
    handle.await.unwrap();

    // The payload is deleted after processing
    assert!(!payload.exists());

    // The device file holds exactly one job: init, one raster block, feed, cut
    let expected = {
        let bitmap = to_thermal_mono(&white_page(), PAPER_WIDTH);
        let mut b = EscPosBuilder::new();
        b.raster_image(&bitmap).feed(4).cut();
        b.build()
    };
    let written = std::fs::read(device_file.path()).unwrap();
    assert_eq!(written, expected);
}

#[tokio::test]
async fn failed_job_does_not_stall_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    let device_file = tempfile::NamedTempFile::new().unwrap();
    let config = test_config(dir.path(), device_file.path());

    let queue = Arc::new(PrintQueue::open(&config.queue_dir).unwrap());
    let link = Arc::new(PrinterLink::from_config(&config).unwrap());

    // First job's payload is missing, it must fail at image conversion
    let bad_id = queue
        .enqueue(
            SourceKind::Image,
            "127.0.0.1",
            "gone.png",
            queue.jobs_dir().join("gone.png"),
        )
        .unwrap();

    let payload = queue.jobs_dir().join("ok.png");
    white_page().save(&payload).unwrap();
    let good_id = queue
        .enqueue(SourceKind::Image, "127.0.0.1", "ok.png", &payload)
        .unwrap();

    let shutdown = CancellationToken::new();
    let worker = PrintWorker::new(queue.clone(), link, config);
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    let bad = wait_for_completion(&queue, bad_id).await;
    assert_eq!(bad.state, JobState::Error);
    assert!(
        bad.error_message
            .as_deref()
            .unwrap_or_default()
            .starts_with("image conversion failed"),
        "unexpected error message: {:?}",
        bad.error_message
    );

    // The worker keeps draining the queue after a failure
    let good = wait_for_completion(&queue, good_id).await;
    assert_eq!(good.state, JobState::Printed);

    shutdown.cancel();
    handle.await.unwrap();

    // Only the successful job's bytes reached the device
    let expected = {
        let bitmap = to_thermal_mono(&white_page(), PAPER_WIDTH);
        let mut b = EscPosBuilder::new();
        b.raster_image(&bitmap).feed(4).cut();
        b.build()
    };
    assert_eq!(std::fs::read(device_file.path()).unwrap(), expected);
}
