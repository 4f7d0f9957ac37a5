//! Health and queue status routes

use crate::queue::QueueSnapshot;
use crate::state::AppState;
use axum::{Json, extract::State};
use serde::Serialize;
use spool_printer::ProbeReport;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    pending_jobs: usize,
    recent_completed: usize,
    printer: PrinterHealth,
}

#[derive(Serialize)]
pub struct PrinterHealth {
    interface: &'static str,
    paper_width_px: u32,
    #[serde(flatten)]
    probe: ProbeReport,
}

/// `GET /health` - service liveness plus printer reachability
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.queue.snapshot();
    let probe = state.link.probe().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pending_jobs: snapshot.pending_count,
        recent_completed: snapshot.recent_completed.len(),
        printer: PrinterHealth {
            interface: state.config.interface_name(),
            paper_width_px: state.config.paper_width_px,
            probe,
        },
    })
}

/// `GET /queue` - full queue snapshot (pending + recent completed)
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueSnapshot> {
    Json(state.queue.snapshot())
}
