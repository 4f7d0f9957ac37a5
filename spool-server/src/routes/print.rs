//! Print submission handler
//!
//! Accepts a PDF or raster image as a multipart upload, stores the payload
//! in the jobs directory and enqueues a print job. Enqueue is O(1) and
//! never waits on the printer.

use crate::error::{AppError, AppResponse, ok};
use crate::queue::{JobState, SourceKind};
use crate::state::AppState;
use axum::Json;
use axum::extract::{ConnectInfo, Multipart, State};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

/// Image extensions handled without rasterization
const IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Submission response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub state: JobState,
}

/// `POST /print` - enqueue a document for printing
pub async fn submit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<Json<AppResponse<SubmitResponse>>, AppError> {
    // Find the file field
    let mut field_data: Option<Vec<u8>> = None;
    let mut original_filename = None;

    while let Some(f) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart request: {}", e)))?
    {
        let name = f.name().map(|s| s.to_string());
        if name.as_deref() == Some("file") || name.as_deref() == Some("") {
            original_filename = f.file_name().map(|s| s.to_string());
            field_data = Some(
                f.bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Multipart error: {}", e)))?
                    .to_vec(),
            );
            break;
        }
    }

    let data = field_data.ok_or_else(|| {
        AppError::validation("No 'file' field found. Field name must be 'file'".to_string())
    })?;

    let filename = original_filename
        .ok_or_else(|| AppError::validation("No filename provided in file field".to_string()))?;

    if data.is_empty() {
        return Err(AppError::validation("Empty file provided".to_string()));
    }

    let ext = PathBuf::from(&filename)
        .extension()
        .and_then(|ext| ext.to_str().map(|s| s.to_lowercase()))
        .ok_or_else(|| AppError::validation(format!("Invalid file extension for: {}", filename)))?;

    let kind = classify(&ext)?;
    if kind == SourceKind::Image {
        // Reject undecodable uploads before they reach the worker
        image::load_from_memory(&data)
            .map_err(|e| AppError::validation(format!("Invalid image file ({}): {}", ext, e)))?;
    }

    // Store the payload under a fresh name; the worker deletes it after
    // processing
    let payload_path = state
        .queue
        .jobs_dir()
        .join(format!("{}.{}", Uuid::new_v4(), ext));
    std::fs::write(&payload_path, &data)
        .map_err(|e| AppError::internal(format!("Failed to save payload: {}", e)))?;

    let id = match state
        .queue
        .enqueue(kind, addr.ip().to_string(), &filename, &payload_path)
    {
        Ok(id) => id,
        Err(e) => {
            let _ = std::fs::remove_file(&payload_path);
            return Err(e.into());
        }
    };

    tracing::info!(
        job_id = %id,
        kind = ?kind,
        filename = %filename,
        client = %addr.ip(),
        size = data.len(),
        "print job enqueued"
    );

    Ok(ok(SubmitResponse {
        id,
        state: JobState::Pending,
    }))
}

fn classify(ext: &str) -> Result<SourceKind, AppError> {
    if ext == "pdf" {
        Ok(SourceKind::Pdf)
    } else if IMAGE_FORMATS.contains(&ext) {
        Ok(SourceKind::Image)
    } else {
        Err(AppError::validation(format!(
            "Unsupported file format '{}'. Supported: pdf, {}",
            ext,
            IMAGE_FORMATS.join(", ")
        )))
    }
}
