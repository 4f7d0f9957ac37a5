//! PDF rasterization glue
//!
//! PDFs are rasterized by the external `pdftoppm` tool (poppler-utils), one
//! PNG per page. This layer only shells out and collects the generated
//! files; the core pipeline consumes them as plain images.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("failed to run pdftoppm: {0}")]
    Spawn(std::io::Error),

    #[error("pdftoppm exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("PDF produced no page images")]
    NoPages,
}

/// Rasterize a PDF into one PNG per page, returned in page order
pub async fn pdf_to_pages(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, RasterizeError> {
    let stem = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string());
    let prefix = format!("{stem}_page");

    info!(pdf = %pdf_path.display(), dpi, "rasterizing PDF");

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(pdf_path)
        .arg(out_dir.join(&prefix))
        .output()
        .await
        .map_err(RasterizeError::Spawn)?;

    if !output.status.success() {
        return Err(RasterizeError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let pages = collect_pages(out_dir, &prefix);
    if pages.is_empty() {
        return Err(RasterizeError::NoPages);
    }

    info!(pages = pages.len(), "PDF rasterized");
    Ok(pages)
}

/// Collect `<prefix>-N.png` files in numeric page order
///
/// pdftoppm zero-pads the page number once a document has 10+ pages, so the
/// suffix is parsed numerically rather than matched textually.
fn collect_pages(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut pages: Vec<(u32, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let page_num: u32 = name
                .strip_prefix(prefix)?
                .strip_prefix('-')?
                .strip_suffix(".png")?
                .parse()
                .ok()?;
            Some((page_num, e.path()))
        })
        .collect();

    pages.sort_by_key(|(n, _)| *n);
    pages.into_iter().map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_pages_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["doc.pdf_page-2.png", "doc.pdf_page-1.png", "doc.pdf_page-3.png"] {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }
        // Unrelated files are ignored
        std::fs::write(dir.path().join("other.png"), b"png").unwrap();

        let pages = collect_pages(dir.path(), "doc.pdf_page");
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            ["doc.pdf_page-1.png", "doc.pdf_page-2.png", "doc.pdf_page-3.png"]
        );
    }

    #[test]
    fn test_collect_pages_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["big.pdf_page-09.png", "big.pdf_page-10.png", "big.pdf_page-11.png"] {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }

        let pages = collect_pages(dir.path(), "big.pdf_page");
        assert_eq!(pages.len(), 3);
        assert!(pages[0].to_string_lossy().ends_with("-09.png"));
        assert!(pages[2].to_string_lossy().ends_with("-11.png"));
    }

    #[test]
    fn test_collect_pages_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_pages(dir.path(), "x_page").is_empty());
    }
}
