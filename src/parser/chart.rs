// src/parser/chart.rs

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::errors::ParseError;

/// Produces image files for the charts of a PDF.
#[async_trait]
pub trait ChartExtractor: Send + Sync {
    async fn extract(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ParseError>;
}

/// Chart extraction switched off.
pub struct NoChartExtractor;

#[async_trait]
impl ChartExtractor for NoChartExtractor {
    async fn extract(&self, _pdf: &Path, _out_dir: &Path) -> Result<Vec<PathBuf>, ParseError> {
        Ok(Vec::new())
    }
}

/// Rasterises every PDF page to `page-N.png` with poppler's `pdftoppm`.
pub struct PdftoppmChartExtractor {
    command: String,
    resolution_dpi: u32,
}

impl Default for PdftoppmChartExtractor {
    fn default() -> Self {
        Self {
            command: "pdftoppm".to_string(),
            resolution_dpi: 144,
        }
    }
}

#[async_trait]
impl ChartExtractor for PdftoppmChartExtractor {
    async fn extract(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ParseError> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|source| ParseError::Io {
                path: out_dir.display().to_string(),
                source,
            })?;

        let output = Command::new(&self.command)
            .arg("-png")
            .arg("-r")
            .arg(self.resolution_dpi.to_string())
            .arg(pdf)
            .arg(out_dir.join("page"))
            .output()
            .await
            .map_err(|e| ParseError::ExternalTool {
                tool: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ParseError::ExternalTool {
                tool: self.command.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let paths = collect_page_images(out_dir).await?;
        debug!(pdf = %pdf.display(), images = paths.len(), "Rasterised PDF pages");
        Ok(paths)
    }
}

/// PNG files directly under `dir`, in page order.
async fn collect_page_images(dir: &Path) -> Result<Vec<PathBuf>, ParseError> {
    let io_err = |source| ParseError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            paths.push(path);
        }
    }
    sort_by_page_number(&mut paths);
    Ok(paths)
}

// pdftoppm zero-pads page numbers to the document's digit count, so
// lexicographic order is not enough across differently sized documents.
fn sort_by_page_number(paths: &mut [PathBuf]) {
    paths.sort_by_key(|p| {
        p.file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.rsplit('-').next())
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(u32::MAX)
    });
}
