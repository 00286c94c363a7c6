// src/parser/mod.rs
// Dispatch from an uploaded file to the extractor that turns it into pages.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::ParseError;
use crate::model::Page;

pub mod chart;
pub mod docx;
pub mod image;
pub mod pdf;
pub mod sheet;
pub mod text;

pub use chart::{ChartExtractor, NoChartExtractor, PdftoppmChartExtractor};
pub use docx::DocxParser;
pub use image::OcrImageParser;
pub use pdf::PdfParser;
pub use sheet::SpreadsheetParser;
pub use text::PlainTextParser;

/// Turns a file on disk into numbered pages of raw text.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>, ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Pdf,
    Image,
    Docx,
    Text,
    Spreadsheet,
}

impl FileKind {
    /// Picks the kind from the original file name's extension, case-insensitively.
    pub fn from_filename(name: &str) -> Result<Self, ParseError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "jpg" | "jpeg" | "png" => Ok(FileKind::Image),
            "docx" => Ok(FileKind::Docx),
            "txt" => Ok(FileKind::Text),
            "xlsx" | "xls" | "csv" => Ok(FileKind::Spreadsheet),
            _ => Err(ParseError::UnsupportedFileType(if ext.is_empty() {
                name.to_string()
            } else {
                format!(".{}", ext)
            })),
        }
    }
}

/// Pages of one upload plus the chart images rasterised from it.
#[derive(Debug, Default)]
pub struct ParsedUpload {
    pub pages: Vec<Page>,
    pub chart_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ParserSettings {
    /// Root for rasterised chart images, one `<upload_id>/` directory per PDF.
    /// These directories are not removed when a later ingestion supersedes
    /// the corpus; prune them out of band if disk use matters.
    pub charts_dir: PathBuf,
    pub ocr_command: String,
    pub extract_charts: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            charts_dir: PathBuf::from("uploads/charts"),
            ocr_command: "tesseract".to_string(),
            extract_charts: true,
        }
    }
}

pub struct ParserRegistry {
    parsers: HashMap<FileKind, Arc<dyn DocumentParser>>,
    charts: Arc<dyn ChartExtractor>,
    charts_dir: PathBuf,
}

impl ParserRegistry {
    pub fn new(settings: &ParserSettings) -> Self {
        let mut parsers: HashMap<FileKind, Arc<dyn DocumentParser>> = HashMap::new();
        parsers.insert(FileKind::Pdf, Arc::new(PdfParser));
        parsers.insert(
            FileKind::Image,
            Arc::new(OcrImageParser::new(settings.ocr_command.clone())),
        );
        parsers.insert(FileKind::Docx, Arc::new(DocxParser));
        parsers.insert(FileKind::Text, Arc::new(PlainTextParser));
        parsers.insert(FileKind::Spreadsheet, Arc::new(SpreadsheetParser));

        let charts: Arc<dyn ChartExtractor> = if settings.extract_charts {
            Arc::new(PdftoppmChartExtractor::default())
        } else {
            Arc::new(NoChartExtractor)
        };

        Self {
            parsers,
            charts,
            charts_dir: settings.charts_dir.clone(),
        }
    }

    pub fn with_parser(mut self, kind: FileKind, parser: Arc<dyn DocumentParser>) -> Self {
        self.parsers.insert(kind, parser);
        self
    }

    pub fn with_chart_extractor(mut self, charts: Arc<dyn ChartExtractor>) -> Self {
        self.charts = charts;
        self
    }

    /// Parses `path`, dispatching on the extension of `original_name`.
    /// Chart extraction runs for PDFs only and writes under
    /// `charts_dir/<upload_id>/`; a chart failure is logged and yields no charts.
    pub async fn parse(
        &self,
        original_name: &str,
        path: &Path,
        upload_id: &str,
    ) -> Result<ParsedUpload, ParseError> {
        let kind = FileKind::from_filename(original_name)?;
        let parser = self
            .parsers
            .get(&kind)
            .ok_or_else(|| ParseError::UnsupportedFileType(original_name.to_string()))?;

        info!(file = %original_name, kind = ?kind, "Parsing upload");
        let pages = parser.parse(path).await?;

        let chart_paths = if kind == FileKind::Pdf {
            let out_dir = self.charts_dir.join(upload_id);
            match self.charts.extract(path, &out_dir).await {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(file = %original_name, error = %e, "Chart extraction failed; continuing without charts");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!(
            file = %original_name,
            pages = pages.len(),
            charts = chart_paths.len(),
            "Upload parsed"
        );
        Ok(ParsedUpload { pages, chart_paths })
    }
}

/// Runs a synchronous extractor on the blocking pool.
pub(crate) async fn run_blocking<T, F>(kind: &'static str, f: F) -> Result<T, ParseError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ParseError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ParseError::Malformed {
            kind,
            message: format!("extraction task failed: {}", e),
        })?
}
