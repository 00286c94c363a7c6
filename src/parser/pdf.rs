// src/parser/pdf.rs

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{run_blocking, DocumentParser};
use crate::errors::ParseError;
use crate::model::Page;

const FORM_FEED: char = '\u{000C}';

/// Text extraction through `pdf-extract`. Physical pages are recovered by
/// splitting the full text on form feeds.
pub struct PdfParser;

#[async_trait]
impl DocumentParser for PdfParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>, ParseError> {
        let owned = path.to_path_buf();
        let full_text = run_blocking("pdf", move || {
            pdf_extract::extract_text(&owned).map_err(|e| ParseError::Malformed {
                kind: "pdf",
                message: e.to_string(),
            })
        })
        .await?;

        let pages = split_pages(&full_text);
        debug!(pages = pages.len(), chars = full_text.len(), "PDF text extracted");
        Ok(pages)
    }
}

/// One page per form-feed separated segment, numbered from 1. Empty pages
/// are kept so numbering matches the physical document.
pub fn split_pages(full_text: &str) -> Vec<Page> {
    full_text
        .split(FORM_FEED)
        .enumerate()
        .map(|(i, text)| Page::new(i as u32 + 1, text.trim()))
        .collect()
}
