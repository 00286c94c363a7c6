// src/parser/text.rs

use async_trait::async_trait;
use std::path::Path;

use super::DocumentParser;
use crate::errors::ParseError;
use crate::model::Page;

/// Plain text uploads become a single page; invalid UTF-8 is replaced.
pub struct PlainTextParser;

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>, ParseError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(vec![Page::new(1, String::from_utf8_lossy(&bytes).into_owned())])
    }
}
