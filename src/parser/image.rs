// src/parser/image.rs

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use super::DocumentParser;
use crate::errors::ParseError;
use crate::model::Page;

/// OCR through an external command that prints recognised text to stdout,
/// invoked as `<command> <image> stdout` (the tesseract calling convention).
pub struct OcrImageParser {
    command: String,
}

impl OcrImageParser {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl DocumentParser for OcrImageParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>, ParseError> {
        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
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

        Ok(vec![Page::new(
            1,
            String::from_utf8_lossy(&output.stdout).into_owned(),
        )])
    }
}
