// src/parser/docx.rs

use async_trait::async_trait;
use std::io::Read;
use std::path::Path;

use super::{run_blocking, DocumentParser};
use crate::errors::ParseError;
use crate::model::Page;

/// Raw text of a DOCX body (`word/document.xml`). Paragraphs are separated by
/// a blank line so the chunker sees the document's paragraph structure.
pub struct DocxParser;

#[async_trait]
impl DocumentParser for DocxParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>, ParseError> {
        let owned = path.to_path_buf();
        let xml = run_blocking("docx", move || read_document_xml(&owned)).await?;
        Ok(vec![Page::new(1, document_xml_to_text(&xml))])
    }
}

fn read_document_xml(path: &Path) -> Result<String, ParseError> {
    let malformed = |message: String| ParseError::Malformed {
        kind: "docx",
        message,
    };

    let file = std::fs::File::open(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| malformed(format!("invalid archive: {}", e)))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|_| malformed("word/document.xml not found".to_string()))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| malformed(format!("unreadable document.xml: {}", e)))?;
    Ok(xml)
}

/// Collects `<w:t>` runs; `</w:p>` ends a paragraph, `<w:tab/>` and `<w:br/>`
/// map to a tab and a line break.
pub fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        if in_text {
            paragraph.push_str(&decode_entities(&rest[..open]));
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("");
        let self_closing = tag.ends_with('/');

        match name {
            "w:t" if !self_closing => in_text = true,
            "/w:t" => in_text = false,
            "w:tab" => paragraph.push('\t'),
            "w:br" | "w:cr" => paragraph.push('\n'),
            "/w:p" => {
                let trimmed = paragraph.trim_end();
                if !trimmed.is_empty() {
                    if !out.is_empty() {
                        out.push_str("\n\n");
                    }
                    out.push_str(trimmed);
                }
                paragraph.clear();
            }
            _ => {}
        }
    }

    let trimmed = paragraph.trim_end();
    if !trimmed.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(trimmed);
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
