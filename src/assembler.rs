// src/assembler.rs
// Merges paragraph, table and chart chunks into the list handed to the embedder.

use std::path::PathBuf;

use crate::errors::IngestError;
use crate::model::Chunk;

/// Placeholder text stored for a rasterised chart image.
pub fn chart_placeholder(path: &std::path::Path) -> String {
    format!(
        "Chart image located at {} (captioning not implemented yet)",
        path.display()
    )
}

/// One `chart` chunk per image; the page is the 1-based image index.
pub fn chart_chunks(chart_paths: &[PathBuf]) -> Vec<Chunk> {
    chart_paths
        .iter()
        .enumerate()
        .map(|(idx, path)| Chunk::chart(chart_placeholder(path), idx as u32 + 1))
        .collect()
}

/// Concatenates paragraphs, tables and charts in that order and drops blank
/// chunks. An empty result means there is nothing to index.
///
/// Table regions may repeat text already present in a paragraph chunk; both
/// are kept for retrieval recall.
pub fn assemble(
    paragraphs: Vec<Chunk>,
    tables: Vec<Chunk>,
    charts: Vec<Chunk>,
) -> Result<Vec<Chunk>, IngestError> {
    let assembled: Vec<Chunk> = paragraphs
        .into_iter()
        .chain(tables)
        .chain(charts)
        .filter(|c| !c.is_blank())
        .collect();

    if assembled.is_empty() {
        return Err(IngestError::NoContent);
    }
    Ok(assembled)
}
