// src/model.rs
// Value types shared by the chunking, ingest and query stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One logical page of extracted text. Images and single-file formats
/// produce exactly one page numbered 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub text: String,
}

impl Page {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Paragraph,
    Table,
    Chart,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Paragraph => "paragraph",
            ChunkType::Table => "table",
            ChunkType::Chart => "chart",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub page: u32,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
}

impl Chunk {
    pub fn paragraph(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
            chunk_type: ChunkType::Paragraph,
        }
    }

    pub fn table(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
            chunk_type: ChunkType::Table,
        }
    }

    pub fn chart(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
            chunk_type: ChunkType::Chart,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Identifies one ingestion run. Every vector written by a run carries the
/// same version, and queries resolve a single version before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusVersion(i64);

impl CorpusVersion {
    pub fn new(epoch_millis: i64) -> Self {
        Self(epoch_millis)
    }

    /// Version stamped from the wall clock, in epoch milliseconds.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Reads a version from a stored metadata value. Some stores hand numbers
    /// back as floats, so whole floats are accepted too.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        if let Some(v) = value.as_i64() {
            return Some(Self(v));
        }
        value
            .as_f64()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| Self(v as i64))
    }
}

impl fmt::Display for CorpusVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMetadata {
    pub source: String,
    pub page: u32,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub excerpt: String,
    pub timestamp: CorpusVersion,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

impl Vector {
    /// `{upload_id}-{page}-{chunk_index}-{timestamp}`; unique across runs
    /// because the upload id and the version both change per run.
    pub fn make_id(upload_id: &str, page: u32, chunk_index: usize, version: CorpusVersion) -> String {
        format!("{}-{}-{}-{}", upload_id, page, chunk_index, version)
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source: String,
    pub page: u32,
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub excerpt: String,
}

/// A retrieved chunk returned next to a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub score: f32,
    pub metadata: SourceMetadata,
}
