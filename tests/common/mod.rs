// tests/common/mod.rs
// Deterministic stand-ins for the embedder, generator and vector store.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use visual_rag::embedder::{Embedder, EmbeddingVector};
use visual_rag::errors::ProviderError;
use visual_rag::ingest::{IngestCoordinator, IngestSettings, Upload};
use visual_rag::llm_provider::LLMProvider;
use visual_rag::model::Vector;
use visual_rag::parser::{ParserRegistry, ParserSettings};
use visual_rag::query::{QueryCoordinator, QuerySettings};
use visual_rag::vector_store::{InMemoryVectorStore, Match, MetadataFilter, VectorStore};

/// Bag-of-words embedder: each word bumps one hashed dimension.
pub struct HashEmbedder {
    pub dims: usize,
    /// Reported by `dimensions()`; `None` mimics a provider that advertises nothing.
    pub advertised: Option<usize>,
    /// Texts containing this marker fail to embed.
    pub fail_marker: Option<String>,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            advertised: Some(dims),
            fail_marker: None,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn advertising(mut self, dims: Option<usize>) -> Self {
        self.advertised = dims;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(ProviderError::Status {
                    provider: "fake",
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
        }
        let mut values = vec![0.0f32; self.dims];
        values[0] = 0.01;
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            let slot = word.bytes().fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            values[slot % self.dims] += 1.0;
        }
        Ok(values)
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn dimensions(&self) -> Option<usize> {
        self.advertised
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingLlm {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingLlm {
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LLMProvider for RecordingLlm {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Generated answer".to_string())
    }

    fn model_name(&self) -> &str {
        "recording-llm"
    }
}

/// In-memory store that counts calls and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryVectorStore,
    pub upsert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
    /// 1-based upsert call that fails.
    pub fail_upsert_call: Option<usize>,
    pub fail_delete: bool,
}

impl RecordingStore {
    pub fn failing_upsert_call(call: usize) -> Self {
        Self {
            fail_upsert_call: Some(call),
            ..Default::default()
        }
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Default::default()
        }
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.upserts() + self.deletes() + self.queries()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn upsert_all(&self, vectors: &[Vector]) -> Result<(), ProviderError> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.lock().unwrap().push(vectors.len());
        if self.fail_upsert_call == Some(call) {
            return Err(ProviderError::Status {
                provider: "fake-store",
                status: 500,
                body: "write rejected".to_string(),
            });
        }
        self.inner.upsert_all(vectors).await
    }

    async fn delete_all(&self) -> Result<(), ProviderError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(ProviderError::request("fake-store", "delete timed out"));
        }
        self.inner.delete_all().await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, ProviderError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query(vector, top_k, include_metadata, filter).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn fast_settings() -> IngestSettings {
    IngestSettings {
        upsert_batch_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub fn registry(dir: &TempDir) -> ParserRegistry {
    ParserRegistry::new(&ParserSettings {
        charts_dir: dir.path().join("charts"),
        ocr_command: "tesseract".to_string(),
        extract_charts: false,
    })
}

pub fn ingest_coordinator(
    dir: &TempDir,
    embedder: Arc<HashEmbedder>,
    store: Arc<RecordingStore>,
    settings: IngestSettings,
) -> IngestCoordinator {
    IngestCoordinator::new(registry(dir), embedder, store, settings).unwrap()
}

pub fn query_coordinator(
    embedder: Arc<HashEmbedder>,
    store: Arc<RecordingStore>,
    llm: Arc<RecordingLlm>,
    settings: QuerySettings,
) -> QueryCoordinator {
    QueryCoordinator::new(embedder, store, llm, settings)
}

/// Writes `content` to a temp file inside `dir`, keeping the extension of `name`.
pub fn upload(dir: &TempDir, name: &str, content: &str) -> Upload {
    let suffix = PathBuf::from(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir.path())
        .unwrap();
    std::fs::write(file.path(), content).unwrap();
    Upload::new(name, file)
}

/// Paragraphs separated by blank lines.
pub fn paragraphs(texts: &[&str]) -> String {
    texts.join("\n\n")
}
