// src/ingest.rs
// Upload → pages → chunks → embeddings → versioned vectors in the store.

use futures_util::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assembler::{assemble, chart_chunks};
use crate::chunker::{TextChunker, DEFAULT_MAX_WORDS};
use crate::embedder::{validate_embedding, Embedder, EmbeddingVector};
use crate::errors::IngestError;
use crate::model::{excerpt, Chunk, CorpusVersion, Vector, VectorMetadata};
use crate::monitoring::metrics;
use crate::parser::{ParsedUpload, ParserRegistry};
use crate::tables::table_chunks;
use crate::vector_store::VectorStore;

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub max_words: usize,
    pub excerpt_chars: usize,
    pub upsert_batch_size: usize,
    pub upsert_batch_delay: Duration,
    /// Embedding requests in flight at once; 1 keeps them sequential.
    pub embed_concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
            excerpt_chars: 300,
            upsert_batch_size: 100,
            upsert_batch_delay: Duration::from_millis(100),
            embed_concurrency: 1,
        }
    }
}

/// An uploaded file. The temp file is deleted when this value is dropped,
/// which `IngestCoordinator::ingest` guarantees on every exit path.
#[derive(Debug)]
pub struct Upload {
    pub original_name: String,
    pub file: NamedTempFile,
}

impl Upload {
    pub fn new(original_name: impl Into<String>, file: NamedTempFile) -> Self {
        Self {
            original_name: original_name.into(),
            file,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Result of the best-effort wipe that precedes each ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cleared,
    Failed { reason: String },
}

impl DeleteOutcome {
    pub fn is_cleared(&self) -> bool {
        matches!(self, DeleteOutcome::Cleared)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub stored_count: usize,
    pub charts_extracted: usize,
    pub timestamp: CorpusVersion,
    pub source_name: String,
    pub previous_cleared: bool,
}

pub struct IngestCoordinator {
    parsers: ParserRegistry,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunker: TextChunker,
    settings: IngestSettings,
}

impl IngestCoordinator {
    pub fn new(
        parsers: ParserRegistry,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: IngestSettings,
    ) -> Result<Self, IngestError> {
        let chunker = TextChunker::new(settings.max_words)?;
        Ok(Self {
            parsers,
            embedder,
            store,
            chunker,
            settings,
        })
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Replaces the indexed corpus with the content of `upload`.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestReport, IngestError> {
        let started = Instant::now();
        let source = upload.original_name.clone();
        let result = self.run(upload).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.status_code().is_client_error() => "rejected",
            Err(_) => "failed",
        };
        metrics::INGEST_TOTAL.with_label_values(&[outcome]).inc();
        metrics::observe_ingest_duration_ms(started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(report) => {
                metrics::CORPUS_VERSION.set(report.timestamp.as_millis());
                info!(
                    file = %source,
                    stored = report.stored_count,
                    charts = report.charts_extracted,
                    timestamp = %report.timestamp,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Ingestion complete"
                );
            }
            Err(e) => warn!(file = %source, error = %e, "Ingestion failed"),
        }
        result
    }

    async fn run(&self, upload: Upload) -> Result<IngestReport, IngestError> {
        let Upload { original_name, file } = upload;
        let upload_id = Uuid::new_v4().simple().to_string();

        let parsed = self.parsers.parse(&original_name, file.path(), &upload_id).await?;
        let charts_extracted = parsed.chart_paths.len();
        let chunks = self.build_chunks(&parsed)?;
        info!(file = %original_name, chunks = chunks.len(), "Chunks assembled");

        let delete = self.clear_previous().await;
        let version = CorpusVersion::now();

        let embedded = self.embed_chunks(&chunks).await;
        if embedded.is_empty() {
            return Err(IngestError::NoEmbeddings);
        }

        let vectors: Vec<Vector> = embedded
            .into_iter()
            .map(|(chunk_index, values)| {
                let chunk = &chunks[chunk_index];
                build_vector(
                    &upload_id,
                    &original_name,
                    chunk,
                    chunk_index,
                    values,
                    version,
                    self.settings.excerpt_chars,
                )
            })
            .collect();
        validate_vectors(&vectors, self.embedder.dimensions())?;

        self.upsert_batches(&vectors).await?;
        drop(file);

        Ok(IngestReport {
            stored_count: vectors.len(),
            charts_extracted,
            timestamp: version,
            source_name: original_name,
            previous_cleared: delete.is_cleared(),
        })
    }

    fn build_chunks(&self, parsed: &ParsedUpload) -> Result<Vec<Chunk>, IngestError> {
        let paragraphs = self.chunker.chunk(&parsed.pages);
        let tables = table_chunks(&parsed.pages);
        let charts = chart_chunks(&parsed.chart_paths);
        assemble(paragraphs, tables, charts)
    }

    async fn clear_previous(&self) -> DeleteOutcome {
        match self.store.delete_all().await {
            Ok(()) => {
                info!(store = self.store.name(), "Cleared previous vectors");
                DeleteOutcome::Cleared
            }
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Could not clear previous vectors; relying on timestamp filter");
                DeleteOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Embeds every chunk and returns `(chunk_index, values)` for the ones that
    /// produced a usable embedding, in chunk order.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Vec<(usize, EmbeddingVector)> {
        let results: Vec<_> = stream::iter(chunks.iter().enumerate())
            .map(|(idx, chunk)| async move { (idx, self.embedder.embed(&chunk.text).await) })
            .buffered(self.settings.embed_concurrency.max(1))
            .collect()
            .await;

        let mut embedded = Vec::with_capacity(results.len());
        for (idx, result) in results {
            let chunk = &chunks[idx];
            match result.map_err(|e| e.to_string()).and_then(|values| {
                validate_embedding(&values)?;
                Ok(values)
            }) {
                Ok(values) => {
                    metrics::CHUNKS_EMBEDDED_TOTAL.inc();
                    embedded.push((idx, values));
                }
                Err(reason) => {
                    metrics::CHUNKS_SKIPPED_TOTAL.inc();
                    warn!(
                        chunk_index = idx,
                        page = chunk.page,
                        chunk_type = %chunk.chunk_type,
                        error = %reason,
                        "Skipping chunk; embedding failed"
                    );
                }
            }
        }

        info!(
            embedded = embedded.len(),
            skipped = chunks.len() - embedded.len(),
            model = self.embedder.model_name(),
            "Embedding pass complete"
        );
        embedded
    }

    async fn upsert_batches(&self, vectors: &[Vector]) -> Result<(), IngestError> {
        let batch_size = self.settings.upsert_batch_size.max(1);
        let total = vectors.len().div_ceil(batch_size);

        for (i, batch) in vectors.chunks(batch_size).enumerate() {
            let batch_no = i + 1;
            self.store.upsert_all(batch).await.map_err(|source| {
                error!(batch = batch_no, total, error = %source, "Batch upsert failed");
                IngestError::BatchUpsert {
                    batch: batch_no,
                    total,
                    source,
                }
            })?;
            metrics::VECTORS_UPSERTED_TOTAL.inc_by(batch.len() as u64);
            info!(batch = batch_no, total, size = batch.len(), "Upserted batch");

            if batch_no < total && !self.settings.upsert_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.upsert_batch_delay).await;
            }
        }
        Ok(())
    }
}

fn build_vector(
    upload_id: &str,
    source: &str,
    chunk: &Chunk,
    chunk_index: usize,
    values: EmbeddingVector,
    version: CorpusVersion,
    excerpt_chars: usize,
) -> Vector {
    Vector {
        id: Vector::make_id(upload_id, chunk.page, chunk_index, version),
        values,
        metadata: VectorMetadata {
            source: source.to_string(),
            page: chunk.page,
            chunk_type: chunk.chunk_type,
            excerpt: excerpt(&chunk.text, excerpt_chars),
            timestamp: version,
            chunk_index,
        },
    }
}

/// Every vector needs an id, finite values and the same dimensionality; the
/// reference is the embedder's advertised size, else the first vector's.
pub fn validate_vectors(vectors: &[Vector], expected_dims: Option<usize>) -> Result<(), IngestError> {
    let reference = expected_dims.or_else(|| vectors.first().map(Vector::dimensions));

    for (index, vector) in vectors.iter().enumerate() {
        if vector.id.trim().is_empty() {
            return Err(IngestError::MalformedVector {
                index,
                reason: "missing id".to_string(),
            });
        }
        validate_embedding(&vector.values)
            .map_err(|reason| IngestError::MalformedVector { index, reason })?;
        if let Some(dims) = reference {
            if vector.dimensions() != dims {
                return Err(IngestError::MalformedVector {
                    index,
                    reason: format!("expected {} dimensions, got {}", dims, vector.dimensions()),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkType;

    fn vector(id: &str, values: Vec<f32>) -> Vector {
        build_vector(
            "u",
            "a.txt",
            &Chunk::paragraph("hello", 1),
            0,
            values,
            CorpusVersion::new(1),
            300,
        )
        .with_id(id)
    }

    impl Vector {
        fn with_id(mut self, id: &str) -> Self {
            self.id = id.to_string();
            self
        }
    }

    #[test]
    fn test_build_vector_metadata() {
        let chunk = Chunk::table("a  b\nc  d", 4);
        let v = build_vector("up1", "sheet.csv", &chunk, 7, vec![0.1, 0.2], CorpusVersion::new(99), 3);
        assert_eq!(v.id, "up1-4-7-99");
        assert_eq!(v.metadata.excerpt, "a  ");
        assert_eq!(v.metadata.chunk_type, ChunkType::Table);
        assert_eq!(v.metadata.source, "sheet.csv");
        assert_eq!(v.metadata.chunk_index, 7);
        assert_eq!(v.metadata.timestamp, CorpusVersion::new(99));
    }

    #[test]
    fn test_validate_accepts_consistent_vectors() {
        let vectors = vec![vector("a", vec![0.1, 0.2]), vector("b", vec![0.3, 0.4])];
        assert!(validate_vectors(&vectors, None).is_ok());
        assert!(validate_vectors(&vectors, Some(2)).is_ok());
    }

    #[test]
    fn test_validate_rejects_dimension_mismatch() {
        let vectors = vec![vector("a", vec![0.1, 0.2]), vector("b", vec![0.3])];
        match validate_vectors(&vectors, None) {
            Err(IngestError::MalformedVector { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected malformed vector, got {:?}", other),
        }
        let vectors = vec![vector("a", vec![0.1, 0.2])];
        assert!(matches!(
            validate_vectors(&vectors, Some(768)),
            Err(IngestError::MalformedVector { index: 0, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_id_and_nan() {
        assert!(validate_vectors(&[vector(" ", vec![0.1])], None).is_err());
        assert!(validate_vectors(&[vector("a", vec![f32::NAN])], None).is_err());
    }

    #[test]
    fn test_delete_outcome() {
        assert!(DeleteOutcome::Cleared.is_cleared());
        assert!(!DeleteOutcome::Failed { reason: "x".into() }.is_cleared());
    }
}
