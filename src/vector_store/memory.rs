// src/vector_store/memory.rs
// Process-local vector store: exact cosine search over every stored vector.
// Used for development (`VECTOR_STORE=memory`) and tests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{metadata_map, Match, MetadataFilter, VectorStore};
use crate::errors::ProviderError;
use crate::model::Vector;

const PROVIDER: &str = "memory-store";

#[derive(Debug, Clone)]
struct StoredVector {
    id: String,
    values: Vec<f32>,
    metadata: Map<String, Value>,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<StoredVector>,
    dimensions: Option<usize>,
}

#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn ids(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .records
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_all(&self, vectors: &[Vector]) -> Result<(), ProviderError> {
        let mut inner = self.inner.write().await;

        // Validate the whole batch first so a bad vector leaves no partial write.
        let mut dims = inner.dimensions;
        for vector in vectors {
            let expected = *dims.get_or_insert(vector.values.len());
            if vector.values.is_empty() || vector.values.len() != expected {
                return Err(ProviderError::InvalidInput {
                    provider: PROVIDER,
                    message: format!(
                        "vector {} has dimension {}, store expects {}",
                        vector.id,
                        vector.values.len(),
                        expected
                    ),
                });
            }
        }
        inner.dimensions = dims;

        for vector in vectors {
            let record = StoredVector {
                id: vector.id.clone(),
                values: vector.values.clone(),
                metadata: metadata_map(vector),
            };
            match inner.records.iter().position(|r| r.id == record.id) {
                Some(pos) => inner.records[pos] = record,
                None => inner.records.push(record),
            }
        }

        debug!(upserted = vectors.len(), total = inner.records.len(), "In-memory upsert");
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), ProviderError> {
        let mut inner = self.inner.write().await;
        let removed = inner.records.len();
        inner.records.clear();
        inner.dimensions = None;
        info!(removed, "In-memory store cleared");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, ProviderError> {
        let inner = self.inner.read().await;
        if let Some(dims) = inner.dimensions {
            if vector.len() != dims {
                return Err(ProviderError::InvalidInput {
                    provider: PROVIDER,
                    message: format!("query dimension {} does not match store dimension {}", vector.len(), dims),
                });
            }
        }

        let mut matches: Vec<Match> = inner
            .records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(Some(&r.metadata))))
            .map(|r| Match {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: include_metadata.then(|| r.metadata.clone()),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkType, CorpusVersion, VectorMetadata};

    fn vector(id: &str, values: Vec<f32>, ts: i64) -> Vector {
        Vector {
            id: id.to_string(),
            values,
            metadata: VectorMetadata {
                source: "doc.txt".into(),
                page: 1,
                chunk_type: ChunkType::Paragraph,
                excerpt: id.to_string(),
                timestamp: CorpusVersion::new(ts),
                chunk_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .upsert_all(&[
                vector("x", vec![1.0, 0.0], 1),
                vector("y", vec![0.0, 1.0], 1),
                vector("xy", vec![1.0, 1.0], 1),
            ])
            .await
            .unwrap();

        let matches = store.query(&[1.0, 0.1], 2, true, None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "x");
        assert_eq!(matches[1].id, "xy");
        assert!(matches[0].metadata.is_some());
    }

    #[tokio::test]
    async fn test_filter_and_metadata_flag() {
        let store = InMemoryVectorStore::new();
        store
            .upsert_all(&[vector("old", vec![1.0, 0.0], 1), vector("new", vec![0.5, 0.5], 2)])
            .await
            .unwrap();

        let filter = MetadataFilter::corpus_version(CorpusVersion::new(2));
        let matches = store.query(&[1.0, 0.0], 5, false, Some(&filter)).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "new");
        assert!(matches[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::new();
        store.upsert_all(&[vector("a", vec![1.0, 0.0], 1)]).await.unwrap();
        let err = store
            .upsert_all(&[vector("b", vec![1.0, 0.0, 0.0], 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id_and_delete_all_clears() {
        let store = InMemoryVectorStore::new();
        store.upsert_all(&[vector("a", vec![1.0, 0.0], 1)]).await.unwrap();
        store.upsert_all(&[vector("a", vec![0.0, 1.0], 1)]).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.delete_all().await.unwrap();
        assert!(store.is_empty().await);
        // Dimension resets once the store is empty.
        store.upsert_all(&[vector("c", vec![1.0, 0.0, 0.0], 3)]).await.unwrap();
    }
}
