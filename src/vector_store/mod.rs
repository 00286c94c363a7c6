// src/vector_store/mod.rs
// Contract of the managed vector database plus the filter used for corpus
// versioning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProviderError;
use crate::model::{CorpusVersion, Vector};

pub mod memory;
pub mod pinecone;

pub use memory::InMemoryVectorStore;
pub use pinecone::{PineconeSettings, PineconeStore};

/// Metadata field holding the ingestion run's [`CorpusVersion`].
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A similarity match as returned by the store. Metadata is kept raw so the
/// query side can apply its own defaults for missing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl Match {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(name))
    }

    pub fn corpus_version(&self) -> Option<CorpusVersion> {
        self.field(TIMESTAMP_FIELD).and_then(CorpusVersion::from_json)
    }
}

/// Equality filter on one metadata field.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataFilter {
    pub field: String,
    pub value: Value,
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Restricts a lookup to the vectors of one ingestion run.
    pub fn corpus_version(version: CorpusVersion) -> Self {
        Self::eq(TIMESTAMP_FIELD, version.as_millis())
    }

    /// Numbers compare by value so `5` and `5.0` are equal, as in Pinecone.
    pub fn matches(&self, metadata: Option<&Map<String, Value>>) -> bool {
        let Some(actual) = metadata.and_then(|m| m.get(&self.field)) else {
            return false;
        };
        match (actual.as_f64(), self.value.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => actual == &self.value,
        }
    }

    /// Pinecone's filter language: `{"field": {"$eq": value}}`.
    pub fn to_pinecone(&self) -> Value {
        let mut inner = Map::new();
        inner.insert("$eq".to_string(), self.value.clone());
        let mut outer = Map::new();
        outer.insert(self.field.clone(), Value::Object(inner));
        Value::Object(outer)
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert_all(&self, vectors: &[Vector]) -> Result<(), ProviderError>;

    async fn delete_all(&self) -> Result<(), ProviderError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, ProviderError>;

    fn name(&self) -> &str;
}

/// Serialises vector metadata into the flat map stored next to the values.
pub fn metadata_map(vector: &Vector) -> Map<String, Value> {
    match serde_json::to_value(&vector.metadata) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_to_pinecone() {
        let filter = MetadataFilter::corpus_version(CorpusVersion::new(1700));
        assert_eq!(filter.to_pinecone(), json!({"timestamp": {"$eq": 1700}}));
    }

    #[test]
    fn test_filter_matches_numbers_by_value() {
        let filter = MetadataFilter::corpus_version(CorpusVersion::new(42));
        let int_meta = json!({"timestamp": 42}).as_object().cloned();
        let float_meta = json!({"timestamp": 42.0}).as_object().cloned();
        let other = json!({"timestamp": 41}).as_object().cloned();
        assert!(filter.matches(int_meta.as_ref()));
        assert!(filter.matches(float_meta.as_ref()));
        assert!(!filter.matches(other.as_ref()));
        assert!(!filter.matches(None));
    }

    #[test]
    fn test_match_reads_corpus_version() {
        let m = Match {
            id: "a".into(),
            score: 0.5,
            metadata: json!({"timestamp": 99}).as_object().cloned(),
        };
        assert_eq!(m.corpus_version(), Some(CorpusVersion::new(99)));
        let bare = Match { id: "b".into(), score: 0.1, metadata: None };
        assert_eq!(bare.corpus_version(), None);
    }
}
