// src/query.rs
// Question → embedding → latest corpus version → filtered lookup → answer.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::embedder::Embedder;
use crate::errors::QueryError;
use crate::llm_provider::LLMProvider;
use crate::model::{CorpusVersion, SourceMetadata, SourceRef};
use crate::monitoring::metrics;
use crate::vector_store::{Match, MetadataFilter, VectorStore};

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub top_k: usize,
    /// Matches inspected to find the newest corpus version.
    pub probe_k: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { top_k: 5, probe_k: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

pub struct QueryCoordinator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LLMProvider>,
    settings: QuerySettings,
}

impl QueryCoordinator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LLMProvider>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            settings,
        }
    }

    pub async fn query(&self, text: &str) -> Result<QueryAnswer, QueryError> {
        let started = Instant::now();
        let result = self.run(text).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(QueryError::EmptyQuery) => "invalid",
            Err(QueryError::CorpusEmpty) => "not_found",
            Err(_) => "failed",
        };
        metrics::QUERY_TOTAL.with_label_values(&[outcome]).inc();
        metrics::observe_query_latency_ms(started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(answer) => info!(
                sources = answer.sources.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Query answered"
            ),
            Err(e) => warn!(error = %e, "Query failed"),
        }
        result
    }

    async fn run(&self, text: &str) -> Result<QueryAnswer, QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let embedding = self.embedder.embed(text).await.map_err(QueryError::Embedding)?;
        let version = self.latest_version(&embedding).await?;

        let filter = MetadataFilter::corpus_version(version);
        let matches = self
            .store
            .query(&embedding, self.settings.top_k.max(1), true, Some(&filter))
            .await
            .map_err(QueryError::Store)?;
        debug!(version = %version, matches = matches.len(), "Filtered lookup complete");

        let sources: Vec<SourceRef> = matches.iter().map(to_source_ref).collect();
        let prompt = build_prompt(text, &sources);
        let answer = self.llm.generate(&prompt).await.map_err(QueryError::Generation)?;

        Ok(QueryAnswer { answer, sources })
    }

    /// Newest corpus version among the closest matches of an unfiltered probe.
    async fn latest_version(&self, embedding: &[f32]) -> Result<CorpusVersion, QueryError> {
        let probe = self
            .store
            .query(embedding, self.settings.probe_k.max(1), true, None)
            .await
            .map_err(QueryError::Store)?;

        probe
            .iter()
            .filter_map(Match::corpus_version)
            .max()
            .ok_or(QueryError::CorpusEmpty)
    }
}

/// Converts a raw match into the public shape, filling defaults for any
/// metadata the store did not return.
pub fn to_source_ref(m: &Match) -> SourceRef {
    let str_field = |name: &str| m.field(name).and_then(Value::as_str).map(str::to_string);

    let page = m
        .field("page")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .filter(|p| *p >= 1)
        .map(|p| p.min(u32::MAX as u64) as u32)
        .unwrap_or(1);

    SourceRef {
        id: m.id.clone(),
        score: clamp_score(m.score),
        metadata: SourceMetadata {
            source: str_field("source").unwrap_or_else(|| "unknown".to_string()),
            page,
            chunk_type: str_field("type").unwrap_or_else(|| "paragraph".to_string()),
            excerpt: str_field("excerpt")
                .or_else(|| str_field("text"))
                .unwrap_or_default(),
        },
    }
}

fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

pub fn build_prompt(query: &str, sources: &[SourceRef]) -> String {
    let context = sources
        .iter()
        .map(|s| {
            format!(
                "Source ({} page:{} type:{}):\n{}",
                s.metadata.source, s.metadata.page, s.metadata.chunk_type, s.metadata.excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following sources to answer the question. If unsure, say you don't know.\n\n{}\n\nQuestion: {}\nAnswer concisely and reference source pages.",
        context, query
    )
}
