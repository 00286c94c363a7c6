// src/embedder.rs
// Embedding provider abstraction. Chunks and queries must go through the same
// embedder so they share one vector space.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ProviderError;
use crate::gemini::{GeminiClient, GeminiSettings, PROVIDER};

pub type EmbeddingVector = Vec<f32>;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fails on empty input or provider error.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, ProviderError>;

    fn model_name(&self) -> &str;

    /// Output dimensionality when the provider advertises one.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

/// Rejects embeddings that cannot be stored: empty or holding NaN/infinity.
pub fn validate_embedding(values: &[f32]) -> Result<(), String> {
    if values.is_empty() {
        return Err("embedding is empty".to_string());
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(format!("embedding contains a non-finite value at position {}", pos));
    }
    Ok(())
}

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    dimensions: Option<usize>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(settings: &GeminiSettings, model: impl Into<String>) -> Result<Self, ProviderError> {
        let model = model.into();
        let dimensions = known_dimensions(&model);
        Ok(Self {
            client: GeminiClient::new(settings)?,
            model,
            dimensions,
        })
    }
}

fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-004" | "embedding-001" => Some(768),
        _ => None,
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput {
                provider: PROVIDER,
                message: "cannot embed empty text".to_string(),
            });
        }

        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part { text }],
            },
        };
        let response: EmbedContentResponse =
            self.client.call(&self.model, "embedContent", &request).await?;

        debug!(model = %self.model, text_len = text.len(), dims = response.embedding.values.len(), "Embedding generated");
        Ok(response.embedding.values)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}
