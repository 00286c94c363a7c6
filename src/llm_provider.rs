// src/llm_provider.rs
// LLM Provider abstraction - pluggable architecture
// Default: Gemini 1.5 Flash over the Generative Language API

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::ProviderError;
use crate::gemini::{GeminiClient, GeminiSettings, PROVIDER as GEMINI};

/// LLM Provider trait - implement this to support new models
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
    fn model_name(&self) -> &str;
}

/// Configuration for the supported generators
#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum LLMConfig {
    Gemini { model: String },
    /// Local model served by Ollama
    Ollama { ollama_url: String, model: String },
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self::Gemini {
            model: "gemini-1.5-flash".to_string(),
        }
    }
}

pub struct GeminiProvider {
    client: GeminiClient,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated in order.
    fn into_text(self) -> Result<String, ProviderError> {
        let feedback = self.prompt_feedback;
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = feedback
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ProviderError::invalid_response(GEMINI, reason));
        }
        Ok(text)
    }
}

impl GeminiProvider {
    pub fn new(settings: &GeminiSettings, model: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: GeminiClient::new(settings)?,
            model: model.into(),
        })
    }
}

#[async_trait::async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Generating with Gemini");

        let request = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };
        let response: GenerateContentResponse =
            self.client.call(&self.model, "generateContent", &request).await?;
        let text = response.into_text()?;

        info!(model = %self.model, response_len = text.len(), "Generation complete");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Ollama-based LLM provider
pub struct OllamaProvider {
    url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(url: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build Ollama HTTP client: {}", e)))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            timeout,
            client,
        })
    }
}

#[async_trait::async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Generating with Ollama");

        let url = format!("{}/api/generate", self.url);
        let req = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::request("ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: "ollama",
                status: status.as_u16(),
                body,
            });
        }

        let ollama_resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response("ollama", e))?;

        info!(model = %self.model, response_len = ollama_resp.response.len(), "Generation complete");
        Ok(ollama_resp.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory function to create LLM provider from config.
/// `timeout` bounds each generation request.
pub fn create_llm_provider(
    config: LLMConfig,
    gemini: &GeminiSettings,
    timeout: Duration,
) -> Result<Box<dyn LLMProvider>, ProviderError> {
    match config {
        LLMConfig::Gemini { model } => {
            info!(model = %model, "Initializing Gemini generator");
            let settings = GeminiSettings {
                timeout,
                ..gemini.clone()
            };
            Ok(Box::new(GeminiProvider::new(&settings, model)?))
        }
        LLMConfig::Ollama { ollama_url, model } => {
            info!(model = %model, "Initializing Ollama generator at {}", ollama_url);
            Ok(Box::new(OllamaProvider::new(ollama_url, model, timeout)?))
        }
    }
}
