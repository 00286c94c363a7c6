// src/vector_store/pinecone.rs
// Pinecone data-plane client (REST).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{metadata_map, Match, MetadataFilter, VectorStore};
use crate::errors::ProviderError;
use crate::model::Vector;

const PROVIDER: &str = "pinecone";
const API_VERSION: &str = "2024-07";
const CONTROL_PLANE: &str = "https://api.pinecone.io";

#[derive(Debug, Clone)]
pub struct PineconeSettings {
    pub api_key: String,
    /// Index name, used to discover the host when `index_host` is unset.
    pub index_name: Option<String>,
    pub index_host: Option<String>,
    pub namespace: String,
    pub timeout: Duration,
}

impl Default for PineconeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: None,
            index_host: None,
            namespace: String::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct PineconeStore {
    client: reqwest::Client,
    host: String,
    namespace: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAllRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

impl PineconeStore {
    /// Builds the client, resolving the index host through the control plane
    /// when only the index name is configured.
    pub async fn connect(settings: &PineconeSettings) -> Result<Self, ProviderError> {
        let client = build_client(settings)?;

        let host = match (&settings.index_host, &settings.index_name) {
            (Some(host), _) if !host.trim().is_empty() => host.trim().to_string(),
            (_, Some(name)) if !name.trim().is_empty() => {
                describe_index_host(&client, name.trim()).await?
            }
            _ => {
                return Err(ProviderError::Config(
                    "set PINECONE_INDEX_HOST or PINECONE_INDEX".to_string(),
                ))
            }
        };

        let host = normalise_host(&host);
        info!(host = %host, namespace = %settings.namespace, "Pinecone store ready");
        Ok(Self {
            client,
            host,
            namespace: settings.namespace.clone(),
        })
    }

    async fn post<Req: Serialize + ?Sized>(&self, path: &str, body: &Req) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;
        check_status(response).await
    }
}

fn build_client(settings: &PineconeSettings) -> Result<reqwest::Client, ProviderError> {
    if settings.api_key.trim().is_empty() {
        return Err(ProviderError::Config("missing PINECONE_API_KEY".to_string()));
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        "Api-Key",
        HeaderValue::from_str(settings.api_key.trim())
            .map_err(|_| ProviderError::Config("invalid PINECONE_API_KEY".to_string()))?,
    );
    headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(settings.timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to build Pinecone HTTP client: {}", e)))
}

async fn describe_index_host(client: &reqwest::Client, name: &str) -> Result<String, ProviderError> {
    let url = format!("{}/indexes/{}", CONTROL_PLANE, name);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ProviderError::request(PROVIDER, e))?;
    let described: DescribeIndexResponse = check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| ProviderError::invalid_response(PROVIDER, e))?;
    Ok(described.host)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(ProviderError::Status {
        provider: PROVIDER,
        status: status.as_u16(),
        body,
    })
}

/// The control plane reports bare hostnames; data-plane calls need a scheme.
fn normalise_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert_all(&self, vectors: &[Vector]) -> Result<(), ProviderError> {
        if vectors.is_empty() {
            return Ok(());
        }
        let request = UpsertRequest {
            vectors: vectors
                .iter()
                .map(|v| PineconeVector {
                    id: &v.id,
                    values: &v.values,
                    metadata: metadata_map(v),
                })
                .collect(),
            namespace: &self.namespace,
        };
        self.post("/vectors/upsert", &request).await?;
        debug!(count = vectors.len(), "Pinecone upsert complete");
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), ProviderError> {
        let request = DeleteAllRequest {
            delete_all: true,
            namespace: &self.namespace,
        };
        self.post("/vectors/delete", &request).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, ProviderError> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
            namespace: &self.namespace,
            filter: filter.map(MetadataFilter::to_pinecone),
        };
        let response: QueryResponse = self
            .post("/query", &request)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(PROVIDER, e))?;
        Ok(response.matches)
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
