// src/config.rs
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chunker::DEFAULT_MAX_WORDS;
use crate::errors::ConfigError;
use crate::gemini::GeminiSettings;
use crate::ingest::IngestSettings;
use crate::llm_provider::LLMConfig;
use crate::parser::ParserSettings;
use crate::query::QuerySettings;
use crate::vector_store::PineconeSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreKind {
    Pinecone,
    Memory,
}

impl FromStr for VectorStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pinecone" => Ok(VectorStoreKind::Pinecone),
            "memory" => Ok(VectorStoreKind::Memory),
            other => Err(format!("unknown vector store: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub app_env: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,

    pub parser: ParserSettings,
    pub ingest: IngestSettings,
    pub query: QuerySettings,

    pub gemini: GeminiSettings,
    pub embedding_model: String,
    pub llm: LLMConfig,

    pub vector_store: VectorStoreKind,
    pub pinecone: PineconeSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            app_env: "production".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 50 * 1024 * 1024,
            parser: ParserSettings::default(),
            ingest: IngestSettings::default(),
            query: QuerySettings::default(),
            gemini: GeminiSettings::default(),
            embedding_model: crate::embedder::DEFAULT_EMBEDDING_MODEL.to_string(),
            llm: LLMConfig::default(),
            vector_store: VectorStoreKind::Pinecone,
            pinecone: PineconeSettings::default(),
        }
    }
}

impl ApiConfig {
    /// Loads `.env` (if present) and reads the environment over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get("BACKEND_HOST") {
            config.host = host;
        }
        config.port = parse_or(&get, "PORT", config.port)?;
        if let Some(app_env) = get("APP_ENV") {
            config.app_env = app_env;
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        config.max_upload_bytes = parse_or(&get, "MAX_UPLOAD_BYTES", config.max_upload_bytes)?;

        config.parser.charts_dir = get("CHARTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| config.upload_dir.join("charts"));
        if let Some(cmd) = get("OCR_COMMAND") {
            config.parser.ocr_command = cmd;
        }
        if let Some(mode) = get("CHART_EXTRACTION") {
            config.parser.extract_charts = match mode.to_lowercase().as_str() {
                "pdftoppm" | "on" | "true" => true,
                "off" | "false" | "none" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CHART_EXTRACTION",
                        value: mode,
                    })
                }
            };
        }

        config.ingest.max_words = parse_or(&get, "CHUNK_MAX_WORDS", DEFAULT_MAX_WORDS)?;
        if config.ingest.max_words == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_MAX_WORDS",
                value: "0".to_string(),
            });
        }
        config.ingest.excerpt_chars = parse_or(&get, "EXCERPT_CHARS", config.ingest.excerpt_chars)?;
        config.ingest.upsert_batch_size =
            parse_or(&get, "UPSERT_BATCH_SIZE", config.ingest.upsert_batch_size)?.max(1);
        config.ingest.upsert_batch_delay = Duration::from_millis(parse_or(
            &get,
            "UPSERT_BATCH_DELAY_MS",
            config.ingest.upsert_batch_delay.as_millis() as u64,
        )?);
        config.ingest.embed_concurrency =
            parse_or(&get, "EMBED_CONCURRENCY", config.ingest.embed_concurrency)?.max(1);

        config.query.top_k = parse_or(&get, "QUERY_TOP_K", config.query.top_k)?.max(1);
        config.query.probe_k = parse_or(&get, "CORPUS_PROBE_K", config.query.probe_k)?.max(1);

        let timeout = Duration::from_secs(parse_or(&get, "PROVIDER_TIMEOUT_SECS", 60u64)?);
        config.gemini.timeout = timeout;
        config.pinecone.timeout = timeout;

        if let Some(key) = get("GEMINI_API_KEY") {
            config.gemini.api_key = key;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            config.gemini.base_url = url;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            config.embedding_model = model;
        }

        let generation_model = get("GENERATION_MODEL");
        config.llm = match get("LLM_PROVIDER").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("gemini") => LLMConfig::Gemini {
                model: generation_model.unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            },
            Some("ollama") => LLMConfig::Ollama {
                ollama_url: get("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".to_string()),
                model: generation_model.unwrap_or_else(|| "phi:3.5".to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LLM_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        config.vector_store = parse_or(&get, "VECTOR_STORE", config.vector_store)?;
        if let Some(key) = get("PINECONE_API_KEY") {
            config.pinecone.api_key = key;
        }
        config.pinecone.index_name = get("PINECONE_INDEX");
        config.pinecone.index_host = get("PINECONE_INDEX_HOST");
        if let Some(ns) = get("PINECONE_NAMESPACE") {
            config.pinecone.namespace = ns;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
