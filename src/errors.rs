// src/errors.rs
// Error types for each pipeline layer, with the HTTP status each one maps to.

use actix_web::http::StatusCode;
use std::io;
use thiserror::Error;

/// Failure of an external collaborator (embedder, LLM, vector store).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: &'static str, message: String },

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid {provider} response: {message}")]
    InvalidResponse { provider: &'static str, message: String },

    #[error("{provider} rejected input: {message}")]
    InvalidInput { provider: &'static str, message: String },

    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn request(provider: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Request {
            provider,
            message: err.to_string(),
        }
    }

    pub fn invalid_response(provider: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {kind}: {message}")]
    Malformed { kind: &'static str, message: String },

    #[error("External tool `{tool}` failed: {message}")]
    ExternalTool { tool: String, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("max_words must be a positive integer, got {0}")]
    InvalidMaxWords(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to parse upload: {0}")]
    Parse(#[source] ParseError),

    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error("No content found in the uploaded file")]
    NoContent,

    #[error("Failed to generate any valid embeddings")]
    NoEmbeddings,

    #[error("Vector {index} is malformed: {reason}")]
    MalformedVector { index: usize, reason: String },

    #[error("Failed to upsert batch {batch}/{total}: {source}")]
    BatchUpsert {
        batch: usize,
        total: usize,
        #[source]
        source: ProviderError,
    },
}

impl From<ParseError> for IngestError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedFileType(ext) => IngestError::UnsupportedFileType(ext),
            other => IngestError::Parse(other),
        }
    }
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::UnsupportedFileType(_)
            | IngestError::NoContent
            | IngestError::Chunking(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short user-facing message; the Display rendering goes into `details`.
    pub fn public_message(&self) -> &'static str {
        match self {
            IngestError::UnsupportedFileType(_) => "Unsupported file type",
            IngestError::NoContent => "No content found in the uploaded file",
            IngestError::NoEmbeddings => "Failed to generate any valid embeddings",
            IngestError::MalformedVector { .. } | IngestError::BatchUpsert { .. } => {
                "Failed to store vectors"
            }
            IngestError::Chunking(_) => "Invalid chunking configuration",
            IngestError::Parse(_) => "Processing failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query text is required")]
    EmptyQuery,

    #[error("No documents found in the index.")]
    CorpusEmpty,

    #[error("Failed to embed query: {0}")]
    Embedding(#[source] ProviderError),

    #[error("Vector store lookup failed: {0}")]
    Store(#[source] ProviderError),

    #[error("Answer generation failed: {0}")]
    Generation(#[source] ProviderError),
}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::EmptyQuery => StatusCode::BAD_REQUEST,
            QueryError::CorpusEmpty => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            QueryError::EmptyQuery => "Query text is required",
            QueryError::CorpusEmpty => "No documents found in the index.",
            _ => "Query failed",
        }
    }
}
