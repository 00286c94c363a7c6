pub mod api;
pub mod assembler;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod errors;
pub mod gemini;
pub mod ingest;
pub mod llm_provider;
pub mod middleware;
pub mod model;
pub mod monitoring;
pub mod parser;
pub mod query;
pub mod tables;
pub mod vector_store;

pub use ingest::{IngestCoordinator, IngestReport, Upload};
pub use query::{QueryAnswer, QueryCoordinator};
