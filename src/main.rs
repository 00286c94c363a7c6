// src/main.rs
use std::io;
use std::sync::Arc;

use actix_web::web;
use tracing::{error, info};

use visual_rag::api::{start_api_server, AppState};
use visual_rag::config::{ApiConfig, VectorStoreKind};
use visual_rag::embedder::{Embedder, GeminiEmbedder};
use visual_rag::llm_provider::{create_llm_provider, LLMProvider};
use visual_rag::monitoring::{metrics, tracing_config, HealthTracker, MonitoringConfig};
use visual_rag::parser::ParserRegistry;
use visual_rag::vector_store::{InMemoryVectorStore, PineconeStore, VectorStore};
use visual_rag::{IngestCoordinator, QueryCoordinator};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    let monitoring = MonitoringConfig::from_env();
    let _log_guard = tracing_config::init_tracing(&monitoring)
        .map_err(|e| io::Error::other(format!("failed to initialise logging: {}", e)))?;
    metrics::init();

    let config = ApiConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    info!(addr = %config.bind_addr(), env = %config.app_env, "Starting Visual RAG API");

    let embedder: Arc<dyn Embedder> = Arc::new(
        GeminiEmbedder::new(&config.gemini, config.embedding_model.clone())
            .map_err(|e| startup_error("Failed to initialise embedder", e))?,
    );

    let llm: Arc<dyn LLMProvider> = Arc::from(
        create_llm_provider(config.llm.clone(), &config.gemini, config.gemini.timeout)
            .map_err(|e| startup_error("Failed to initialise generator", e))?,
    );

    let store: Arc<dyn VectorStore> = match config.vector_store {
        VectorStoreKind::Pinecone => Arc::new(
            PineconeStore::connect(&config.pinecone)
                .await
                .map_err(|e| startup_error("Failed to connect to Pinecone", e))?,
        ),
        VectorStoreKind::Memory => {
            info!("Using in-memory vector store; vectors are lost on restart");
            Arc::new(InMemoryVectorStore::new())
        }
    };

    let health = Arc::new(HealthTracker::new(
        store.name(),
        embedder.model_name(),
        llm.model_name(),
    ));

    let ingest = IngestCoordinator::new(
        ParserRegistry::new(&config.parser),
        Arc::clone(&embedder),
        Arc::clone(&store),
        config.ingest.clone(),
    )
    .map_err(|e| startup_error("Invalid ingest settings", e))?;
    let query = QueryCoordinator::new(embedder, store, llm, config.query.clone());

    let state = web::Data::new(AppState {
        ingest: Arc::new(ingest),
        query: Arc::new(query),
        health,
        upload_dir: config.upload_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
        expose_debug: config.is_development(),
    });

    start_api_server(&config.bind_addr(), state)?.await
}
