// tests/query_tests.rs
// Query flow: version resolution, filtering and prompt assembly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use visual_rag::errors::QueryError;
use visual_rag::query::QuerySettings;

#[tokio::test]
async fn test_answer_uses_sources_from_the_stored_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(32));
    let store = Arc::new(RecordingStore::default());
    let llm = Arc::new(RecordingLlm::default());

    let ingest = ingest_coordinator(&dir, embedder.clone(), store.clone(), fast_settings());
    ingest
        .ingest(upload(
            &dir,
            "report.txt",
            &paragraphs(&["Revenue grew in the third quarter.", "Headcount stayed flat."]),
        ))
        .await
        .unwrap();

    let query = query_coordinator(embedder.clone(), store, llm.clone(), QuerySettings::default());
    let answer = query.query("  How did revenue change?  ").await.unwrap();

    assert_eq!(embedder.last_text().as_deref(), Some("  How did revenue change?  "));

    assert_eq!(answer.answer, "Generated answer");
    assert_eq!(answer.sources.len(), 2);
    for source in &answer.sources {
        assert_eq!(source.metadata.source, "report.txt");
        assert_eq!(source.metadata.page, 1);
        assert_eq!(source.metadata.chunk_type, "paragraph");
        assert!((0.0..=1.0).contains(&source.score));
    }

    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.starts_with("Use the following sources to answer the question. If unsure, say you don't know.\n\n"));
    assert!(prompt.contains("Source (report.txt page:1 type:paragraph):\nRevenue grew in the third quarter."));
    assert!(prompt.ends_with("Question:   How did revenue change?  \nAnswer concisely and reference source pages."));
}

#[tokio::test]
async fn test_latest_ingestion_wins_when_old_vectors_survive() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(32));
    let store = Arc::new(RecordingStore::failing_delete());
    let llm = Arc::new(RecordingLlm::default());

    let ingest = ingest_coordinator(&dir, embedder.clone(), store.clone(), fast_settings());
    let first = ingest
        .ingest(upload(&dir, "old.txt", "apples are red"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = ingest
        .ingest(upload(&dir, "new.txt", "apples are green"))
        .await
        .unwrap();
    assert!(second.timestamp > first.timestamp);
    assert_eq!(store.inner.len().await, 2);

    let settings = QuerySettings { top_k: 5, probe_k: 10 };
    let query = query_coordinator(embedder, store, llm.clone(), settings);
    let answer = query.query("apples are red").await.unwrap();

    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].metadata.source, "new.txt");
    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.contains("new.txt"));
    assert!(!prompt.contains("old.txt"));
}

#[tokio::test]
async fn test_default_version_lookup_follows_closest_surviving_vector() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(32));
    let store = Arc::new(RecordingStore::failing_delete());
    let llm = Arc::new(RecordingLlm::default());

    let ingest = ingest_coordinator(&dir, embedder.clone(), store.clone(), fast_settings());
    ingest.ingest(upload(&dir, "old.txt", "apples are red")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    ingest.ingest(upload(&dir, "new.txt", "apples are green")).await.unwrap();

    // Only the nearest match is inspected, so a stale vector that survived a
    // failed delete decides the version when it is the closest one.
    let query = query_coordinator(embedder, store, llm, QuerySettings::default());
    let stale = query.query("apples are red").await.unwrap();
    assert_eq!(stale.sources.len(), 1);
    assert_eq!(stale.sources[0].metadata.source, "old.txt");

    let fresh = query.query("apples are green").await.unwrap();
    assert_eq!(fresh.sources.len(), 1);
    assert_eq!(fresh.sources[0].metadata.source, "new.txt");
}

#[tokio::test]
async fn test_blank_query_makes_no_calls() {
    let embedder = Arc::new(HashEmbedder::new(8));
    let store = Arc::new(RecordingStore::default());
    let llm = Arc::new(RecordingLlm::default());
    let query = query_coordinator(embedder.clone(), store.clone(), llm.clone(), QuerySettings::default());

    let err = query.query(" \n\t ").await.unwrap_err();

    assert!(matches!(err, QueryError::EmptyQuery));
    assert_eq!(embedder.calls(), 0);
    assert_eq!(store.total_calls(), 0);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_empty_corpus_is_not_found() {
    let embedder = Arc::new(HashEmbedder::new(8));
    let store = Arc::new(RecordingStore::default());
    let llm = Arc::new(RecordingLlm::default());
    let query = query_coordinator(embedder.clone(), store.clone(), llm.clone(), QuerySettings::default());

    let err = query.query("anything there?").await.unwrap_err();

    assert!(matches!(err, QueryError::CorpusEmpty));
    assert_eq!(err.status_code(), actix_web::http::StatusCode::NOT_FOUND);
    assert_eq!(embedder.calls(), 1);
    assert_eq!(store.queries(), 1);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_top_k_limits_sources() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new(32));
    let store = Arc::new(RecordingStore::default());
    let llm = Arc::new(RecordingLlm::default());

    let ingest = ingest_coordinator(&dir, embedder.clone(), store.clone(), fast_settings());
    let text = paragraphs(&["one", "two", "three", "four", "five", "six", "seven"]);
    ingest.ingest(upload(&dir, "numbers.txt", &text)).await.unwrap();

    let query = query_coordinator(embedder, store.clone(), llm, QuerySettings::default());
    let answer = query.query("three").await.unwrap();

    assert_eq!(answer.sources.len(), 5);
    assert_eq!(answer.sources[0].metadata.excerpt, "three");
    assert_eq!(store.queries(), 2);
}
