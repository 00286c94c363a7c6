//! Health reporting for GET /monitoring/health

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ComponentStatus,
    pub timestamp: String,
    pub uptime_seconds: f64,
    pub vector_store: String,
    pub embedding_model: String,
    pub generation_model: String,
}

/// Tracks readiness and the providers the service was started with.
pub struct HealthTracker {
    is_ready: AtomicBool,
    startup_time: Instant,
    vector_store: String,
    embedding_model: String,
    generation_model: String,
}

impl HealthTracker {
    pub fn new(
        vector_store: impl Into<String>,
        embedding_model: impl Into<String>,
        generation_model: impl Into<String>,
    ) -> Self {
        Self {
            is_ready: AtomicBool::new(false),
            startup_time: Instant::now(),
            vector_store: vector_store.into(),
            embedding_model: embedding_model.into(),
            generation_model: generation_model.into(),
        }
    }

    pub fn mark_ready(&self) {
        self.is_ready.store(true, Ordering::SeqCst);
        tracing::info!("System marked as ready");
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    pub fn get_status(&self) -> HealthStatus {
        HealthStatus {
            status: if self.is_ready() {
                ComponentStatus::Healthy
            } else {
                ComponentStatus::Degraded
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: self.startup_time.elapsed().as_secs_f64(),
            vector_store: self.vector_store.clone(),
            embedding_model: self.embedding_model.clone(),
            generation_model: self.generation_model.clone(),
        }
    }
}
