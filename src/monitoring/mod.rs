//! Monitoring module for visual-rag
//!
//! Provides:
//! - Structured logging with tracing
//! - Prometheus metrics collection
//! - Health reporting

pub mod config;
pub mod health;
pub mod metrics;
pub mod tracing_config;

pub use config::{LogFormat, MonitoringConfig};
pub use health::{HealthStatus, HealthTracker};
pub use metrics::export_prometheus;
