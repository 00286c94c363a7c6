//! Structured logging with tracing
//!
//! Sets up:
//! - Console logging, text or JSON per `LOG_FORMAT`
//! - JSON file logging with daily rotation under `LOG_DIR`

use tracing_appender::non_blocking;
use tracing_appender::rolling::daily;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use super::config::{LogFormat, MonitoringConfig};

const LOG_FILE_PREFIX: &str = "visual-rag.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// Returns a guard that must be kept alive for the duration of the program.
/// Dropping the guard stops file logging. A subscriber that is already
/// installed (tests, embedding binaries) is left in place.
pub fn init_tracing(config: &MonitoringConfig) -> Result<Box<dyn std::any::Any>, Box<dyn std::error::Error>> {
    if !config.enabled {
        return Ok(Box::new(()));
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.enable_console_logging {
        let console = fmt::layer().with_writer(std::io::stderr).with_target(true);
        layers.push(match config.log_format {
            LogFormat::Json => console.json().boxed(),
            LogFormat::Text => console.boxed(),
        });
    }

    let mut guard: Option<tracing_appender::non_blocking::WorkerGuard> = None;
    if config.enable_file_logging {
        config.ensure_log_dir()?;
        let file_appender = daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking_file, file_guard) = non_blocking(file_appender);
        layers.push(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .json()
                .boxed(),
        );
        guard = Some(file_guard);
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init();

    match guard {
        Some(g) => Ok(Box::new(g)),
        None => Ok(Box::new(())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitoringConfig {
            log_dir: dir.path().join("logs"),
            ..Default::default()
        };
        let result = init_tracing(&config);
        assert!(result.is_ok());
        assert!(dir.path().join("logs").exists());
    }

    #[test]
    fn test_tracing_disabled() {
        let config = MonitoringConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_tracing(&config).is_ok());
    }
}
