//! Structured logging setup for the registry server.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,

    /// Whether to use JSON formatting
    pub json_format: bool,

    /// Whether to include thread IDs
    pub include_thread_ids: bool,

    /// Whether to include target module
    pub include_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from(&LoggingConfig::default())
    }
}

impl From<&LoggingConfig> for TelemetryConfig {
    fn from(logging: &LoggingConfig) -> Self {
        Self {
            log_level: logging.level.clone(),
            json_format: logging.json_format,
            include_thread_ids: logging.include_thread_ids,
            include_target: logging.include_target,
        }
    }
}

impl TelemetryConfig {
    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Filter built from `RUST_LOG`, falling back to the configured level
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set.
pub fn init_with_config(config: &TelemetryConfig) -> anyhow::Result<()> {
    let env_filter = config.env_filter();

    if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .try_init()?;
    }

    Ok(())
}
