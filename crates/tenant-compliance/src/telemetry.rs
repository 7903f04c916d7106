use crate::config::{AppEnvironment, TelemetryConfig};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// `RUST_LOG` wins over the configured level when present.
pub fn filter_for(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok(), config)
}

fn filter_from(
    rust_log: Option<String>,
    config: &TelemetryConfig,
) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = rust_log.and_then(|value| EnvFilter::try_new(value).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::EnvFilter {
        value: config.log_level.clone(),
        source,
    })
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = filter_for(config)?;

    // Module targets help when chasing recertification retries locally.
    let with_target = config.environment == AppEnvironment::Development;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(with_target)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
