use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::workflows::certification::policy::{
    DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_RENT_BURDEN_PERCENT,
    DEFAULT_SAFE_HARBOR_TRIGGER_PERCENT,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub compliance: ComplianceSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                environment,
            },
            compliance: ComplianceSettings::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub environment: AppEnvironment,
}

/// Program-year data location and regulatory dials.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceSettings {
    /// CSV of published limits; the bundled table is used when unset.
    pub ami_limits_path: Option<PathBuf>,
    pub safe_harbor_trigger_percent: Decimal,
    pub rent_burden_percent: Decimal,
    pub recert_max_attempts: u32,
    pub recert_backoff_ms: u64,
}

impl ComplianceSettings {
    fn load() -> Result<Self, ConfigError> {
        let ami_limits_path = env::var("APP_AMI_LIMITS_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            ami_limits_path,
            safe_harbor_trigger_percent: parse_var(
                "APP_SAFE_HARBOR_TRIGGER_PERCENT",
                Decimal::from(DEFAULT_SAFE_HARBOR_TRIGGER_PERCENT),
            )?,
            rent_burden_percent: parse_var(
                "APP_RENT_BURDEN_PERCENT",
                Decimal::from(DEFAULT_RENT_BURDEN_PERCENT),
            )?,
            recert_max_attempts: parse_var("APP_RECERT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            recert_backoff_ms: parse_var(
                "APP_RECERT_BACKOFF_MS",
                DEFAULT_BACKOFF.as_millis() as u64,
            )?,
        })
    }
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            ami_limits_path: None,
            safe_harbor_trigger_percent: Decimal::from(DEFAULT_SAFE_HARBOR_TRIGGER_PERCENT),
            rent_burden_percent: Decimal::from(DEFAULT_RENT_BURDEN_PERCENT),
            recert_max_attempts: DEFAULT_MAX_ATTEMPTS,
            recert_backoff_ms: DEFAULT_BACKOFF.as_millis() as u64,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        _ => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be numeric (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
