use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::certification::limits::{AmiLimitLoadError, ConfigurationError};
use crate::workflows::certification::{CertificationError, IncomeError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Failures surfaced by binaries wiring the compliance engine together.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Limits(AmiLimitLoadError),
    Policy(ConfigurationError),
    Income(IncomeError),
    Certification(CertificationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Limits(err) => write!(f, "income limit error: {}", err),
            AppError::Policy(err) => write!(f, "compliance policy error: {}", err),
            AppError::Income(err) => write!(f, "income error: {}", err),
            AppError::Certification(err) => write!(f, "certification error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Limits(err) => Some(err),
            AppError::Policy(err) => Some(err),
            AppError::Income(err) => Some(err),
            AppError::Certification(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Income(IncomeError::Validation(_))
            | AppError::Certification(CertificationError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Certification(CertificationError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Certification(CertificationError::Conflict { .. }) => StatusCode::CONFLICT,
            AppError::Certification(CertificationError::Persistence(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Limits(_)
            | AppError::Policy(_)
            | AppError::Income(IncomeError::Configuration(_))
            | AppError::Certification(CertificationError::Configuration(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AmiLimitLoadError> for AppError {
    fn from(value: AmiLimitLoadError) -> Self {
        Self::Limits(value)
    }
}

impl From<ConfigurationError> for AppError {
    fn from(value: ConfigurationError) -> Self {
        Self::Policy(value)
    }
}

impl From<IncomeError> for AppError {
    fn from(value: IncomeError) -> Self {
        Self::Income(value)
    }
}

impl From<CertificationError> for AppError {
    fn from(value: CertificationError) -> Self {
        Self::Certification(value)
    }
}
