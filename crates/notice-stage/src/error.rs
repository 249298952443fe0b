use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::stage_change::{BatchInputError, PartnerChangeError, StageChangeError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Batch(BatchInputError),
    Partner(PartnerChangeError),
    StageChange(StageChangeError),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Batch(err) => err.code(),
            AppError::Partner(err) => err.code(),
            AppError::StageChange(err) => err.code(),
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) | AppError::Server(_) => {
                "INTERNAL"
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Batch(err) => write!(f, "invalid batch: {}", err),
            AppError::Partner(err) => write!(f, "partner change rejected: {}", err),
            AppError::StageChange(err) => write!(f, "stage change error: {}", err),
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
            AppError::Batch(err) => Some(err),
            AppError::Partner(err) => Some(err),
            AppError::StageChange(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Batch(_) | AppError::StageChange(StageChangeError::InvalidDateRange { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Partner(PartnerChangeError::ProcessingFailed(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Partner(PartnerChangeError::StageMapUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Partner(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::StageChange(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
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

impl From<BatchInputError> for AppError {
    fn from(value: BatchInputError) -> Self {
        Self::Batch(value)
    }
}

impl From<PartnerChangeError> for AppError {
    fn from(value: PartnerChangeError) -> Self {
        Self::Partner(value)
    }
}

impl From<StageChangeError> for AppError {
    fn from(value: StageChangeError) -> Self {
        Self::StageChange(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_errors_map_to_bad_request() {
        let response = AppError::from(BatchInputError::EmptyItems).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn aggregate_partner_failures_are_unprocessable() {
        let error = PartnerChangeError::ProcessingFailed(vec!["N-1 failed".to_string()]);
        let response = AppError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
