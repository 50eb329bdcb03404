use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::portal::platform::PlatformError;
use crate::portal::seed::SeedError;
use crate::telemetry::TelemetryError;

/// Process-level failures surfaced by the binaries.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
    #[error("seeding error: {0}")]
    Seed(#[from] SeedError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Platform(PlatformError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Platform(PlatformError::AlreadyExists(_)) => StatusCode::CONFLICT,
            AppError::Platform(PlatformError::InvalidToken(_)) => StatusCode::UNAUTHORIZED,
            AppError::Platform(_)
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Seed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
