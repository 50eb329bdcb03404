use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error taxonomy shared by the callable endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    FailedPrecondition,
    Internal,
}

impl FaultKind {
    /// Wire status code used in callable error bodies.
    pub const fn status(self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Internal => "INTERNAL",
        }
    }

    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::InvalidArgument | Self::FailedPrecondition => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct FaultPayload<'a> {
    status: &'static str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct FaultEnvelope<'a> {
    error: FaultPayload<'a>,
}

/// Renders `{"error": {"status", "message"}}` with the matching HTTP status.
pub fn fault_response(kind: FaultKind, message: &str) -> Response {
    let body = FaultEnvelope {
        error: FaultPayload {
            status: kind.status(),
            message,
        },
    };
    (kind.http_status(), Json(body)).into_response()
}
