//! Error responses.
//!
//! # Responsibilities
//! - Map domain errors to HTTP status codes at the service boundary
//! - Render every failure as `{"error": "<kind>", "detail": "<text>"}`
//!
//! # Design Decisions
//! - One `ApiError` type for all three services
//! - A forwarded downstream error keeps its status, kind and detail
//! - Downstream timeouts result in 504 Gateway Timeout

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::dice::RollError;

/// Failure categories exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ClientInput,
    NotFound,
    SpecificationUnavailable,
    DieFailure,
    BatchFailure,
    DownstreamTimeout,
    DownstreamUnreachable,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DieFailure | ErrorKind::BatchFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::SpecificationUnavailable | ErrorKind::DownstreamUnreachable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::DownstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ClientInput => "client_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SpecificationUnavailable => "specification_unavailable",
            ErrorKind::DieFailure => "die_failure",
            ErrorKind::BatchFailure => "batch_failure",
            ErrorKind::DownstreamTimeout => "downstream_timeout",
            ErrorKind::DownstreamUnreachable => "downstream_unreachable",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// An error on its way out of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            status: kind.status(),
            body: ErrorBody {
                error: kind.as_str().to_string(),
                detail: detail.into(),
            },
        }
    }

    pub fn client_input(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientInput, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    /// Relay an error exactly as a downstream service reported it.
    pub fn forwarded(status: StatusCode, body: ErrorBody) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &str {
        &self.body.error
    }

    pub fn detail(&self) -> &str {
        &self.body.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RollError> for ApiError {
    fn from(err: RollError) -> Self {
        let kind = match &err {
            RollError::InvalidInput(_) => ErrorKind::ClientInput,
            RollError::SpecificationUnavailable { .. } => ErrorKind::SpecificationUnavailable,
            RollError::DieFailure { .. } => ErrorKind::DieFailure,
            RollError::BatchFailure { .. } => ErrorKind::BatchFailure,
        };
        ApiError::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::LookupError;

    #[test]
    fn test_roll_error_status_mapping() {
        let cases = [
            (RollError::InvalidInput("count".into()), StatusCode::BAD_REQUEST, "client_input"),
            (
                RollError::SpecificationUnavailable {
                    identifier: "missing".into(),
                    cause: LookupError::NotFound,
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "specification_unavailable",
            ),
            (
                RollError::DieFailure { identifier: "risky".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
                "die_failure",
            ),
            (
                RollError::BatchFailure {
                    identifier: "risky".into(),
                    count: 5,
                    failed: vec![2],
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "batch_failure",
            ),
        ];

        for (err, status, kind) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), status);
            assert_eq!(api.kind(), kind);
        }
    }

    #[test]
    fn test_detail_carries_message() {
        let api: ApiError = RollError::DieFailure { identifier: "risky".into() }.into();
        assert_eq!(api.detail(), "Die 'risky' failed!");
    }

    #[test]
    fn test_kind_serializes_like_as_str() {
        for kind in [
            ErrorKind::ClientInput,
            ErrorKind::NotFound,
            ErrorKind::SpecificationUnavailable,
            ErrorKind::DieFailure,
            ErrorKind::BatchFailure,
            ErrorKind::DownstreamTimeout,
            ErrorKind::DownstreamUnreachable,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = ApiError::new(ErrorKind::DownstreamTimeout, "engine too slow").into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "downstream_timeout");
        assert_eq!(body.detail, "engine too slow");
    }
}
