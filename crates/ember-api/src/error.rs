use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API-visible error taxonomy. Everything else — cache misses, embedding
/// outages, durable-log failures, match-creation races — is recovered
/// locally and never crosses this boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected before any write; carries a machine-readable code.
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authenticated, but not a participant of the referenced match.
    #[error("not a participant of this match")]
    Forbidden,

    /// Primary store unreachable — the caller should retry the request.
    #[error("primary store unavailable")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { code, message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "validation",
                    "code": code,
                    "message": message,
                })),
            )
                .into_response(),

            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "not_found",
                    "message": format!("{} not found", what),
                })),
            )
                .into_response(),

            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "forbidden" })),
            )
                .into_response(),

            ApiError::Storage(e) => {
                error!("Primary store failure: {:#}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "error": "storage_unavailable",
                        "message": "primary store unavailable, retry the request",
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let resp = ApiError::validation("bad_coordinates", "latitude out of range").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::NotFound("match").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::Forbidden.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = ApiError::Storage(anyhow::anyhow!("down")).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
