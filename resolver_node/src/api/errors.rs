//! API error handling for the resolver service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Resolution failures, classified where they occur.
///
/// Every fallible step of the pipeline maps its failures onto one of these
/// three variants at the point the error is raised. The HTTP layer only
/// translates the variant into a status code and body; it never inspects
/// messages to decide what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The caller sent something unusable (malformed address, ambiguous
    /// interface definition). Reported verbatim in the response body.
    #[error("{0}")]
    BadRequest(String),

    /// The address is well-formed but nothing resolvable lives there.
    #[error("{0}")]
    NotFound(String),

    /// Everything else: upstream outages, I/O failures, corrupt artifacts.
    /// The cause chain is logged server-side and never leaks to the client.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ResolverError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResolverError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Internal(err) => {
                log::error!("request failed: {:#}", err);
                "internal server error".to_string()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_codes_follow_classification() {
        assert_eq!(
            ResolverError::bad_request("nope").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ResolverError::not_found("gone").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ResolverError::from(anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn client_errors_report_their_message() {
        let resp = ResolverError::bad_request("0xzz is not a valid Ethereum address")
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            parsed["error"],
            "0xzz is not a valid Ethereum address"
        );
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_causes() {
        let err = ResolverError::from(anyhow!("connection refused").context("fetching abc123"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"], "internal server error");
    }
}
