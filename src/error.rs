use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Longest slice of an upstream body kept for diagnostics.
pub const SNIPPET_MAX_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("inference server took too long to respond")]
    UpstreamTimeout,
    #[error("cannot connect to inference server, check that it is running and reachable")]
    UpstreamUnreachable,
    #[error("inference server error: {body}")]
    UpstreamError { status: u16, body: String },
    #[error("failed to parse inference server response: {reason} (body starts with: {snippet})")]
    UpstreamProtocolError { reason: String, snippet: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn protocol(reason: impl ToString, raw_body: &str) -> Self {
        ServiceError::UpstreamProtocolError {
            reason: reason.to_string(),
            snippet: truncate_chars(raw_body, SNIPPET_MAX_CHARS).to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::UpstreamTimeout => StatusCode::REQUEST_TIMEOUT,
            ServiceError::UpstreamUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::UpstreamError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ServiceError::UpstreamProtocolError { .. } | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        // A connect timeout reports both flags; it is still a timeout.
        if err.is_timeout() {
            ServiceError::UpstreamTimeout
        } else if err.is_connect() {
            ServiceError::UpstreamUnreachable
        } else {
            ServiceError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "detail": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Prefix of `text` holding at most `max` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
