//! Error types for macrolens-relay
//!
//! Every failure is answered with `{ "error": message, "kind": kind }` so the
//! scanner can classify it without inspecting the message text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use macrolens_common::api::{ErrorKind, RelayErrorBody};
use macrolens_common::inference::InferenceError;
use macrolens_common::parser::ParseError;
use thiserror::Error;

/// Relay API error type
#[derive(Debug, Error)]
pub enum RelayError {
    /// Request body missing or incomplete (400)
    #[error("{0}")]
    BadRequest(String),

    /// Request body over the size limit (413)
    #[error("Image too large")]
    PayloadTooLarge,

    /// Server has no API key (500)
    #[error("{0}")]
    Config(String),

    /// Upstream rejected the server's API key (500)
    #[error("Failed to analyze image: {0}")]
    Auth(String),

    /// Upstream reported a failure (500)
    #[error("Failed to analyze image: {0}")]
    Upstream(String),

    /// Model answer was not a valid nutrition record (500)
    #[error("Failed to analyze image: {0}")]
    Malformed(String),

    /// Upstream unreachable (500)
    #[error("Failed to analyze image: {0}")]
    Transport(String),

    /// Anything but POST or OPTIONS (405)
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::BadRequest(_) => ErrorKind::BadRequest,
            RelayError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            RelayError::Config(_) => ErrorKind::Config,
            RelayError::Auth(_) => ErrorKind::Auth,
            RelayError::Upstream(_) => ErrorKind::Upstream,
            RelayError::Malformed(_) => ErrorKind::Malformed,
            RelayError::Transport(_) => ErrorKind::Transport,
            RelayError::MethodNotAllowed => ErrorKind::MethodNotAllowed,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InferenceError> for RelayError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::MissingCredential => {
                RelayError::Config("API key not configured on server".to_string())
            }
            InferenceError::Transport(msg) => RelayError::Transport(msg),
            InferenceError::Auth(msg) => RelayError::Auth(msg),
            InferenceError::Upstream(msg) => RelayError::Upstream(msg),
            InferenceError::Malformed(msg) => RelayError::Malformed(msg),
        }
    }
}

impl From<ParseError> for RelayError {
    fn from(err: ParseError) -> Self {
        RelayError::Malformed(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = ?self.kind(), "{}", self);
        } else {
            tracing::debug!(kind = ?self.kind(), "{}", self);
        }

        let body = Json(RelayErrorBody {
            error: self.to_string(),
            kind: Some(self.kind()),
        });

        (status, body).into_response()
    }
}

/// Result type for relay handlers
pub type RelayResult<T> = Result<T, RelayError>;
