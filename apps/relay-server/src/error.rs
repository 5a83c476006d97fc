use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Gateway errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong while serving a relay session.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Inbound frame is not a structured event. The stream cannot resynchronize.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport is gone (closed, cleared, or a write failed).
    #[error("connection closed")]
    ConnectionClosed,

    /// No inbound traffic within the idle window.
    #[error("read deadline exceeded")]
    IdleTimeout,

    /// Token rejected by the validator. The cause is logged, never sent.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Join attempted on an auth-required channel without an identity.
    #[error("channel requires authentication")]
    Authorization,

    /// A required field is missing or has the wrong type.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("upstream dispatch failed: {0}")]
    UpstreamDispatch(String),
}

impl RelayError {
    /// Whether the session must be torn down after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::ConnectionClosed | Self::IdleTimeout
        )
    }

    /// Text reported to the client in an `error` event, if the error is client-visible.
    pub fn client_message(&self) -> Option<&'static str> {
        match self {
            Self::Authentication(_) => Some("Invalid token"),
            Self::Authorization => Some("Channel requires authentication"),
            Self::InvalidRequest(message) => Some(*message),
            Self::ChannelNotFound(_) => Some("Channel not found"),
            Self::Protocol(_)
            | Self::ConnectionClosed
            | Self::IdleTimeout
            | Self::UpstreamDispatch(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP API errors
// ---------------------------------------------------------------------------

/// Structured API error returned to HTTP clients.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
