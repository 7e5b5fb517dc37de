use thiserror::Error;

use crate::models::FieldError;

/// Failures from the HTTP endpoints and the Socket.IO channel.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// No backend URL is configured; raised before any request is built.
    #[error("No server is configured. Cannot perform request.")]
    NoBackendConfigured,

    // ── Transport ───────────────────────────────────────────────────
    /// The request never got a response.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP API ────────────────────────────────────────────────────
    /// Non-success HTTP status. Carries the status text the backend sent.
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// HTTP 400 with a structured list of field-level errors.
    #[error("Validation failed ({} field error(s))", errors.len())]
    Validation { errors: Vec<FieldError> },

    // ── Real-time channel ───────────────────────────────────────────
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The server spoke something other than Engine.IO / Socket.IO v4.
    #[error("Socket.IO protocol error: {0}")]
    Protocol(String),

    /// The real-time channel task has shut down.
    #[error("Real-time channel closed")]
    ChannelClosed,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Failures that may go away on their own: timeouts, refused
    /// connections and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// A 404, whether reported as a status or by reqwest.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Field-level errors carried by a rejected save, if any.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Self::Validation { errors } => Some(errors),
            _ => None,
        }
    }
}
