// ── Core error types ──
//
// User-facing errors from slvctl-core. Consumers never see reqwest errors
// or raw JSON failures; the `From<slvctl_api::Error>` impl translates
// transport-layer errors into domain variants.

use slvctl_api::FieldError;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("No server is configured. Cannot perform request.")]
    NoBackendConfigured,

    #[error("Cannot connect to backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Backend request timed out")]
    Timeout,

    #[error("Not connected to the backend")]
    Disconnected,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Device {device_id} has no attribute named {attribute}")]
    AttributeNotFound {
        device_id: String,
        attribute: String,
    },

    #[error("Invalid value for {attribute}: {reason}")]
    InvalidValue { attribute: String, reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} (requires {required})")]
    Unsupported { operation: String, required: String },

    #[error("Backend rejected the request ({} field error(s))", errors.len())]
    ValidationFailed { errors: Vec<FieldError> },

    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for errors that mean "the thing you asked for is
    /// not there" rather than "something went wrong".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::AttributeNotFound { .. }
                | Self::Http { status: 404, .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<slvctl_api::Error> for CoreError {
    fn from(err: slvctl_api::Error) -> Self {
        match err {
            slvctl_api::Error::NoBackendConfigured => CoreError::NoBackendConfigured,
            slvctl_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Internal(e.to_string())
                }
            }
            slvctl_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            slvctl_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            slvctl_api::Error::Http {
                status,
                status_text,
            } => CoreError::Http {
                status,
                status_text,
            },
            slvctl_api::Error::Validation { errors } => CoreError::ValidationFailed { errors },
            slvctl_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            slvctl_api::Error::Protocol(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            slvctl_api::Error::ChannelClosed => CoreError::Disconnected,
            slvctl_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
