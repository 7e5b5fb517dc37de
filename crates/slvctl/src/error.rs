//! User-facing failures, rendered through miette, and their exit codes.

use miette::Diagnostic;
use thiserror::Error;

use slvctl_config::ConfigError;
use slvctl_core::{CoreError, FieldError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("No backend configured")]
    #[diagnostic(
        code(slvctl::no_backend),
        help(
            "Store one with: slvctl backend set <url>\n\
             Or pass --backend / set SLVCTL_BACKEND.\n\
             State file: {path}"
        )
    )]
    NoBackend { path: String },

    #[error("Could not connect to backend at {url}")]
    #[diagnostic(
        code(slvctl::connection_failed),
        help(
            "Is the slvCtrl+ server running at that address?\n\
             Check the stored URL with: slvctl backend show"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(slvctl::timeout),
        help("The backend did not answer in time. Raise --timeout or check its load.")
    )]
    Timeout,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(slvctl::not_found),
        help("Run: slvctl {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Backend returned HTTP {status}: {message}")]
    #[diagnostic(code(slvctl::api_error))]
    ApiError { status: u16, message: String },

    #[error("Backend rejected the settings")]
    #[diagnostic(code(slvctl::settings_rejected), help("{details}"))]
    SettingsRejected { details: String },

    #[error("Operation '{operation}' is not available")]
    #[diagnostic(
        code(slvctl::unsupported),
        help(
            "This command requires {required}.\n\
             Enable it with `realtime = true` under [defaults] in the config file."
        )
    )]
    Unsupported { operation: String, required: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(slvctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(slvctl::config))]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Refusing to run '{action}' without confirmation")]
    #[diagnostic(
        code(slvctl::confirmation_required),
        help("stdin is not a terminal; pass --yes to confirm up front.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(slvctl::json), help("The file must hold a single JSON document."))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(slvctl::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::Config(ConfigError::Validation { .. })
            | Self::SettingsRejected { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoBackend { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            _ => exit_code::GENERAL,
        }
    }

    /// Treat an HTTP 404 as a missing named resource.
    pub fn not_found_or(err: CoreError, resource_type: &str, identifier: &str) -> Self {
        if matches!(err, CoreError::Http { status: 404, .. }) {
            return Self::NotFound {
                resource_type: resource_type.into(),
                identifier: identifier.into(),
                list_command: format!("{resource_type}s list"),
            };
        }
        err.into()
    }
}

fn describe_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoBackendConfigured => CliError::NoBackend {
                path: slvctl_config::state_path().display().to_string(),
            },

            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Disconnected => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                source: "Real-time channel is not connected".into(),
            },

            CoreError::Timeout => CliError::Timeout,

            CoreError::DeviceNotFound { device_id } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: device_id,
                list_command: "devices list".into(),
            },

            CoreError::AttributeNotFound {
                device_id,
                attribute,
            } => CliError::NotFound {
                resource_type: "attribute".into(),
                identifier: attribute,
                list_command: format!("devices get {device_id}"),
            },

            CoreError::InvalidValue { attribute, reason } => CliError::Validation {
                field: attribute,
                reason,
            },

            CoreError::Unsupported {
                operation,
                required,
            } => CliError::Unsupported {
                operation,
                required,
            },

            CoreError::ValidationFailed { errors } => CliError::SettingsRejected {
                details: describe_field_errors(&errors),
            },

            CoreError::Http {
                status,
                status_text,
            } => CliError::ApiError {
                status,
                message: status_text,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::NoBackendConfigured, exit_code::USAGE),
            (CoreError::Timeout, exit_code::TIMEOUT),
            (CoreError::Disconnected, exit_code::CONNECTION),
            (
                CoreError::DeviceNotFound {
                    device_id: "d1".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::Unsupported {
                    operation: "attribute write".into(),
                    required: "the real-time channel".into(),
                },
                exit_code::UNSUPPORTED,
            ),
            (
                CoreError::Http {
                    status: 500,
                    status_text: "Internal Server Error".into(),
                },
                exit_code::GENERAL,
            ),
        ];

        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn settings_rejection_lists_every_field() {
        let err = CliError::from(CoreError::ValidationFailed {
            errors: vec![
                FieldError {
                    field: "serverPort".into(),
                    message: "must be a positive number".into(),
                },
                FieldError {
                    field: "logLevel".into(),
                    message: "unknown level".into(),
                },
            ],
        });

        let CliError::SettingsRejected { details } = err else {
            panic!("expected SettingsRejected");
        };
        assert_eq!(
            details,
            "serverPort: must be a positive number\nlogLevel: unknown level"
        );
    }

    #[test]
    fn not_found_only_rewrites_404() {
        let missing = CliError::not_found_or(
            CoreError::Http {
                status: 404,
                status_text: "Not Found".into(),
            },
            "script",
            "blink.js",
        );
        assert!(matches!(missing, CliError::NotFound { ref identifier, .. } if identifier == "blink.js"));

        let other = CliError::not_found_or(CoreError::Timeout, "script", "blink.js");
        assert!(matches!(other, CliError::Timeout));
    }
}
