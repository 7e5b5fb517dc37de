// HTTP client construction: TLS trust, timeout and the version header.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Header every HTTP request carries so the backend can detect
/// incompatible front ends.
pub const FRONTEND_VERSION_HEADER: &str = "Frontend-Version";

/// Version string sent in [`FRONTEND_VERSION_HEADER`].
pub const FRONTEND_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How server certificates are checked for `https` backends.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    #[default]
    System,
    /// Trust the PEM-encoded CA at this path in addition to the system roots.
    CustomCa(PathBuf),
    /// Skip verification entirely.
    DangerAcceptInvalid,
}

/// Settings for the `reqwest::Client` behind [`BackendClient`](crate::BackendClient).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Value of the `Frontend-Version` header.
    pub frontend_version: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            frontend_version: FRONTEND_VERSION.to_owned(),
        }
    }
}

impl TransportConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("slvctl/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("cannot read {}: {e}", path.display())))?;
                let ca = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))?;
                client = client.add_root_certificate(ca);
            }
            TlsMode::DangerAcceptInvalid => {
                client = client.danger_accept_invalid_certs(true);
            }
        }

        client
            .build()
            .map_err(|e| Error::Tls(format!("HTTP client setup failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_crate_version() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.frontend_version, FRONTEND_VERSION);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(matches!(cfg.tls, TlsMode::System));
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let cfg = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        assert!(matches!(cfg.build_client(), Err(Error::Tls(_))));
    }
}
