// ── Runtime session configuration ──
//
// Describes how to reach a backend and how the session behaves once
// connected. Never touches disk; the CLI builds a `SessionConfig` from
// slvctl-config and hands it in.

use std::time::Duration;

use slvctl_api::{TlsMode, TransportConfig};

/// Default quiet period after a local write before server pushes for the
/// device are accepted again.
pub const DEFAULT_GATE_DELAY: Duration = Duration::from_millis(500);

/// Default health poll interval.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of health samples kept for trend display.
pub const DEFAULT_HEALTH_CAPACITY: usize = 120;

/// Configuration for one backend session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend base URL. `None` makes every network operation fail with
    /// [`CoreError::NoBackendConfigured`](crate::CoreError::NoBackendConfigured).
    pub backend_url: Option<String>,
    /// TLS verification strategy.
    pub tls: TlsMode,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Update gate delay.
    pub gate_delay: Duration,
    /// Open the Socket.IO channel on connect.
    pub realtime: bool,
    /// Poll `/health` in the background. `None` disables polling.
    pub health_interval: Option<Duration>,
    /// Ring size for [`HealthSeries`](crate::HealthSeries).
    pub health_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            gate_delay: DEFAULT_GATE_DELAY,
            realtime: true,
            health_interval: None,
            health_capacity: DEFAULT_HEALTH_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}
