// ── Backend session ──
//
// Full lifecycle for one backend connection: initial device listing,
// the Socket.IO channel and its bridge into the registry, the health
// poll, and the HTTP operations for scripts and settings.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use slvctl_api::{
    AutomationScript, BackendClient, ChannelState, FieldError, ReconnectConfig, SocketHandle,
    SystemInfo, socket_url,
};

use crate::communicator::{DeviceCommunicator, UpdateEmitter, WriteOutcome};
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::events::route_event;
use crate::gate::UpdateGate;
use crate::model::{AttributeValue, Device, HealthSample, HealthSeries};
use crate::store::DeviceRegistry;
use crate::stream::DeviceStream;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

// ── Session ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. HTTP operations (scripts,
/// settings, health) work without [`connect()`](Self::connect); device
/// state and attribute writes need it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    /// `None` when no backend URL is configured.
    client: Option<BackendClient>,
    registry: Arc<DeviceRegistry>,
    gate: Arc<UpdateGate>,
    connection_state: watch::Sender<ConnectionState>,
    health: watch::Sender<Option<Arc<SystemInfo>>>,
    health_series: Mutex<HealthSeries>,
    validation_errors: Mutex<Vec<FieldError>>,
    cancel: CancellationToken,
    /// Child token for the current connection; cancelled on disconnect,
    /// replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    socket: Mutex<Option<Arc<SocketHandle>>>,
    communicator: Mutex<Option<Arc<DeviceCommunicator>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Create a session. Does NOT connect.
    ///
    /// A missing backend URL is accepted here and reported by the first
    /// operation that needs the network; a malformed one is rejected.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        if config.health_interval.is_some_and(|p| p.is_zero()) {
            return Err(CoreError::Config {
                message: "health interval must be greater than zero".into(),
            });
        }

        let client = match BackendClient::from_configured(
            config.backend_url.as_deref(),
            &config.transport(),
        ) {
            Ok(client) => Some(client),
            Err(slvctl_api::Error::NoBackendConfigured) => None,
            Err(slvctl_api::Error::InvalidUrl(e)) => {
                return Err(CoreError::Config {
                    message: format!("invalid backend URL: {e}"),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let registry = Arc::new(DeviceRegistry::new());
        let gate = Arc::new(UpdateGate::new(Arc::clone(&registry), config.gate_delay));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (health, _) = watch::channel(None);
        let health_series = Mutex::new(HealthSeries::new(config.health_capacity));
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                client,
                registry,
                gate,
                connection_state,
                health,
                health_series,
                validation_errors: Mutex::new(Vec::new()),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                socket: Mutex::new(None),
                communicator: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    fn client(&self) -> Result<&BackendClient, CoreError> {
        self.inner.client.as_ref().ok_or(CoreError::NoBackendConfigured)
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the backend.
    ///
    /// Loads the device listing, then (if enabled) opens the real-time
    /// channel and starts the health poll.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let client = self.client()?.clone();
        // A second connect replaces the first connection's tasks.
        self.stop_tasks().await;
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Connecting);

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        if let Err(e) = self.refresh().await {
            let _ = self.inner.connection_state.send(ConnectionState::Failed);
            return Err(e);
        }

        let mut handles = Vec::new();

        if self.inner.config.realtime {
            self.spawn_realtime(&client, &child, &mut handles).await?;
        }

        if let Some(period) = self.inner.config.health_interval {
            let session = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(health_poll_task(session, period, cancel)));
        }

        *self.inner.task_handles.lock().await = handles;

        let _ = self.inner.connection_state.send(ConnectionState::Connected);
        info!(
            url = %client.base_url(),
            devices = self.inner.registry.len(),
            "connected"
        );
        Ok(())
    }

    /// Open the Socket.IO channel and spawn the tasks that feed it into
    /// the registry and the connection state.
    async fn spawn_realtime(
        &self,
        client: &BackendClient,
        cancel: &CancellationToken,
        handles: &mut Vec<JoinHandle<()>>,
    ) -> Result<(), CoreError> {
        let url = socket_url(client.base_url())?;
        let socket_cancel = cancel.child_token();
        let handle = Arc::new(SocketHandle::connect(
            url,
            ReconnectConfig::default(),
            socket_cancel.clone(),
        ));

        // Bridge task: socket events → registry.
        let mut events = handle.subscribe();
        let registry = Arc::clone(&self.inner.registry);
        let bridge_cancel = socket_cancel.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = bridge_cancel.cancelled() => break,
                    result = events.recv() => {
                        match result {
                            Ok(event) => {
                                let routed = route_event(&registry, &event);
                                tracing::trace!(?routed, "event routed");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "event bridge: receiver lagged");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        }));

        // Mirror channel state into the session's connection state.
        let mut channel_state = handle.state();
        let state_tx = self.inner.connection_state.clone();
        let state_cancel = socket_cancel;
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = state_cancel.cancelled() => break,
                    changed = channel_state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = match *channel_state.borrow_and_update() {
                            ChannelState::Connected => ConnectionState::Connected,
                            ChannelState::Reconnecting { attempt } => {
                                ConnectionState::Reconnecting { attempt }
                            }
                            ChannelState::Closed => ConnectionState::Failed,
                            ChannelState::Connecting => continue,
                        };
                        let _ = state_tx.send(next);
                    }
                }
            }
        }));

        let emitter: Arc<dyn UpdateEmitter> = handle.clone();
        let communicator = DeviceCommunicator::new(
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.gate),
            emitter,
        );
        *self.inner.communicator.lock().await = Some(Arc::new(communicator));
        *self.inner.socket.lock().await = Some(handle);
        info!("real-time channel spawned (handshake in progress)");
        Ok(())
    }

    /// Disconnect from the backend.
    ///
    /// Stops background tasks, closes the real-time channel, reopens every
    /// held update gate and resets the connection state.
    pub async fn disconnect(&self) {
        self.stop_tasks().await;
        self.inner.gate.release_all();

        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Cancel the current connection's tasks and wait for them to end.
    async fn stop_tasks(&self) {
        // The child token, not the parent, so a later connect still works.
        self.inner.cancel_child.lock().await.cancel();

        if let Some(handle) = self.inner.socket.lock().await.take() {
            handle.shutdown();
        }
        *self.inner.communicator.lock().await = None;

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Wait until the real-time channel has joined the backend.
    pub async fn wait_realtime(&self, timeout: Duration) -> Result<(), CoreError> {
        let socket = self.inner.socket.lock().await.clone();
        let Some(socket) = socket else {
            return Err(if self.inner.config.realtime {
                CoreError::Disconnected
            } else {
                CoreError::Unsupported {
                    operation: "attribute write".into(),
                    required: "the real-time channel".into(),
                }
            });
        };
        tokio::time::timeout(timeout, socket.wait_connected())
            .await
            .map_err(|_| CoreError::Timeout)?
            .map_err(CoreError::from)
    }

    /// Re-fetch the device listing and reinitialize the registry.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let raw = self.client()?.list_devices().await?;
        let count = raw.len();
        self.inner.registry.init(raw.into_iter().map(Device::from));
        debug!(devices = count, "device listing loaded");
        Ok(())
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Disables the real-time channel and health polling since only a
    /// single request-response cycle is needed.
    pub async fn oneshot<F, Fut, T>(config: SessionConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.realtime = false;
        cfg.health_interval = None;

        let session = Session::new(cfg)?;
        session.connect().await?;
        let result = f(session.clone()).await;
        session.disconnect().await;
        result
    }

    // ── Device state ─────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.registry.subscribe()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.registry.snapshot()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.inner.registry.get(device_id)
    }

    /// Write one attribute over the real-time channel.
    pub async fn set_attribute(
        &self,
        device_id: &str,
        attribute: &str,
        value: Option<AttributeValue>,
    ) -> Result<WriteOutcome, CoreError> {
        let communicator = self.inner.communicator.lock().await.clone();
        match communicator {
            Some(comm) => comm.set_attribute(device_id, attribute, value),
            None if !self.inner.config.realtime => Err(CoreError::Unsupported {
                operation: "attribute write".into(),
                required: "the real-time channel".into(),
            }),
            None => Err(CoreError::Disconnected),
        }
    }

    /// Wait until every queued attribute write has reached the socket.
    pub async fn flush_writes(&self, timeout: Duration) -> Result<(), CoreError> {
        let socket = self.inner.socket.lock().await.clone();
        let Some(socket) = socket else {
            return Ok(());
        };
        tokio::time::timeout(timeout, socket.flush())
            .await
            .map_err(|_| CoreError::Timeout)?
            .map_err(CoreError::from)
    }

    // ── Automation scripts ───────────────────────────────────────

    pub async fn list_scripts(&self) -> Result<Vec<AutomationScript>, CoreError> {
        Ok(self.client()?.list_scripts().await?)
    }

    pub async fn get_script(&self, name: &str) -> Result<AutomationScript, CoreError> {
        Ok(self.client()?.get_script(name).await?)
    }

    pub async fn create_script(&self, name: &str, code: &str) -> Result<(), CoreError> {
        Ok(self
            .client()?
            .create_script(&AutomationScript::new(name, code))
            .await?)
    }

    pub async fn update_script(&self, name: &str, code: &str) -> Result<(), CoreError> {
        Ok(self
            .client()?
            .update_script(&AutomationScript::new(name, code))
            .await?)
    }

    pub async fn delete_script(&self, name: &str) -> Result<(), CoreError> {
        Ok(self.client()?.delete_script(name).await?)
    }

    // ── Settings ─────────────────────────────────────────────────

    pub async fn get_settings(&self) -> Result<Value, CoreError> {
        Ok(self.client()?.get_settings().await?)
    }

    /// Save settings. Field errors from a rejected save are kept until the
    /// next successful save; see [`last_validation_errors`](Self::last_validation_errors).
    pub async fn save_settings(&self, settings: &Value) -> Result<(), CoreError> {
        match self.client()?.save_settings(settings).await {
            Ok(()) => {
                self.inner.validation_errors.lock().await.clear();
                Ok(())
            }
            Err(slvctl_api::Error::Validation { errors }) => {
                self.inner
                    .validation_errors
                    .lock()
                    .await
                    .clone_from(&errors);
                Err(CoreError::ValidationFailed { errors })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn last_validation_errors(&self) -> Vec<FieldError> {
        self.inner.validation_errors.lock().await.clone()
    }

    // ── Health ───────────────────────────────────────────────────

    /// Fetch `/health` once, recording the sample.
    pub async fn health(&self) -> Result<SystemInfo, CoreError> {
        let info = self.client()?.health().await?;
        self.record_health(&info).await;
        Ok(info)
    }

    async fn record_health(&self, info: &SystemInfo) {
        self.inner
            .health_series
            .lock()
            .await
            .push(HealthSample::from_info(info, chrono::Utc::now()));
        let _ = self.inner.health.send(Some(Arc::new(info.clone())));
    }

    /// Latest health reading, updated by the poll task and by [`health`](Self::health).
    pub fn health_updates(&self) -> watch::Receiver<Option<Arc<SystemInfo>>> {
        self.inner.health.subscribe()
    }

    pub async fn health_series(&self) -> HealthSeries {
        self.inner.health_series.lock().await.clone()
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn health_poll_task(session: Session, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = session.health().await {
                    warn!(error = %e, "health poll failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_is_accepted_until_used() {
        let session = Session::new(SessionConfig::default()).unwrap();
        assert!(matches!(session.client(), Err(CoreError::NoBackendConfigured)));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let config = SessionConfig {
            backend_url: Some("not a url".into()),
            ..SessionConfig::default()
        };
        assert!(matches!(Session::new(config), Err(CoreError::Config { .. })));
    }

    #[test]
    fn zero_health_interval_is_rejected() {
        let config = SessionConfig {
            backend_url: Some("http://localhost:1337".into()),
            health_interval: Some(Duration::ZERO),
            ..SessionConfig::default()
        };
        assert!(matches!(Session::new(config), Err(CoreError::Config { .. })));
    }

    #[tokio::test]
    async fn write_without_realtime_is_unsupported() {
        let config = SessionConfig {
            backend_url: Some("http://localhost:1337".into()),
            realtime: false,
            ..SessionConfig::default()
        };
        let session = Session::new(config).unwrap();

        let err = session
            .set_attribute("d1", "levelA", Some(AttributeValue::Int(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn write_before_connect_is_disconnected() {
        let config = SessionConfig {
            backend_url: Some("http://localhost:1337".into()),
            ..SessionConfig::default()
        };
        let session = Session::new(config).unwrap();

        let err = session
            .set_attribute("d1", "levelA", Some(AttributeValue::Int(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Disconnected));
    }
}
