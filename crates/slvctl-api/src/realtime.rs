//! Socket.IO real-time channel with auto-reconnect.
//!
//! Speaks Engine.IO v4 / Socket.IO v4 over a plain WebSocket (no HTTP
//! long-polling upgrade) to the backend's default namespace. Incoming
//! events are parsed and fanned out through a [`tokio::sync::broadcast`]
//! channel; outgoing events are queued on an `mpsc` channel and written
//! by the connection task, so emits made while reconnecting are delivered
//! once the socket is back. Reconnection uses exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use slvctl_api::realtime::{SocketHandle, ReconnectConfig, socket_url};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = socket_url(&Url::parse("http://localhost:1337")?)?;
//!
//! let handle = SocketHandle::connect(url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! handle.emit("deviceUpdate", &serde_json::json!({ "deviceId": "d1", "data": { "levelA": 10 } }))?;
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {}", event.name, event.payload);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTGOING_CHANNEL_CAPACITY: usize = 256;

// ── SocketEvent ──────────────────────────────────────────────────────

/// A named event received from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketEvent {
    /// Event name, e.g. `"deviceRefreshed"`.
    pub name: String,

    /// First event argument; `Value::Null` when the event carried none.
    pub payload: Value,
}

// ── ChannelState ─────────────────────────────────────────────────────

/// Observable state of the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Closed,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── URL ──────────────────────────────────────────────────────────────

/// Derive the Socket.IO WebSocket endpoint from the backend HTTP URL.
///
/// `http://host:1337` → `ws://host:1337/socket.io/?EIO=4&transport=websocket`
pub fn socket_url(backend: &Url) -> Result<Url, Error> {
    let scheme = match backend.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported URL scheme '{other}'"
            )));
        }
    };

    let host = backend
        .host_str()
        .ok_or_else(|| Error::WebSocketConnect("backend URL has no host".into()))?;
    let prefix = backend.path().trim_end_matches('/');
    let raw = match backend.port() {
        Some(p) => format!("{scheme}://{host}:{p}{prefix}/socket.io/"),
        None => format!("{scheme}://{host}{prefix}/socket.io/"),
    };

    let mut url = Url::parse(&raw)?;
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    Ok(url)
}

// ── SocketHandle ─────────────────────────────────────────────────────

/// Handle to a running Socket.IO connection.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct SocketHandle {
    event_rx: broadcast::Receiver<Arc<SocketEvent>>,
    outgoing_tx: mpsc::Sender<String>,
    state_rx: watch::Receiver<ChannelState>,
    queued: Arc<AtomicU64>,
    written_rx: watch::Receiver<u64>,
    cancel: CancellationToken,
}

impl SocketHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; watch
    /// [`state`](Self::state) or just start emitting (emits are queued).
    pub fn connect(url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (written_tx, written_rx) = watch::channel(0u64);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let io = LoopIo {
                event_tx,
                outgoing_rx,
                state_tx,
                written_tx,
            };
            socket_loop(url, io, reconnect, task_cancel).await;
        });

        Self {
            event_rx,
            outgoing_tx,
            state_rx,
            queued: Arc::new(AtomicU64::new(0)),
            written_rx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for incoming events.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SocketEvent>> {
        self.event_rx.resubscribe()
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Queue an event for the backend. Never blocks.
    pub fn emit(&self, name: &str, payload: &impl Serialize) -> Result<(), Error> {
        let frame = encode_event(name, payload)?;
        self.outgoing_tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Protocol("outgoing queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => Error::ChannelClosed,
        })?;
        self.queued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Wait until the channel reports [`ChannelState::Connected`].
    pub async fn wait_connected(&self) -> Result<(), Error> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|s| matches!(s, ChannelState::Connected | ChannelState::Closed))
            .await
            .map_err(|_| Error::ChannelClosed)
            .and_then(|s| match *s {
                ChannelState::Closed => Err(Error::ChannelClosed),
                _ => Ok(()),
            })
    }

    /// Wait until every event emitted so far has been written to the socket.
    pub async fn flush(&self) -> Result<(), Error> {
        let target = self.queued.load(Ordering::SeqCst);
        let mut rx = self.written_rx.clone();
        rx.wait_for(|written| *written >= target)
            .await
            .map(|_| ())
            .map_err(|_| Error::ChannelClosed)
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Channel endpoints owned by the connection loop.
struct LoopIo {
    event_tx: broadcast::Sender<Arc<SocketEvent>>,
    outgoing_rx: mpsc::Receiver<String>,
    state_tx: watch::Sender<ChannelState>,
    written_tx: watch::Sender<u64>,
}

/// Main loop: connect → run → on error, backoff → reconnect.
async fn socket_loop(url: Url, mut io: LoopIo, reconnect: ReconnectConfig, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        // Cancellation is handled inside so the close frame still goes out.
        let result = connect_and_run(&url, &mut io, &cancel).await;

        match result {
            Ok(()) if cancel.is_cancelled() => break,
            // Server closed the session; reconnect right away.
            Ok(()) => {
                tracing::info!("Socket.IO session ended, reconnecting");
                attempt = 0;
                let _ = io.state_tx.send(ChannelState::Reconnecting { attempt });
            }
            Err(Error::ChannelClosed) => break,
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Socket.IO error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "Socket.IO reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );
                let _ = io.state_tx.send(ChannelState::Reconnecting { attempt });

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    let _ = io.state_tx.send(ChannelState::Closed);
    tracing::debug!("Socket.IO loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one WebSocket, perform the Socket.IO handshake, then pump frames
/// in both directions until the connection drops.
async fn connect_and_run(url: &Url, io: &mut LoopIo, cancel: &CancellationToken) -> Result<(), Error> {
    tracing::info!(url = %url, "Connecting to Socket.IO");

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        connected = tokio_tungstenite::connect_async(url.as_str()) => {
            connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut joined = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::text(ENGINE_CLOSE)).await;
                return Ok(());
            }
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "WebSocket close frame received");
                        }
                        return Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                };

                match decode_frame(&text) {
                    Frame::Open => {
                        tracing::debug!("Engine.IO open, joining default namespace");
                        write
                            .send(Message::text(SOCKET_CONNECT))
                            .await
                            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                    }
                    Frame::Connected => {
                        tracing::info!("Socket.IO connected");
                        joined = true;
                        let _ = io.state_tx.send(ChannelState::Connected);
                    }
                    Frame::ConnectError(reason) => {
                        return Err(Error::Protocol(format!("namespace connect refused: {reason}")));
                    }
                    Frame::Ping => {
                        write
                            .send(Message::text(ENGINE_PONG))
                            .await
                            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                    }
                    Frame::Event(event) => {
                        tracing::trace!(name = %event.name, "Socket.IO event");
                        // No subscribers is fine
                        let _ = io.event_tx.send(Arc::new(event));
                    }
                    Frame::Close | Frame::Disconnect => return Ok(()),
                    Frame::Ignored => {}
                    Frame::Malformed(reason) => {
                        tracing::debug!(reason, frame = text.as_str(), "Skipping malformed Socket.IO frame");
                    }
                }
            }
            outgoing = io.outgoing_rx.recv(), if joined => {
                let Some(frame) = outgoing else {
                    return Err(Error::ChannelClosed);
                };
                write
                    .send(Message::text(frame))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                io.written_tx.send_modify(|n| *n += 1);
            }
        }
    }
}

// ── Frame codec ──────────────────────────────────────────────────────

const ENGINE_CLOSE: &str = "1";
const ENGINE_PONG: &str = "3";
const SOCKET_CONNECT: &str = "40";

/// A decoded Engine.IO / Socket.IO text frame.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    /// Engine.IO `0{...}` handshake.
    Open,
    /// Engine.IO `1`.
    Close,
    /// Engine.IO `2`; must be answered with a pong.
    Ping,
    /// Socket.IO `40{...}`.
    Connected,
    /// Socket.IO `41`.
    Disconnect,
    /// Socket.IO `44{...}`.
    ConnectError(String),
    /// Socket.IO `42[...]`.
    Event(SocketEvent),
    /// Pong, noop, acks, binary placeholders.
    Ignored,
    Malformed(&'static str),
}

/// Decode one text frame.
pub(crate) fn decode_frame(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Frame::Open,
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping,
        Some('4') => decode_socket_packet(chars.as_str()),
        Some('3' | '5' | '6') => Frame::Ignored,
        _ => Frame::Malformed("unknown Engine.IO packet type"),
    }
}

/// Decode the Socket.IO packet carried in an Engine.IO message.
fn decode_socket_packet(packet: &str) -> Frame {
    let mut chars = packet.chars();
    let kind = chars.next();
    let rest = skip_namespace(chars.as_str());

    match kind {
        Some('0') => Frame::Connected,
        Some('1') => Frame::Disconnect,
        Some('2') => decode_event(rest),
        Some('4') => {
            let reason = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| rest.to_owned());
            Frame::ConnectError(reason)
        }
        Some('3' | '5' | '6') => Frame::Ignored,
        _ => Frame::Malformed("unknown Socket.IO packet type"),
    }
}

/// Strip an optional `/namespace,` prefix.
fn skip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        rest.split_once(',').map_or("", |(_, tail)| tail)
    } else {
        rest
    }
}

/// Parse `[ackId]["name", payload, ...]`.
fn decode_event(rest: &str) -> Frame {
    let body = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let Ok(Value::Array(mut args)) = serde_json::from_str::<Value>(body) else {
        return Frame::Malformed("event body is not a JSON array");
    };
    if args.is_empty() {
        return Frame::Malformed("event has no name");
    }
    let Value::String(name) = args.remove(0) else {
        return Frame::Malformed("event name is not a string");
    };
    let payload = if args.is_empty() {
        Value::Null
    } else {
        args.swap_remove(0)
    };
    Frame::Event(SocketEvent { name, payload })
}

/// Encode an outgoing event as `42["name",payload]`.
pub(crate) fn encode_event(name: &str, payload: &impl Serialize) -> Result<String, Error> {
    let payload = serde_json::to_value(payload).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })?;
    let body = Value::Array(vec![Value::String(name.to_owned()), payload]);
    Ok(format!("42{body}"))
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
