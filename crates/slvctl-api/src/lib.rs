// slvctl-api: Async Rust client for the slvCtrl+ backend (HTTP + Socket.IO)

pub mod client;
pub mod error;
pub mod models;
pub mod realtime;
pub mod transport;

mod automation;
mod devices;
mod health;
mod settings;

pub use client::BackendClient;
pub use error::Error;
pub use models::{
    AutomationScript, DeviceUpdate, FieldError, RawDevice, RawDeviceError, SystemInfo,
};
pub use realtime::{ChannelState, ReconnectConfig, SocketEvent, SocketHandle, socket_url};
pub use transport::{TlsMode, TransportConfig};
