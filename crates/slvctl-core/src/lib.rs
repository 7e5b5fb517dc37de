// slvctl-core: Reactive device registry and session layer between slvctl-api and the CLI.

pub mod communicator;
pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod gate;
pub mod model;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use communicator::{DeviceCommunicator, UpdateEmitter, WriteOutcome};
pub use config::SessionConfig;
pub use error::CoreError;
pub use gate::{Debouncer, UpdateGate};
pub use session::{ConnectionState, Session};
pub use store::DeviceRegistry;
pub use stream::{DeviceChange, DeviceSnapshot, DeviceStream};

pub use model::{
    AttributeKind, AttributeModifier, AttributeValue, Device, DeviceAttribute, DeviceError,
    DeviceStatus, HealthSample, HealthSeries, ListItem, ListKey,
};

// Wire types consumers handle directly.
pub use slvctl_api::{AutomationScript, FieldError, SystemInfo, TlsMode};
