// ── Real-time event routing ──
//
// Maps incoming Socket.IO events onto registry operations.

use serde_json::Value;
use slvctl_api::{RawDevice, SocketEvent};
use tracing::{trace, warn};

use crate::model::Device;
use crate::store::DeviceRegistry;

/// A device's state changed on the backend.
pub const DEVICE_REFRESHED_EVENT: &str = "deviceRefreshed";
/// A device appeared.
pub const DEVICE_CONNECTED_EVENT: &str = "deviceConnected";
/// A device went away.
pub const DEVICE_DISCONNECTED_EVENT: &str = "deviceDisconnected";

/// What an incoming event did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Updated(String),
    /// Update for an unknown device or one whose gate is closed.
    Dropped(String),
    Added(String),
    Removed(String),
    /// Event name this client does not handle, or an undecodable payload.
    Ignored,
}

/// Apply one incoming event to the registry.
pub fn route_event(registry: &DeviceRegistry, event: &SocketEvent) -> Routed {
    match event.name.as_str() {
        DEVICE_REFRESHED_EVENT => match decode_device(&event.payload) {
            Some(device) => {
                let id = device.device_id.clone();
                if registry.update(device) {
                    Routed::Updated(id)
                } else {
                    Routed::Dropped(id)
                }
            }
            None => Routed::Ignored,
        },
        DEVICE_CONNECTED_EVENT => match decode_device(&event.payload) {
            Some(device) => {
                let id = device.device_id.clone();
                registry.add(device);
                Routed::Added(id)
            }
            None => Routed::Ignored,
        },
        DEVICE_DISCONNECTED_EVENT => match device_id_of(&event.payload) {
            Some(id) => {
                registry.remove(&id);
                Routed::Removed(id)
            }
            None => {
                warn!(payload = %event.payload, "disconnect event without a device id");
                Routed::Ignored
            }
        },
        other => {
            trace!(event = other, "ignoring event");
            Routed::Ignored
        }
    }
}

fn decode_device(payload: &Value) -> Option<Device> {
    match serde_json::from_value::<RawDevice>(payload.clone()) {
        Ok(raw) => Some(Device::from(raw)),
        Err(e) => {
            warn!(error = %e, "undecodable device payload");
            None
        }
    }
}

/// Disconnect notifications carry either the full device or just its id.
fn device_id_of(payload: &Value) -> Option<String> {
    match payload {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) => map.get("deviceId")?.as_str().map(str::to_owned),
        _ => None,
    }
}
