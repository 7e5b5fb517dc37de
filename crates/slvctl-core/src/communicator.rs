// ── Device communicator ──
//
// The write path: validate a local attribute edit, apply it to the
// registry optimistically, hold the device's update gate and send the
// `deviceUpdate` event.

use std::sync::Arc;

use slvctl_api::{DeviceUpdate, SocketHandle};
use tracing::debug;

use crate::error::CoreError;
use crate::gate::UpdateGate;
use crate::model::AttributeValue;
use crate::store::DeviceRegistry;

/// Name of the outgoing attribute-write event.
pub const DEVICE_UPDATE_EVENT: &str = "deviceUpdate";

/// Sink for outgoing device updates.
pub trait UpdateEmitter: Send + Sync {
    fn emit_update(&self, update: &DeviceUpdate) -> Result<(), CoreError>;
}

impl UpdateEmitter for SocketHandle {
    fn emit_update(&self, update: &DeviceUpdate) -> Result<(), CoreError> {
        self.emit(DEVICE_UPDATE_EVENT, update).map_err(CoreError::from)
    }
}

/// Result of [`DeviceCommunicator::set_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The update was applied locally and queued for the backend.
    Sent,
    /// No value was given; nothing happened.
    Ignored,
}

/// Writes attribute values for devices in a registry.
pub struct DeviceCommunicator {
    registry: Arc<DeviceRegistry>,
    gate: Arc<UpdateGate>,
    emitter: Arc<dyn UpdateEmitter>,
}

impl DeviceCommunicator {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        gate: Arc<UpdateGate>,
        emitter: Arc<dyn UpdateEmitter>,
    ) -> Self {
        Self {
            registry,
            gate,
            emitter,
        }
    }

    /// Write one attribute.
    ///
    /// `None` is a no-op. Unknown devices and attributes, read-only
    /// attributes and values that don't fit the attribute's type are
    /// rejected before anything changes.
    pub fn set_attribute(
        &self,
        device_id: &str,
        attribute: &str,
        value: Option<AttributeValue>,
    ) -> Result<WriteOutcome, CoreError> {
        let device = self
            .registry
            .get(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            })?;
        let attr = device
            .attribute(attribute)
            .ok_or_else(|| CoreError::AttributeNotFound {
                device_id: device_id.to_owned(),
                attribute: attribute.to_owned(),
            })?;

        let Some(value) = value else {
            return Ok(WriteOutcome::Ignored);
        };
        attr.check_write(&value)?;

        // Nothing local changes unless the update was queued.
        let update = DeviceUpdate::single(device_id, attribute, value.to_json());
        self.emitter.emit_update(&update)?;

        self.gate.hold(device_id);
        self.registry.apply_local_write(device_id, attribute, &value);
        debug!(device_id, attribute, %value, "attribute write sent");

        Ok(WriteOutcome::Sent)
    }
}
