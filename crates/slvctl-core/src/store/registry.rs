// ── Device registry ──
//
// Local mirror of the backend's devices, keyed by device id. Holds the
// per-device update gate flag and is the single place incoming pushes
// and optimistic local edits are applied.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use super::collection::EntityCollection;
use crate::model::{AttributeValue, Device};
use crate::stream::DeviceStream;

/// Observable, concurrent device registry.
pub struct DeviceRegistry {
    devices: EntityCollection<Device>,
    loaded: AtomicBool,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: EntityCollection::new(),
            loaded: AtomicBool::new(false),
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the registry contents with a full listing.
    ///
    /// Devices absent from the listing are dropped. A device whose gate is
    /// currently closed keeps its local attributes and its closed gate;
    /// everything else arrives gate-open.
    pub fn init(&self, devices: impl IntoIterator<Item = Device>) {
        let mut seen = HashSet::new();

        for mut device in devices {
            device.receive_updates = true;
            if let Some(existing) = self.devices.get(&device.device_id) {
                if !existing.receive_updates {
                    device.receive_updates = false;
                    device.attributes.clone_from(&existing.attributes);
                }
            }
            seen.insert(device.device_id.clone());
            self.devices.upsert(device.device_id.clone(), device);
        }

        let pruned = self.devices.retain(|id| seen.contains(id));
        self.loaded.store(true, Ordering::Release);
        debug!(devices = self.devices.len(), pruned, "registry initialized");
    }

    /// Insert or replace a device; the stored record is gate-open.
    pub fn add(&self, mut device: Device) {
        device.receive_updates = true;
        let id = device.device_id.clone();
        if self.devices.upsert(id.clone(), device) {
            debug!(device_id = %id, "device added");
        } else {
            debug!(device_id = %id, "device replaced");
        }
    }

    /// Remove a device. Unknown ids are ignored.
    pub fn remove(&self, device_id: &str) -> Option<Arc<Device>> {
        let removed = self.devices.remove(device_id);
        if removed.is_some() {
            debug!(device_id, "device removed");
        }
        removed
    }

    /// Apply a server-side update.
    ///
    /// Dropped when the device is unknown or its gate is closed. Otherwise
    /// the stored `last_refresh` and the whole attribute map are replaced
    /// by the incoming ones. Returns whether the update was applied.
    pub fn update(&self, incoming: Device) -> bool {
        let applied = self
            .devices
            .update_with(&incoming.device_id, |device| {
                if !device.receive_updates {
                    return (false, false);
                }
                device.last_refresh = incoming.last_refresh;
                device.attributes = incoming.attributes;
                (true, true)
            })
            .unwrap_or(false);

        if !applied {
            trace!(device_id = %incoming.device_id, "server update dropped");
        }
        applied
    }

    /// Open or close a device's update gate. Returns `false` for unknown ids.
    pub fn set_receive_updates(&self, device_id: &str, open: bool) -> bool {
        self.devices
            .update_with(device_id, |device| {
                let changed = device.receive_updates != open;
                device.receive_updates = open;
                (changed, ())
            })
            .is_some()
    }

    /// Optimistically store a locally written value.
    ///
    /// Returns `false` if the device or attribute is unknown.
    pub fn apply_local_write(&self, device_id: &str, attribute: &str, value: &AttributeValue) -> bool {
        self.devices
            .update_with(device_id, |device| match device.attributes.get_mut(attribute) {
                Some(attr) => {
                    attr.set_value(value);
                    (true, true)
                }
                None => (false, false),
            })
            .unwrap_or(false)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices.get(device_id)
    }

    /// All devices ordered by id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    /// Subscribe to registry changes.
    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.devices.subscribe())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.len() == 0
    }

    /// Whether a full listing has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Mutation counter, bumped whenever subscribers are notified.
    pub fn version(&self) -> u64 {
        self.devices.version()
    }
}
