// ── Device domain types ──

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::attribute::DeviceAttribute;

/// Operational state reported by the backend.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DeviceStatus {
    Ready,
    Busy,
    Error,
    #[default]
    Unknown,
}

/// Last error a device reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceError {
    pub reason: String,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// A device known to the backend, as mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub state: DeviceStatus,
    pub error: Option<DeviceError>,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
    /// Update gate flag. While `false`, server pushes for this device
    /// are dropped so a local edit is not overwritten.
    pub receive_updates: bool,
    /// Attributes in backend order.
    pub attributes: IndexMap<String, DeviceAttribute>,
}

impl Device {
    /// A bare device with no metadata or attributes.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: None,
            device_model: None,
            device_type: None,
            state: DeviceStatus::Unknown,
            error: None,
            connected_since: None,
            last_refresh: None,
            receive_updates: true,
            attributes: IndexMap::new(),
        }
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or(&self.device_id)
    }

    pub fn attribute(&self, name: &str) -> Option<&DeviceAttribute> {
        self.attributes.get(name)
    }

    pub fn with_attribute(mut self, attribute: DeviceAttribute) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }
}
