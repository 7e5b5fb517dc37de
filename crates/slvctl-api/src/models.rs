// Wire types for the slvCtrl+ backend.
//
// These mirror the JSON the backend produces and consumes. They are kept
// deliberately loose (strings for timestamps, raw JSON for attributes);
// `slvctl-core` converts them into strongly-typed domain types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Envelopes ────────────────────────────────────────────────────────

/// Listing envelope: `{ "items": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// Device record as sent by `GET /devices` and by real-time pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDevice {
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error_info: Option<RawDeviceError>,
    #[serde(default)]
    pub connected_since: Option<String>,
    #[serde(default)]
    pub last_refresh: Option<String>,
    /// Attribute descriptors keyed by attribute name, in backend order.
    /// Values stay raw here; malformed descriptors are dropped during
    /// conversion rather than failing the whole record.
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceError {
    pub reason: String,
    #[serde(default)]
    pub occurred_at: Option<String>,
}

/// Payload of the outgoing `deviceUpdate` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub device_id: String,
    pub data: Map<String, Value>,
}

impl DeviceUpdate {
    /// Single-attribute update, the only shape the dashboard ever sends.
    pub fn single(device_id: impl Into<String>, attribute: impl Into<String>, value: Value) -> Self {
        let mut data = Map::new();
        data.insert(attribute.into(), value);
        Self {
            device_id: device_id.into(),
            data,
        }
    }
}

// ── Automation ───────────────────────────────────────────────────────

/// A stored automation script.
///
/// Only the name is required; the listing omits `code`. Unknown fields
/// round-trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationScript {
    #[serde(alias = "fileName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AutomationScript {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Some(code.into()),
            extra: Map::new(),
        }
    }
}

// ── Settings ─────────────────────────────────────────────────────────

/// A single field-level error returned with HTTP 400 on settings save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(alias = "property", alias = "path")]
    pub field: String,
    #[serde(alias = "msg")]
    pub message: String,
}

/// HTTP 400 body. Accepts both `{ "errors": [...] }` and a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ValidationBody {
    Wrapped { errors: Vec<FieldError> },
    Bare(Vec<FieldError>),
}

impl ValidationBody {
    pub(crate) fn into_errors(self) -> Vec<FieldError> {
        match self {
            Self::Wrapped { errors } | Self::Bare(errors) => errors,
        }
    }
}

// ── Health ───────────────────────────────────────────────────────────

/// `GET /health` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub process: ProcessInfo,
    pub system: HostInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub memory_usage: MemoryUsage,
}

/// Process memory in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    #[serde(default)]
    pub external: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub cpu: CpuInfo,
    pub memory: HostMemory,
    pub os: OsInfo,
    /// Seconds.
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub usage: f64,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMemory {
    pub total_mem_mb: f64,
    pub used_mem_mb: f64,
    pub free_mem_mb: f64,
    pub used_mem_percentage: f64,
    pub free_mem_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    #[serde(default)]
    pub name: String,
}
