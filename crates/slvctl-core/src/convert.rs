// ── API-to-domain type conversions ──
//
// Bridges raw `slvctl_api` wire types into `slvctl_core::model` domain
// types. Malformed attribute descriptors are skipped with a warning so one
// bad attribute never hides the whole device.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use slvctl_api::{RawDevice, RawDeviceError};

use crate::model::{Device, DeviceAttribute, DeviceError, DeviceStatus};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a backend timestamp: RFC 3339, or epoch milliseconds as text.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

fn parse_status(raw: Option<&str>) -> DeviceStatus {
    raw.and_then(|s| s.parse().ok()).unwrap_or_default()
}

/// Convert the raw attribute map, dropping entries that don't decode.
pub(crate) fn convert_attributes(
    device_id: &str,
    raw: IndexMap<String, serde_json::Value>,
) -> IndexMap<String, DeviceAttribute> {
    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<DeviceAttribute>(value) {
            Ok(attr) => Some((key, attr)),
            Err(e) => {
                tracing::warn!(device_id, attribute = %key, error = %e, "skipping malformed attribute");
                None
            }
        })
        .collect()
}

// ── Device ─────────────────────────────────────────────────────────

impl From<RawDeviceError> for DeviceError {
    fn from(raw: RawDeviceError) -> Self {
        Self {
            reason: raw.reason,
            occurred_at: parse_timestamp(raw.occurred_at.as_deref()),
        }
    }
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        let attributes = convert_attributes(&raw.device_id, raw.attributes);
        Self {
            state: parse_status(raw.state.as_deref()),
            error: raw.error_info.map(DeviceError::from),
            connected_since: parse_timestamp(raw.connected_since.as_deref()),
            last_refresh: parse_timestamp(raw.last_refresh.as_deref()),
            receive_updates: true,
            attributes,
            device_id: raw.device_id,
            device_name: raw.device_name,
            device_model: raw.device_model,
            device_type: raw.device_type,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn converts_full_device() {
        let raw: RawDevice = serde_json::from_value(json!({
            "deviceId": "et312-1",
            "deviceName": "ET312",
            "deviceModel": "ET312B",
            "type": "slvCtrlPlus",
            "state": "ERROR",
            "errorInfo": { "reason": "serial timeout", "occurredAt": "2024-05-01T10:00:00Z" },
            "connectedSince": "2024-05-01T09:00:00Z",
            "lastRefresh": "1714557600000",
            "attributes": {
                "levelA": { "name": "levelA", "type": "range", "min": 0, "max": 99, "value": 3 },
                "broken": { "name": "broken", "type": "hologram" },
                "mode": { "name": "mode", "type": "list", "values": [{ "key": 1, "value": "Waves" }] }
            }
        }))
        .unwrap();

        let device = Device::from(raw);

        assert_eq!(device.state, DeviceStatus::Error);
        assert_eq!(device.error.as_ref().unwrap().reason, "serial timeout");
        assert!(device.error.unwrap().occurred_at.is_some());
        assert_eq!(
            device.last_refresh.unwrap().timestamp_millis(),
            1_714_557_600_000
        );
        assert!(device.receive_updates);

        let names: Vec<_> = device.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, ["levelA", "mode"]);
    }

    #[test]
    fn unknown_state_and_bad_timestamp_degrade_gracefully() {
        let raw: RawDevice = serde_json::from_value(json!({
            "deviceId": "v1",
            "state": "SLEEPING",
            "connectedSince": "yesterday"
        }))
        .unwrap();

        let device = Device::from(raw);
        assert_eq!(device.state, DeviceStatus::Unknown);
        assert!(device.connected_since.is_none());
        assert!(device.attributes.is_empty());
    }
}
