// ── Device attribute types ──
//
// An attribute is a named, typed control or sensor value on a device.
// The `type` tag on the wire selects the variant; every consumer matches
// on `AttributeKind` exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Access mode of an attribute.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum AttributeModifier {
    #[serde(rename = "ro")]
    #[strum(serialize = "ro")]
    ReadOnly,
    #[default]
    #[serde(rename = "rw")]
    #[strum(serialize = "rw")]
    ReadWrite,
    #[serde(rename = "wo")]
    #[strum(serialize = "wo")]
    WriteOnly,
}

impl AttributeModifier {
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// A scalar attribute value as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric view; `None` for booleans and text.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Key or label of a list option. Numbers and strings both occur.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListKey {
    Int(i64),
    Text(String),
}

impl ListKey {
    fn matches(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (Self::Int(k), AttributeValue::Int(v)) => k == v,
            (Self::Text(k), AttributeValue::Text(v)) => k == v,
            _ => false,
        }
    }

    fn to_value(&self) -> AttributeValue {
        match self {
            Self::Int(i) => AttributeValue::Int(*i),
            Self::Text(s) => AttributeValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One selectable option of a `list` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub key: ListKey,
    pub value: ListKey,
}

fn default_step() -> f64 {
    1.0
}

/// Type-specific part of an attribute, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeKind {
    Bool {
        #[serde(default)]
        value: Option<bool>,
    },
    List {
        #[serde(default)]
        values: Vec<ListItem>,
        #[serde(default)]
        value: Option<ListKey>,
    },
    Str {
        #[serde(default)]
        value: Option<String>,
    },
    Int {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uom: Option<String>,
        #[serde(default)]
        value: Option<i64>,
    },
    Float {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uom: Option<String>,
        #[serde(default)]
        value: Option<f64>,
    },
    Range {
        min: f64,
        max: f64,
        #[serde(rename = "incrementStep", default = "default_step")]
        increment_step: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uom: Option<String>,
        #[serde(default)]
        value: Option<f64>,
    },
}

/// A named attribute on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub modifier: AttributeModifier,
    #[serde(flatten)]
    pub kind: AttributeKind,
}

impl DeviceAttribute {
    /// Wire tag of this attribute's type.
    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            AttributeKind::Bool { .. } => "bool",
            AttributeKind::List { .. } => "list",
            AttributeKind::Str { .. } => "str",
            AttributeKind::Int { .. } => "int",
            AttributeKind::Float { .. } => "float",
            AttributeKind::Range { .. } => "range",
        }
    }

    /// Label for display, falling back to the name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Unit of measure, if the attribute has one.
    pub fn uom(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Int { uom, .. }
            | AttributeKind::Float { uom, .. }
            | AttributeKind::Range { uom, .. } => uom.as_deref(),
            AttributeKind::Bool { .. } | AttributeKind::List { .. } | AttributeKind::Str { .. } => {
                None
            }
        }
    }

    /// Current value, `None` when not yet known.
    pub fn value(&self) -> Option<AttributeValue> {
        match &self.kind {
            AttributeKind::Bool { value } => value.map(AttributeValue::Bool),
            AttributeKind::List { value, .. } => value.as_ref().map(ListKey::to_value),
            AttributeKind::Str { value } => value.clone().map(AttributeValue::Text),
            AttributeKind::Int { value, .. } => value.map(AttributeValue::Int),
            AttributeKind::Float { value, .. } | AttributeKind::Range { value, .. } => {
                value.map(AttributeValue::Float)
            }
        }
    }

    /// Human-readable current value: list labels instead of keys, units
    /// appended.
    pub fn display_value(&self) -> String {
        let Some(value) = self.value() else {
            return "-".into();
        };
        if let AttributeKind::List { values, .. } = &self.kind {
            if let Some(item) = values.iter().find(|item| item.key.matches(&value)) {
                return item.value.to_string();
            }
        }
        match self.uom() {
            Some(uom) => format!("{value} {uom}"),
            None => value.to_string(),
        }
    }

    /// Parse user input into a value of this attribute's type.
    ///
    /// List attributes accept either an option key or its label.
    pub fn parse_value(&self, raw: &str) -> Result<AttributeValue, CoreError> {
        let raw = raw.trim();
        let invalid = |reason: String| CoreError::InvalidValue {
            attribute: self.name.clone(),
            reason,
        };

        match &self.kind {
            AttributeKind::Bool { .. } => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(AttributeValue::Bool(true)),
                "false" | "0" | "off" | "no" => Ok(AttributeValue::Bool(false)),
                _ => Err(invalid(format!("expected a boolean, got '{raw}'"))),
            },
            AttributeKind::Str { .. } => Ok(AttributeValue::Text(raw.to_owned())),
            AttributeKind::Int { .. } => raw
                .parse::<i64>()
                .map(AttributeValue::Int)
                .map_err(|_| invalid(format!("expected an integer, got '{raw}'"))),
            AttributeKind::Float { .. } | AttributeKind::Range { .. } => {
                if let Ok(i) = raw.parse::<i64>() {
                    return Ok(AttributeValue::Int(i));
                }
                raw.parse::<f64>()
                    .map(AttributeValue::Float)
                    .map_err(|_| invalid(format!("expected a number, got '{raw}'")))
            }
            AttributeKind::List { values, .. } => values
                .iter()
                .find(|item| item.key.to_string() == raw)
                .or_else(|| values.iter().find(|item| item.value.to_string() == raw))
                .map(|item| item.key.to_value())
                .ok_or_else(|| invalid(format!("'{raw}' is not one of the listed options"))),
        }
    }

    /// Check that a locally initiated write is acceptable: the attribute
    /// is writable, the value matches the type tag, range values are in
    /// bounds and list values name an existing option.
    pub fn check_write(&self, value: &AttributeValue) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::InvalidValue {
            attribute: self.name.clone(),
            reason,
        };

        if !self.modifier.is_writable() {
            return Err(invalid("attribute is read-only".into()));
        }

        match (&self.kind, value) {
            (AttributeKind::Bool { .. }, AttributeValue::Bool(_))
            | (AttributeKind::Str { .. }, AttributeValue::Text(_))
            | (AttributeKind::Int { .. }, AttributeValue::Int(_))
            | (AttributeKind::Float { .. }, AttributeValue::Int(_) | AttributeValue::Float(_)) => {
                Ok(())
            }
            (AttributeKind::Range { min, max, .. }, AttributeValue::Int(_) | AttributeValue::Float(_)) => {
                let v = value.as_f64().unwrap_or(f64::NAN);
                if v >= *min && v <= *max {
                    Ok(())
                } else {
                    Err(invalid(format!("{v} is outside [{min}, {max}]")))
                }
            }
            (AttributeKind::List { values, .. }, v) => {
                if values.iter().any(|item| item.key.matches(v)) {
                    Ok(())
                } else {
                    Err(invalid(format!("'{v}' is not one of the listed options")))
                }
            }
            (_, v) => Err(invalid(format!(
                "a {} attribute cannot hold '{v}'",
                self.type_tag()
            ))),
        }
    }

    /// Store a value. Callers validate with [`check_write`](Self::check_write)
    /// first; a value of the wrong shape is ignored.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_value(&mut self, new: &AttributeValue) {
        match (&mut self.kind, new) {
            (AttributeKind::Bool { value }, AttributeValue::Bool(b)) => *value = Some(*b),
            (AttributeKind::Str { value }, AttributeValue::Text(s)) => *value = Some(s.clone()),
            (AttributeKind::Int { value, .. }, AttributeValue::Int(i)) => *value = Some(*i),
            (
                AttributeKind::Float { value, .. } | AttributeKind::Range { value, .. },
                AttributeValue::Int(i),
            ) => *value = Some(*i as f64),
            (
                AttributeKind::Float { value, .. } | AttributeKind::Range { value, .. },
                AttributeValue::Float(f),
            ) => *value = Some(*f),
            (AttributeKind::List { value, .. }, AttributeValue::Int(i)) => {
                *value = Some(ListKey::Int(*i));
            }
            (AttributeKind::List { value, .. }, AttributeValue::Text(s)) => {
                *value = Some(ListKey::Text(s.clone()));
            }
            _ => tracing::debug!(attribute = %self.name, "ignoring value of mismatched type"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attr(value: serde_json::Value) -> DeviceAttribute {
        serde_json::from_value(value).unwrap()
    }

    fn level() -> DeviceAttribute {
        attr(json!({
            "name": "levelA", "label": "Level A", "type": "range", "modifier": "rw",
            "min": 0, "max": 99, "incrementStep": 1, "value": 10
        }))
    }

    fn mode() -> DeviceAttribute {
        attr(json!({
            "name": "mode", "type": "list", "modifier": "rw",
            "values": [{ "key": 0, "value": "Waves" }, { "key": 1, "value": "Stroke" }],
            "value": 1
        }))
    }

    #[test]
    fn deserializes_every_type_tag() {
        let tags: Vec<_> = [
            json!({ "name": "a", "type": "bool", "value": true }),
            json!({ "name": "b", "type": "list", "values": [] }),
            json!({ "name": "c", "type": "str", "modifier": "ro" }),
            json!({ "name": "d", "type": "int", "uom": "ms", "value": 5 }),
            json!({ "name": "e", "type": "float", "value": 2.5 }),
            json!({ "name": "f", "type": "range", "min": 0, "max": 1 }),
        ]
        .into_iter()
        .map(|v| attr(v).type_tag())
        .collect();

        assert_eq!(tags, ["bool", "list", "str", "int", "float", "range"]);
    }

    #[test]
    fn missing_modifier_defaults_to_read_write() {
        let a = attr(json!({ "name": "flag", "type": "bool" }));
        assert_eq!(a.modifier, AttributeModifier::ReadWrite);
        assert!(a.value().is_none());
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        assert!(
            serde_json::from_value::<DeviceAttribute>(json!({ "name": "x", "type": "color" }))
                .is_err()
        );
    }

    #[test]
    fn range_step_defaults_to_one() {
        let a = attr(json!({ "name": "r", "type": "range", "min": 0, "max": 10 }));
        assert!(
            matches!(a.kind, AttributeKind::Range { increment_step, .. } if (increment_step - 1.0).abs() < f64::EPSILON)
        );
    }

    #[test]
    fn parse_value_follows_type() {
        assert_eq!(level().parse_value("42").unwrap(), AttributeValue::Int(42));
        assert_eq!(level().parse_value("4.5").unwrap(), AttributeValue::Float(4.5));
        assert!(level().parse_value("loud").is_err());

        let flag = attr(json!({ "name": "on", "type": "bool" }));
        assert_eq!(flag.parse_value("off").unwrap(), AttributeValue::Bool(false));
    }

    #[test]
    fn list_accepts_key_or_label() {
        assert_eq!(mode().parse_value("0").unwrap(), AttributeValue::Int(0));
        assert_eq!(mode().parse_value("Stroke").unwrap(), AttributeValue::Int(1));
        assert!(mode().parse_value("Pulse").is_err());
    }

    #[test]
    fn check_write_enforces_bounds_and_type() {
        let a = level();
        assert!(a.check_write(&AttributeValue::Int(99)).is_ok());
        assert!(a.check_write(&AttributeValue::Int(100)).is_err());
        assert!(a.check_write(&AttributeValue::Float(-0.5)).is_err());
        assert!(a.check_write(&AttributeValue::Bool(true)).is_err());
        assert!(mode().check_write(&AttributeValue::Int(7)).is_err());
    }

    #[test]
    fn read_only_attribute_rejects_writes() {
        let a = attr(json!({ "name": "firmware", "type": "str", "modifier": "ro", "value": "1.2" }));
        let err = a.check_write(&AttributeValue::Text("2.0".into())).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn set_value_widens_ints_for_ranges() {
        let mut a = level();
        a.set_value(&AttributeValue::Int(42));
        assert_eq!(a.value(), Some(AttributeValue::Float(42.0)));
    }

    #[test]
    fn display_value_uses_list_label_and_unit() {
        assert_eq!(mode().display_value(), "Stroke");

        let delay = attr(json!({ "name": "delay", "type": "int", "uom": "ms", "value": 250 }));
        assert_eq!(delay.display_value(), "250 ms");

        let unknown = attr(json!({ "name": "x", "type": "str" }));
        assert_eq!(unknown.display_value(), "-");
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let value = serde_json::to_value(level()).unwrap();
        assert_eq!(value["type"], "range");
        assert_eq!(value["modifier"], "rw");
        assert_eq!(value["incrementStep"], 1.0);
    }
}
