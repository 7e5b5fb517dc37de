// ── Domain model ──
//
// Canonical, strongly-typed representations of what the backend reports.
// Consumers (CLI) depend on these, never on the raw wire types.

pub mod attribute;
pub mod device;
pub mod health;

pub use attribute::{
    AttributeKind, AttributeModifier, AttributeValue, DeviceAttribute, ListItem, ListKey,
};
pub use device::{Device, DeviceError, DeviceStatus};
pub use health::{HealthSample, HealthSeries};
