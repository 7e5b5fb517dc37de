// ── Registry subscriptions ──
//
// A `DeviceStream` wraps the registry's `watch` receiver. Consumers
// either take whole snapshots or ask for per-device changes against the
// last snapshot they saw.

use std::cmp::Ordering;
use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Device;

/// Registry contents at one point in time, ordered by device id.
pub type DeviceSnapshot = Arc<Vec<Arc<Device>>>;

/// One difference between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceChange {
    Added(Arc<Device>),
    Changed(Arc<Device>),
    Removed(String),
}

impl DeviceChange {
    pub fn device_id(&self) -> &str {
        match self {
            Self::Added(d) | Self::Changed(d) => &d.device_id,
            Self::Removed(id) => id,
        }
    }
}

/// Subscription to a [`DeviceRegistry`](crate::DeviceRegistry).
pub struct DeviceStream {
    seen: DeviceSnapshot,
    receiver: watch::Receiver<DeviceSnapshot>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<DeviceSnapshot>) -> Self {
        let seen = receiver.borrow().clone();
        Self { seen, receiver }
    }

    /// The snapshot from subscription time or the last `changed()`.
    pub fn current(&self) -> &DeviceSnapshot {
        &self.seen
    }

    /// The registry's snapshot right now.
    pub fn latest(&self) -> DeviceSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the registry to change. `None` once the registry is gone.
    pub async fn changed(&mut self) -> Option<DeviceSnapshot> {
        self.receiver.changed().await.ok()?;
        self.seen = self.receiver.borrow_and_update().clone();
        Some(self.seen.clone())
    }

    /// Wait for the registry to change and report what differs from the
    /// previously seen snapshot. Mutations that leave every record
    /// untouched yield an empty list.
    pub async fn next_changes(&mut self) -> Option<Vec<DeviceChange>> {
        let before = self.seen.clone();
        let after = self.changed().await?;
        Some(diff(&before, &after))
    }

    /// Stream of snapshots, starting with the latest one.
    pub fn into_stream(self) -> impl Stream<Item = DeviceSnapshot> + Unpin {
        WatchStream::new(self.receiver)
    }
}

/// Per-device differences between two id-ordered snapshots. A record
/// counts as changed when it is a different allocation; the registry
/// copies on write, so an untouched device keeps its `Arc`.
pub fn diff(before: &[Arc<Device>], after: &[Arc<Device>]) -> Vec<DeviceChange> {
    let mut changes = Vec::new();
    let (mut old, mut new) = (before.iter().peekable(), after.iter().peekable());

    loop {
        match (old.peek(), new.peek()) {
            (None, None) => break,
            (Some(o), None) => {
                changes.push(DeviceChange::Removed(o.device_id.clone()));
                old.next();
            }
            (None, Some(n)) => {
                changes.push(DeviceChange::Added(Arc::clone(n)));
                new.next();
            }
            (Some(o), Some(n)) => match o.device_id.cmp(&n.device_id) {
                Ordering::Less => {
                    changes.push(DeviceChange::Removed(o.device_id.clone()));
                    old.next();
                }
                Ordering::Greater => {
                    changes.push(DeviceChange::Added(Arc::clone(n)));
                    new.next();
                }
                Ordering::Equal => {
                    if !Arc::ptr_eq(o, n) {
                        changes.push(DeviceChange::Changed(Arc::clone(n)));
                    }
                    old.next();
                    new.next();
                }
            },
        }
    }

    changes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;

    use crate::store::DeviceRegistry;

    fn ids(changes: &[DeviceChange]) -> Vec<String> {
        changes
            .iter()
            .map(|c| match c {
                DeviceChange::Added(d) => format!("+{}", d.device_id),
                DeviceChange::Changed(d) => format!("~{}", d.device_id),
                DeviceChange::Removed(id) => format!("-{id}"),
            })
            .collect()
    }

    #[test]
    fn diff_walks_both_snapshots_in_id_order() {
        let a = Arc::new(Device::new("a"));
        let b = Arc::new(Device::new("b"));
        let c = Arc::new(Device::new("c"));
        let b2 = Arc::new(Device::new("b"));
        let d = Arc::new(Device::new("d"));

        let before = vec![a.clone(), b, c];
        let after = vec![a, b2, d];

        assert_eq!(ids(&diff(&before, &after)), ["~b", "-c", "+d"]);
        assert!(diff(&after, &after).is_empty());
    }

    #[tokio::test]
    async fn next_changes_reports_only_touched_devices() {
        let registry = DeviceRegistry::new();
        registry.add(Device::new("d1"));
        registry.add(Device::new("d2"));

        let mut stream = registry.subscribe();
        assert_eq!(stream.current().len(), 2);

        registry.set_receive_updates("d2", false);
        let changes = stream.next_changes().await.unwrap();
        assert_eq!(ids(&changes), ["~d2"]);

        registry.remove("d1");
        let changes = stream.next_changes().await.unwrap();
        assert_eq!(changes[0].device_id(), "d1");
        assert_eq!(ids(&changes), ["-d1"]);
    }

    #[tokio::test]
    async fn into_stream_starts_with_latest_snapshot() {
        let registry = DeviceRegistry::new();
        let stream = registry.subscribe();
        registry.add(Device::new("d1"));

        let mut snapshots = stream.into_stream();
        let first = snapshots.next().await.unwrap();
        assert_eq!(first.len(), 1);
    }
}
