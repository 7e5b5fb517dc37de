// Keyed entity storage that republishes an id-ordered snapshot on every
// effective mutation.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;

pub(crate) type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Records keyed by id. Each record sits behind an `Arc`; mutation goes
/// through [`Arc::make_mut`], so snapshots already handed out never see
/// later edits.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    entries: DashMap<String, Arc<T>>,
    revision: watch::Sender<u64>,
    published: watch::Sender<Snapshot<T>>,
    /// Held while a snapshot is built and sent, so the last one sent
    /// always reflects the newest map state.
    publishing: Mutex<()>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
            revision: watch::Sender::new(0),
            published: watch::Sender::new(Arc::default()),
            publishing: Mutex::new(()),
        }
    }

    /// `true` when `key` was not present before.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let fresh = self.entries.insert(key, Arc::new(entity)).is_none();
        self.publish();
        fresh
    }

    /// Run `f` against the stored record. The `bool` half of its result
    /// decides whether a new snapshot goes out. `None` for unknown keys.
    pub(crate) fn update_with<R>(&self, key: &str, f: impl FnOnce(&mut T) -> (bool, R)) -> Option<R> {
        let (dirty, out) = {
            let mut slot = self.entries.get_mut(key)?;
            f(Arc::make_mut(slot.value_mut()))
        };
        // The shard lock must be gone before `publish` walks the map.
        if dirty {
            self.publish();
        }
        Some(out)
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let (_, gone) = self.entries.remove(key)?;
        self.publish();
        Some(gone)
    }

    /// Keep only the keys accepted by `keep`; returns the number dropped.
    pub(crate) fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let count = self.entries.len();
        self.entries.retain(|key, _| keep(key));
        let dropped = count.saturating_sub(self.entries.len());
        if dropped > 0 {
            self.publish();
        }
        dropped
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).map(|slot| Arc::clone(slot.value()))
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        Arc::clone(&self.published.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.published.subscribe()
    }

    /// Number of snapshots published so far.
    pub(crate) fn version(&self) -> u64 {
        *self.revision.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn publish(&self) {
        let _guard = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ordered: Vec<_> = self
            .entries
            .iter()
            .map(|slot| (slot.key().clone(), Arc::clone(slot.value())))
            .collect();
        ordered.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        let next: Snapshot<T> = Arc::new(ordered.into_iter().map(|(_, v)| v).collect());

        // send_replace stores the value even while nobody is subscribed.
        self.published.send_replace(next);
        self.revision.send_modify(|n| *n += 1);
    }
}
