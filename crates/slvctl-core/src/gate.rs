// ── Update gate ──
//
// After a local write, pushes for that device are ignored for a short
// quiet period so the echo of an older state cannot overwrite the user's
// edit. The gate reopens on a timer, not on an acknowledgment: a late
// echo after the window still wins, and a legitimate change from another
// client during the window is lost until the next push.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::store::DeviceRegistry;

// ── Debouncer ────────────────────────────────────────────────────────

/// Single-shot, re-armable timer.
///
/// Every [`trigger`](Self::trigger) replaces the pending run, so a burst of
/// triggers produces exactly one handler call, `delay` after the last one.
/// Must be triggered from inside a Tokio runtime.
pub struct Debouncer {
    delay: Duration,
    handler: Arc<dyn Fn() + Send + Sync>,
    pending: Mutex<Option<AbortHandle>>,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration, handler: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            delay,
            handler: Arc::new(handler),
            pending: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// (Re)arm the timer, cancelling any pending run.
    pub fn trigger(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        // A run that already woke up but lost the race with `abort` sees
        // a newer generation and stands down.
        let my_generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let generation = Arc::clone(&self.generation);
        let handler = Arc::clone(&self.handler);
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::Acquire) == my_generation {
                handler();
            }
        });
        *pending = Some(task.abort_handle());
    }

    /// Drop the pending run, if any, without calling the handler.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(handle) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Whether a run is scheduled and has not completed.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── UpdateGate ───────────────────────────────────────────────────────

/// One debouncer per device, each reopening that device's gate.
pub struct UpdateGate {
    registry: Arc<DeviceRegistry>,
    delay: Duration,
    timers: DashMap<String, Debouncer>,
}

impl UpdateGate {
    pub fn new(registry: Arc<DeviceRegistry>, delay: Duration) -> Self {
        Self {
            registry,
            delay,
            timers: DashMap::new(),
        }
    }

    /// Close the device's gate now and (re)arm its reopen timer.
    pub fn hold(&self, device_id: &str) {
        self.forget_removed();
        self.registry.set_receive_updates(device_id, false);

        self.timers
            .entry(device_id.to_owned())
            .or_insert_with(|| {
                let registry = Arc::clone(&self.registry);
                let id = device_id.to_owned();
                Debouncer::new(self.delay, move || {
                    trace!(device_id = %id, "update gate reopened");
                    registry.set_receive_updates(&id, true);
                })
            })
            .trigger();
    }

    /// Whether the device has a reopen pending.
    pub fn is_held(&self, device_id: &str) -> bool {
        self.timers.get(device_id).is_some_and(|t| t.is_pending())
    }

    /// Drop every reopen timer and open those gates right away. A gate
    /// must never outlive its timer in the closed state.
    pub fn release_all(&self) {
        let held: Vec<String> = self.timers.iter().map(|t| t.key().clone()).collect();
        self.timers.clear();
        for id in held {
            if self.registry.set_receive_updates(&id, true) {
                trace!(device_id = %id, "update gate released");
            }
        }
    }

    /// Timers of devices no longer in the registry.
    fn forget_removed(&self) {
        self.timers.retain(|id, _| self.registry.get(id).is_some());
    }
}
