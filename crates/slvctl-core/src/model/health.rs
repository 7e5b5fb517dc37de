// ── Backend health samples ──
//
// Bounded history of `/health` readings for trend display.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use slvctl_api::SystemInfo;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One reduced health reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSample {
    pub at: DateTime<Utc>,
    pub rss_mb: f64,
    pub heap_total_mb: f64,
    pub heap_used_mb: f64,
    pub cpu_percent: f64,
    pub used_mem_percent: f64,
}

impl HealthSample {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_info(info: &SystemInfo, at: DateTime<Utc>) -> Self {
        let mem = &info.process.memory_usage;
        Self {
            at,
            rss_mb: mem.rss as f64 / BYTES_PER_MB,
            heap_total_mb: mem.heap_total as f64 / BYTES_PER_MB,
            heap_used_mb: mem.heap_used as f64 / BYTES_PER_MB,
            cpu_percent: info.system.cpu.usage,
            used_mem_percent: info.system.memory.used_mem_percentage,
        }
    }
}

/// Fixed-capacity ring of samples; the oldest is dropped when full.
#[derive(Debug, Clone)]
pub struct HealthSeries {
    capacity: usize,
    samples: VecDeque<HealthSample>,
}

impl HealthSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: HealthSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&HealthSample> {
        self.samples.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HealthSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest CPU reading in the window.
    pub fn peak_cpu(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.cpu_percent).reduce(f64::max)
    }
}
