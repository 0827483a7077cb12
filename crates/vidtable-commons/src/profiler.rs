//! Lightweight per-worker profiler.
//!
//! Workers record named byte counters and accumulated wall-clock intervals
//! (`io`, `setup`, ...). The profiler is cheaply cloneable; clones share the
//! same counters so a worker can hand one to helpers it calls into.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct ProfilerInner {
    counters: Mutex<HashMap<String, u64>>,
    intervals: Mutex<HashMap<String, Duration>>,
}

/// Shared-handle profiler. `Default` yields an empty one.
#[derive(Clone, Default)]
pub struct Profiler {
    inner: Arc<ProfilerInner>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the named counter, creating it at zero if absent.
    pub fn increment(&self, name: &str, delta: u64) {
        let mut counters = self.inner.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Accumulate the elapsed time between `start` and `end` under `name`.
    pub fn add_interval(&self, name: &str, start: Instant, end: Instant) {
        let mut intervals = self.inner.intervals.lock();
        *intervals.entry(name.to_string()).or_default() += end.duration_since(start);
    }

    /// Current value of a counter; zero if never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        self.inner.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Total accumulated duration for an interval name.
    pub fn interval(&self, name: &str) -> Duration {
        self.inner
            .intervals
            .lock()
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Snapshot of all counters, for teardown logging.
    pub fn counters(&self) -> HashMap<String, u64> {
        self.inner.counters.lock().clone()
    }
}
