//! Throughput and allocation statistics.
//!
//! All counters are `Cell`-based and shared through an `Rc`: the whole
//! server runs on one thread, so interior mutability without locking is
//! safe by construction. The get/set/delete/update counters and the
//! request counter reset on every report; the live-allocation gauge
//! does not.

use std::cell::Cell;

/// Process-wide counters, reported on a ~1 second cadence.
#[derive(Debug, Default)]
pub struct StatCounters {
    requests: Cell<u64>,
    gets: Cell<u64>,
    sets: Cell<u64>,
    deletes: Cell<u64>,
    updates: Cell<u64>,
    /// Live owned keys and values currently held by the index.
    /// Borrowed probe keys never count.
    live_allocations: Cell<i64>,
}

/// One reporting interval's worth of counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatReport {
    pub requests: u64,
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub updates: u64,
    pub live_allocations: i64,
}

impl StatCounters {
    pub fn record_request(&self) {
        self.requests.set(self.requests.get() + 1);
    }

    pub fn record_get(&self) {
        self.gets.set(self.gets.get() + 1);
    }

    pub fn record_set(&self) {
        self.sets.set(self.sets.get() + 1);
    }

    pub fn record_delete(&self) {
        self.deletes.set(self.deletes.get() + 1);
    }

    pub fn record_update(&self) {
        self.updates.set(self.updates.get() + 1);
    }

    /// Adjust the live-allocation gauge by `delta` allocations.
    pub fn adjust_allocations(&self, delta: i64) {
        self.live_allocations.set(self.live_allocations.get() + delta);
    }

    #[must_use]
    pub fn live_allocations(&self) -> i64 {
        self.live_allocations.get()
    }

    /// Snapshot the interval counters and reset them. The allocation
    /// gauge is reported but not reset.
    pub fn take_report(&self) -> StatReport {
        StatReport {
            requests: self.requests.take(),
            gets: self.gets.take(),
            sets: self.sets.take(),
            deletes: self.deletes.take(),
            updates: self.updates.take(),
            live_allocations: self.live_allocations.get(),
        }
    }
}
