//! Atomic counters for the producer/dispatcher pipeline.
//!
//! Grounded on `original_source/internal/application/node/metrics.go`.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
pub struct Counters {
    produced: AtomicI64,
    dropped: AtomicI64,
    sent: AtomicI64,
    failed: AtomicI64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn produced(&self) -> i64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> i64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> i64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> i64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let c = Counters::new();
        assert_eq!(c.produced(), 0);
        c.inc_produced();
        c.inc_produced();
        c.inc_dropped();
        assert_eq!(c.produced(), 2);
        assert_eq!(c.dropped(), 1);
    }
}
