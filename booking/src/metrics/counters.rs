use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub holds_granted: Arc<AtomicU64>,
    pub holds_rejected: Arc<AtomicU64>,
    pub holds_expired: Arc<AtomicU64>,

    // payment outcomes
    pub payments_confirmed: Arc<AtomicU64>,
    pub payments_released: Arc<AtomicU64>,
    pub payments_duplicate: Arc<AtomicU64>,
    pub payments_expired: Arc<AtomicU64>,

    /// Lost compare-and-swaps, all paths.
    pub cas_conflicts: Arc<AtomicU64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub holds_granted: u64,
    pub holds_rejected: u64,
    pub holds_expired: u64,
    pub payments_confirmed: u64,
    pub payments_released: u64,
    pub payments_duplicate: u64,
    pub payments_expired: u64,
    pub cas_conflicts: u64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            holds_granted: self.holds_granted.load(Ordering::Relaxed),
            holds_rejected: self.holds_rejected.load(Ordering::Relaxed),
            holds_expired: self.holds_expired.load(Ordering::Relaxed),
            payments_confirmed: self.payments_confirmed.load(Ordering::Relaxed),
            payments_released: self.payments_released.load(Ordering::Relaxed),
            payments_duplicate: self.payments_duplicate.load(Ordering::Relaxed),
            payments_expired: self.payments_expired.load(Ordering::Relaxed),
            cas_conflicts: self.cas_conflicts.load(Ordering::Relaxed),
        }
    }
}
