//! Handle-local operation counters.
//!
//! Counters are advisory, relaxed, and never live in the shared segment,
//! so cross-process peers cannot observe each other's totals and the
//! persisted layout stays exactly header + slots.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Relaxed counters kept next to a queue handle.
#[derive(Debug, Default)]
pub struct Metrics {
    // Padded so the counters never share a line with the handle's hot
    // segment pointer on the push/pop path.
    inner: CachePadded<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    pushes: AtomicU64,
    pops: AtomicU64,
    push_retries: AtomicU64,
    pop_retries: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_push(&self) {
        self.inner.pushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_pop(&self) {
        self.inner.pops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_push_retry(&self) {
        self.inner.push_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_pop_retry(&self) {
        self.inner.pop_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Current totals for this handle.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushes: self.inner.pushes.load(Ordering::Relaxed),
            pops: self.inner.pops.load(Ordering::Relaxed),
            push_retries: self.inner.push_retries.load(Ordering::Relaxed),
            pop_retries: self.inner.pop_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a handle's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Successful pushes through this handle.
    pub pushes: u64,
    /// Successful pops through this handle.
    pub pops: u64,
    /// Push attempts that found the ring full.
    pub push_retries: u64,
    /// Pop attempts that found the ring empty.
    pub pop_retries: u64,
}
