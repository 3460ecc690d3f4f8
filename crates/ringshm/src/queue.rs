//! The queue handle: construction over a backend, blocking and timed
//! wrappers over the policy's `try_*`, and the observer set.

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::backoff::Backoff;
use crate::error::{Result, RingError};
use crate::invariants::debug_assert_bounded_count;
use crate::layout;
use crate::mem::{LocalMem, Memory, ShmMem};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::segment::Segment;
use crate::sync::SyncPolicy;

/// A bounded lock-free ring over a memory backend `M` with discipline `P`.
///
/// The requested capacity is rounded up to the next power of two (minimum
/// one). Elements are flat `Copy` records transferred by bitwise copy.
///
/// Handles are cheap to construct and move-only. The discipline's role
/// limits are the caller's contract: an SPSC ring tolerates exactly one
/// pushing thread and one popping thread at a time, across all handles and
/// processes attached to the segment.
pub struct Queue<T, M, P> {
    capacity: u64,
    seg: Segment<T>,
    metrics: Metrics,
    // Backing region; keeps the mapping alive for `seg`.
    _mem: M,
    _policy: PhantomData<P>,
}

// SAFETY: every access to the shared region goes through the segment's
// atomics per the policy protocol; the handle-local fields are themselves
// Send/Sync. Role limits (single producer for SPSC, etc.) are a logical
// contract, exactly as for a second process attached to the same name.
unsafe impl<T: Copy + Send, M: Memory + Send, P> Send for Queue<T, M, P> {}
unsafe impl<T: Copy + Send, M: Memory + Sync, P> Sync for Queue<T, M, P> {}

impl<T, M, P> Queue<T, M, P>
where
    T: Copy + Send + 'static,
    M: Memory,
    P: SyncPolicy,
{
    /// Attaches over an already-mapped backend region.
    fn from_memory(mem: M, capacity: u64) -> Result<Self> {
        // SAFETY: the constructors size `mem` from segment_bytes::<T> for
        // this exact capacity, and `mem` lives in the handle alongside the
        // segment.
        let seg = unsafe { Segment::from_raw(mem.base(), capacity) };
        seg.attach()?;
        Ok(Self {
            capacity,
            seg,
            metrics: Metrics::new(),
            _mem: mem,
            _policy: PhantomData,
        })
    }

    /// Attempts one non-blocking push.
    pub fn try_push(&self, value: T) -> Result<()> {
        match P::try_push(&self.seg, value) {
            Ok(()) => {
                self.metrics.record_push();
                Ok(())
            }
            Err(err) => {
                if err.is_would_block() {
                    self.metrics.record_push_retry();
                }
                Err(err)
            }
        }
    }

    /// Attempts one non-blocking pop.
    pub fn try_pop(&self) -> Result<T> {
        match P::try_pop(&self.seg) {
            Ok(value) => {
                self.metrics.record_pop();
                Ok(value)
            }
            Err(err) => {
                if err.is_would_block() {
                    self.metrics.record_pop_retry();
                }
                Err(err)
            }
        }
    }

    /// Pushes, backing off progressively while the ring is full.
    ///
    /// Blocks indefinitely if no consumer ever frees a slot; see
    /// [`timed_push`](Self::timed_push) for a bounded wait. Any
    /// non-retryable error propagates immediately.
    pub fn push(&self, value: T) -> Result<()> {
        let mut backoff = Backoff::new();
        loop {
            match self.try_push(value) {
                Err(err) if err.is_would_block() => backoff.snooze(),
                other => return other,
            }
        }
    }

    /// Pops, backing off progressively while the ring is empty.
    pub fn pop(&self) -> Result<T> {
        let mut backoff = Backoff::new();
        loop {
            match self.try_pop() {
                Err(err) if err.is_would_block() => backoff.snooze(),
                other => return other,
            }
        }
    }

    /// Like [`push`](Self::push), giving up with the retryable error once
    /// `timeout` has elapsed.
    pub fn timed_push(&self, value: T, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::new();
        loop {
            match self.try_push(value) {
                Err(err) if err.is_would_block() => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RingError::WouldBlock);
                    }
                    backoff.snooze_within(deadline - now);
                }
                other => return other,
            }
        }
    }

    /// Like [`pop`](Self::pop), giving up with the retryable error once
    /// `timeout` has elapsed.
    pub fn timed_pop(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::new();
        loop {
            match self.try_pop() {
                Err(err) if err.is_would_block() => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RingError::WouldBlock);
                    }
                    backoff.snooze_within(deadline - now);
                }
                other => return other,
            }
        }
    }

    /// Number of elements currently readable.
    ///
    /// Observers are lock-free and may be stale the instant they return;
    /// they are advisory, never authoritative for producers or consumers.
    pub fn pending(&self) -> u64 {
        let head = self.seg.head().load(Ordering::Acquire);
        let tail = self.seg.tail().load(Ordering::Acquire);
        // The loads are not a snapshot: tail may pass the loaded head
        // between them, so clamp instead of wrapping.
        let pending = head.saturating_sub(tail);
        debug_assert_bounded_count!(pending, self.capacity);
        pending
    }

    /// Number of slots currently writable.
    pub fn available(&self) -> u64 {
        self.capacity - self.pending()
    }

    /// True when no slot is writable.
    pub fn full(&self) -> bool {
        self.pending() == self.capacity
    }

    /// True when no element is readable.
    pub fn empty(&self) -> bool {
        self.pending() == 0
    }

    /// Power-of-two slot count.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Byte stride of one slot in the segment (sequence word + element +
    /// trailing pad). Identical in every process attached to the segment.
    pub fn slot_bytes(&self) -> u64 {
        layout::slot_stride::<T>()
    }

    /// This handle's operation counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<T, P> Queue<T, LocalMem, P>
where
    T: Copy + Send + 'static,
    P: SyncPolicy,
{
    /// Creates an in-process ring with at least `capacity` slots (rounded
    /// up to a power of two, minimum one).
    pub fn new(capacity: u64) -> Result<Self> {
        Self::with_numa(capacity, None)
    }

    /// Like [`new`](Self::new), strict-binding the backing pages to a NUMA
    /// node. The binding is best-effort.
    pub fn with_numa(capacity: u64, numa: Option<u32>) -> Result<Self> {
        let capacity = layout::round_pow2(capacity);
        let bytes = layout::segment_bytes::<T>(capacity).ok_or(RingError::SizeOverflow)?;
        let mem = LocalMem::new(bytes, numa)?;
        Self::from_memory(mem, capacity)
    }
}

impl<T, P> Queue<T, ShmMem, P>
where
    T: Copy + Send + 'static,
    P: SyncPolicy,
{
    /// Creates or attaches the named cross-process ring.
    ///
    /// The first process for `name` creates and initializes the segment;
    /// later processes presenting the same element type and capacity
    /// attach to it. A different capacity fails with a capacity or size
    /// mismatch depending on whether the page-rounded region sizes agree.
    ///
    /// If a previous initializer died mid-handshake, attachers wait on the
    /// stale segment indefinitely; [`unlink`](Self::unlink) and re-create
    /// to recover.
    pub fn open(capacity: u64, name: &str) -> Result<Self> {
        Self::open_with_numa(capacity, name, None)
    }

    /// Like [`open`](Self::open), strict-binding the mapping to a NUMA
    /// node. The binding is best-effort and per-process.
    pub fn open_with_numa(capacity: u64, name: &str, numa: Option<u32>) -> Result<Self> {
        let capacity = layout::round_pow2(capacity);
        let bytes = layout::segment_bytes::<T>(capacity).ok_or(RingError::SizeOverflow)?;
        let mem = ShmMem::new(bytes, name, numa)?;
        Self::from_memory(mem, capacity)
    }

    /// Removes `name` from the shared-memory namespace; idempotent.
    ///
    /// Live handles keep working; new attachers will create a fresh
    /// segment under the same name.
    pub fn unlink(name: &str) -> Result<()> {
        ShmMem::unlink(name)
    }
}
