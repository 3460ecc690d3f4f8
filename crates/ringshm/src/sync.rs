//! Synchronization policies: who may move which cursor, with what
//! orderings.
//!
//! =============================================================================
//! CURSOR & SEQUENCE PROTOCOL
//! =============================================================================
//!
//! All three policies share the segment format: unbounded u64 `head`/`tail`
//! cursors (index = cursor & mask, ABA-free — at ten billion messages per
//! second a u64 takes ~58 years to wrap) and one sequence word per slot.
//!
//! **SPSC** uses the cursors alone:
//! - producer: load own `head` Relaxed, load `tail` Acquire (synchronizes
//!   with the consumer's Release), write the element, store `head` Release.
//! - consumer: mirror image with the roles swapped.
//!
//! **MPSC/MPMC** arbitrate through the per-slot sequence word, which cycles
//! through `idx + k*capacity` (writable, round k) and `idx + k*capacity + 1`
//! (readable, round k):
//! - a producer claims a slot by CAS on `head` after seeing `seq == head`;
//!   the element write happens before the Release store of `seq = head + 1`
//!   that publishes it.
//! - `seq < head` means the consumer has not yet freed the slot for this
//!   round: the ring is full. Under heavy contention near a wrap boundary
//!   this can transiently misreport full; the retryable error absorbs it.
//! - a consumer frees a slot for the next round with a Release store of
//!   `seq = tail + capacity`. The single MPSC consumer stores first and
//!   copies after (its unmoved tail still gates producer reuse); an MPMC
//!   consumer copies speculatively and frees only after winning the tail
//!   CAS.
//!
//! =============================================================================

use std::sync::atomic::Ordering;

use crate::error::{Result, RingError};
use crate::invariants::{debug_assert_bounded_count, debug_assert_monotonic};
use crate::segment::Segment;

/// Arbitration protocol for one ring discipline.
///
/// Implementors are zero-sized markers; these two methods are the entire
/// behavioral difference between the disciplines. Callers are responsible
/// for honoring the discipline's role limits (a single producer thread for
/// SPSC, and so on) across every handle attached to the segment.
pub trait SyncPolicy {
    /// Attempts one non-blocking push.
    fn try_push<T: Copy>(seg: &Segment<T>, value: T) -> Result<()>;

    /// Attempts one non-blocking pop.
    fn try_pop<T: Copy>(seg: &Segment<T>) -> Result<T>;
}

/// Single producer, single consumer.
///
/// Wait-free on both sides; the slot sequence words are left untouched.
#[derive(Debug, Clone, Copy)]
pub struct Spsc;

impl SyncPolicy for Spsc {
    fn try_push<T: Copy>(seg: &Segment<T>, value: T) -> Result<()> {
        let head = seg.head().load(Ordering::Relaxed);
        let tail = seg.tail().load(Ordering::Acquire);

        debug_assert_bounded_count!(head - tail, seg.capacity());
        if head - tail == seg.capacity() {
            return Err(RingError::WouldBlock);
        }

        // SAFETY: the ring is not full, so the sole producer owns slot
        // `head & mask` until the Release store below publishes it.
        unsafe { seg.write_slot(head & seg.mask(), value) };
        debug_assert_monotonic!("head", head, head + 1);
        seg.head().store(head + 1, Ordering::Release);
        Ok(())
    }

    fn try_pop<T: Copy>(seg: &Segment<T>) -> Result<T> {
        let tail = seg.tail().load(Ordering::Relaxed);
        let head = seg.head().load(Ordering::Acquire);

        if head == tail {
            return Err(RingError::WouldBlock);
        }

        // SAFETY: head > tail, so slot `tail & mask` was published by the
        // producer's Release store, which the Acquire load above saw; the
        // sole consumer owns it until the store below frees it.
        let value = unsafe { seg.read_slot(tail & seg.mask()) };
        debug_assert_monotonic!("tail", tail, tail + 1);
        seg.tail().store(tail + 1, Ordering::Release);
        Ok(value)
    }
}

/// Multiple producers contending on `head` via CAS; a single consumer
/// owning `tail`.
#[derive(Debug, Clone, Copy)]
pub struct Mpsc;

impl SyncPolicy for Mpsc {
    fn try_push<T: Copy>(seg: &Segment<T>, value: T) -> Result<()> {
        let mut head = seg.head().load(Ordering::Relaxed);

        loop {
            let idx = head & seg.mask();
            let seq = seg.seq(idx).load(Ordering::Acquire);

            if seq == head {
                // Slot is writable this round; race other producers for it.
                match seg.head().compare_exchange_weak(
                    head,
                    head + 1,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS reserved slot `idx` exclusively
                        // for this producer; the Release store of the
                        // sequence word publishes the element write.
                        unsafe { seg.write_slot(idx, value) };
                        seg.seq(idx).store(head + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => head = current,
                }
            } else if seq < head {
                // Consumer has not freed this slot for our round: full.
                return Err(RingError::WouldBlock);
            } else {
                // Another producer advanced past us; chase the cursor.
                head = seg.head().load(Ordering::Relaxed);
            }
        }
    }

    fn try_pop<T: Copy>(seg: &Segment<T>) -> Result<T> {
        let tail = seg.tail().load(Ordering::Relaxed);
        let idx = tail & seg.mask();
        let seq = seg.seq(idx).load(Ordering::Acquire);

        if seq != tail + 1 {
            return Err(RingError::WouldBlock);
        }

        // Hand the slot to the producers' next round, then copy.
        seg.seq(idx).store(tail + seg.capacity(), Ordering::Release);
        // SAFETY: seq == tail + 1 published this slot to the single
        // consumer; a producer cannot reuse it before head reaches
        // tail + capacity, which the unchanged tail cursor still gates.
        let value = unsafe { seg.read_slot(idx) };
        debug_assert_monotonic!("tail", tail, tail + 1);
        seg.tail().store(tail + 1, Ordering::Release);
        Ok(value)
    }
}

/// Multiple producers and multiple consumers, CAS on both cursors.
///
/// The producer side is identical to [`Mpsc`].
#[derive(Debug, Clone, Copy)]
pub struct Mpmc;

impl SyncPolicy for Mpmc {
    fn try_push<T: Copy>(seg: &Segment<T>, value: T) -> Result<()> {
        Mpsc::try_push(seg, value)
    }

    fn try_pop<T: Copy>(seg: &Segment<T>) -> Result<T> {
        let mut tail = seg.tail().load(Ordering::Relaxed);

        loop {
            let idx = tail & seg.mask();
            let seq = seg.seq(idx).load(Ordering::Acquire);

            if seq == tail + 1 {
                // Copy before committing: a losing consumer discards the
                // copy, a winning one must not touch the slot after the
                // sequence store frees it for producers. Committing first
                // and copying after would race the slot's next producer.
                // SAFETY: seq == tail + 1 published this slot; the copy is
                // speculative and only kept if the CAS below wins.
                let value = unsafe { seg.read_slot(idx) };

                match seg.tail().compare_exchange_weak(
                    tail,
                    tail + 1,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        seg.seq(idx).store(tail + seg.capacity(), Ordering::Release);
                        return Ok(value);
                    }
                    Err(current) => tail = current,
                }
            } else if seq < tail + 1 {
                // Nothing published at this cursor yet: empty.
                return Err(RingError::WouldBlock);
            } else {
                // Another consumer advanced past us; chase the cursor.
                tail = seg.tail().load(Ordering::Relaxed);
            }
        }
    }
}
