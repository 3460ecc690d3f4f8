//! Typed view over a mapped region: header accessors, slot accessors, and
//! the exactly-once initialization handshake.
//!
//! `Segment` is the single unsafe construction boundary of the crate.
//! Everything above it (sync policies, queue handles) works through the
//! accessors here, each of which carries its ordering in the call site.
//!
//! All addressing uses the canonical offsets from [`crate::layout`], so two
//! processes mapping the same bytes agree on the position of every word.
//! Element bytes are copied with unaligned raw-pointer reads and writes:
//! the slot stride is derived from the element's size, not its alignment,
//! and the copy must not assume more.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crate::error::{Result, RingError};
use crate::invariants::debug_assert_pow2_capacity;
use crate::layout::{
    self, CAPACITY_OFFSET, HEAD_OFFSET, HEADER_BYTES, MAGIC_OFFSET, MASK_OFFSET,
    SEGMENT_INIT_IN_PROGRESS, SEGMENT_READY, SLOT_SEQ_BYTES, TAIL_OFFSET,
};

/// View of one ring segment: the control header followed by the slot array.
///
/// Holds no ownership; the queue keeps the backing memory alive for at
/// least as long as the segment is used.
pub struct Segment<T> {
    base: NonNull<u8>,
    capacity: u64,
    mask: u64,
    _marker: PhantomData<*mut T>,
}

impl<T: Copy> Segment<T> {
    /// Builds a view over `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to a readable+writable region of at least
    /// [`layout::segment_bytes::<T>`]`(capacity)` bytes that outlives every
    /// use of the segment, and `capacity` must be a power of two >= 1.
    pub(crate) unsafe fn from_raw(base: NonNull<u8>, capacity: u64) -> Self {
        debug_assert_pow2_capacity!(capacity);
        Self {
            base,
            capacity,
            mask: capacity - 1,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Atomic header word at one of the fixed offsets.
    #[inline]
    fn header_atomic(&self, offset: u64) -> &AtomicU64 {
        // SAFETY: offset is one of the fixed header offsets — in bounds by
        // the construction contract, 64-aligned, and the word is only ever
        // accessed atomically once the segment is shared.
        unsafe { &*self.base.as_ptr().add(offset as usize).cast::<AtomicU64>() }
    }

    /// Initialization word (zero / in-progress sentinel / ready magic).
    #[inline]
    pub fn magic(&self) -> &AtomicU64 {
        self.header_atomic(MAGIC_OFFSET)
    }

    /// Producer cursor.
    #[inline]
    pub fn head(&self) -> &AtomicU64 {
        self.header_atomic(HEAD_OFFSET)
    }

    /// Consumer cursor.
    #[inline]
    pub fn tail(&self) -> &AtomicU64 {
        self.header_atomic(TAIL_OFFSET)
    }

    /// Capacity stored in the header by the segment's initializer.
    ///
    /// A plain word: written once before the ready magic is release-stored
    /// and only read after an acquire load observed it, so the read needs
    /// no synchronization of its own.
    #[inline]
    pub fn stored_capacity(&self) -> u64 {
        // SAFETY: in bounds per the construction contract; no concurrent
        // writer can exist once the handshake completed.
        unsafe {
            self.base
                .as_ptr()
                .add(CAPACITY_OFFSET as usize)
                .cast::<u64>()
                .read()
        }
    }

    #[inline]
    fn slot_base(&self, idx: u64) -> *mut u8 {
        debug_assert!(idx < self.capacity);
        // SAFETY: idx < capacity, so the whole slot lies inside the region
        // per the construction contract.
        unsafe {
            self.base
                .as_ptr()
                .add((HEADER_BYTES + idx * layout::slot_stride::<T>()) as usize)
        }
    }

    /// Sequence word of slot `idx` (`idx` already index-reduced).
    #[inline]
    pub fn seq(&self, idx: u64) -> &AtomicU64 {
        // SAFETY: the sequence word opens each slot; slot starts are
        // cache-line aligned, so the word is aligned for atomic access.
        unsafe { &*self.slot_base(idx).cast::<AtomicU64>() }
    }

    /// Copies the element out of slot `idx`.
    ///
    /// # Safety
    ///
    /// The caller must own the slot for reading per the discipline
    /// protocol (the sequence word, or the SPSC cursors, published it).
    #[inline]
    pub unsafe fn read_slot(&self, idx: u64) -> T {
        self.slot_base(idx)
            .add(SLOT_SEQ_BYTES as usize)
            .cast::<T>()
            .read_unaligned()
    }

    /// Copies `value` into slot `idx`.
    ///
    /// # Safety
    ///
    /// The caller must own the slot for writing per the discipline
    /// protocol (cursor reservation not yet published).
    #[inline]
    pub unsafe fn write_slot(&self, idx: u64, value: T) {
        self.slot_base(idx)
            .add(SLOT_SEQ_BYTES as usize)
            .cast::<T>()
            .write_unaligned(value);
    }

    /// Runs the exactly-once bring-up of the control header.
    ///
    /// The first attacher swaps the magic word from zero to the in-progress
    /// sentinel, writes the cursors, capacity, mask and the initial slot
    /// sequence fill, then release-stores the ready magic. Everyone else
    /// spins (yielding) until they observe the ready magic with acquire,
    /// which also makes the whole header visible to them.
    ///
    /// Afterwards each attacher cross-checks the stored capacity against
    /// its own; a disagreement is fatal for the handle.
    ///
    /// If an initializer dies between the sentinel swap and the ready
    /// store, later attachers wait here forever; for named segments the
    /// recovery path is unlinking the stale object.
    pub(crate) fn attach(&self) -> Result<()> {
        match self.magic().compare_exchange(
            0,
            SEGMENT_INIT_IN_PROGRESS,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.head().store(0, Ordering::Relaxed);
                self.tail().store(0, Ordering::Relaxed);
                // SAFETY: winning the swap grants exclusive access to the
                // plain header words until the ready magic is published.
                unsafe {
                    self.base
                        .as_ptr()
                        .add(CAPACITY_OFFSET as usize)
                        .cast::<u64>()
                        .write(self.capacity);
                    self.base
                        .as_ptr()
                        .add(MASK_OFFSET as usize)
                        .cast::<u64>()
                        .write(self.mask);
                }
                for i in 0..self.capacity {
                    self.seq(i).store(i, Ordering::Relaxed);
                }
                self.magic().store(SEGMENT_READY, Ordering::Release);
            }
            Err(_) => {
                while self.magic().load(Ordering::Acquire) != SEGMENT_READY {
                    thread::yield_now();
                }
            }
        }

        let stored = self.stored_capacity();
        if stored != self.capacity {
            return Err(RingError::CapacityMismatch {
                requested: self.capacity,
                stored,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{LocalMem, Memory};

    fn fresh_segment(capacity: u64) -> (LocalMem, Segment<u64>) {
        let bytes = layout::segment_bytes::<u64>(capacity).unwrap();
        let mem = LocalMem::new(bytes, None).unwrap();
        // SAFETY: mem maps at least `bytes` writable bytes and outlives seg.
        let seg = unsafe { Segment::from_raw(mem.base(), capacity) };
        (mem, seg)
    }

    #[test]
    fn test_first_attacher_initializes() {
        let (_mem, seg) = fresh_segment(8);
        assert_eq!(seg.magic().load(Ordering::Relaxed), 0);

        seg.attach().unwrap();

        assert_eq!(seg.magic().load(Ordering::Relaxed), SEGMENT_READY);
        assert_eq!(seg.head().load(Ordering::Relaxed), 0);
        assert_eq!(seg.tail().load(Ordering::Relaxed), 0);
        assert_eq!(seg.stored_capacity(), 8);
        for i in 0..8 {
            assert_eq!(seg.seq(i).load(Ordering::Relaxed), i);
        }
    }

    #[test]
    fn test_second_attacher_sees_ready_header() {
        let (mem, seg) = fresh_segment(16);
        seg.attach().unwrap();

        // SAFETY: same mapping, same capacity, same lifetime as above.
        let other = unsafe { Segment::<u64>::from_raw(mem.base(), 16) };
        other.attach().unwrap();
        assert_eq!(other.stored_capacity(), 16);
    }

    #[test]
    fn test_capacity_mismatch_detected() {
        let (mem, seg) = fresh_segment(16);
        seg.attach().unwrap();

        // SAFETY: the mapping for capacity 16 covers a capacity-8 view too.
        let other = unsafe { Segment::<u64>::from_raw(mem.base(), 8) };
        match other.attach() {
            Err(RingError::CapacityMismatch { requested, stored }) => {
                assert_eq!(requested, 8);
                assert_eq!(stored, 16);
            }
            other => panic!("expected CapacityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_slot_roundtrip() {
        let (_mem, seg) = fresh_segment(4);
        seg.attach().unwrap();

        // SAFETY: single-threaded test owns every slot.
        unsafe {
            seg.write_slot(2, 0xDEAD_BEEF_u64);
            assert_eq!(seg.read_slot(2), 0xDEAD_BEEF_u64);
        }
        // Neighbors untouched.
        // SAFETY: as above.
        unsafe {
            assert_eq!(seg.read_slot(1), 0);
            assert_eq!(seg.read_slot(3), 0);
        }
    }
}
