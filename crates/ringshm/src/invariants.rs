//! Debug assertion macros for the ring protocol invariants.
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead
//! in release builds. Used by the sync policies and the segment handshake.

// =============================================================================
// Bounded occupancy: 0 <= head - tail <= capacity
// =============================================================================

/// Assert that the cursor gap never exceeds capacity.
macro_rules! debug_assert_bounded_count {
    ($pending:expr, $capacity:expr) => {
        debug_assert!(
            $pending <= $capacity,
            "occupancy {} exceeds capacity {}",
            $pending,
            $capacity
        )
    };
}

// =============================================================================
// Cursor monotonicity: head and tail only increase
// =============================================================================

/// Assert that a cursor store never moves backwards.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} cursor decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// Capacity shape: power of two, mask = capacity - 1
// =============================================================================

/// Assert the capacity/mask pair a segment was constructed with.
macro_rules! debug_assert_pow2_capacity {
    ($capacity:expr) => {
        debug_assert!(
            $capacity >= 1 && ($capacity & ($capacity - 1)) == 0,
            "capacity {} is not a power of two",
            $capacity
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_pow2_capacity;
