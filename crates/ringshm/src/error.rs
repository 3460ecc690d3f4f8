//! Error types for ring construction and push/pop operations.

use std::io;
use thiserror::Error;

/// Errors surfaced by backends, the attach handshake, and ring operations.
#[derive(Debug, Error)]
pub enum RingError {
    /// The ring is momentarily full (push) or empty (pop).
    ///
    /// This is the only retryable error: the blocking wrappers absorb it
    /// through the back-off ladder, `try_*` callers may retry at will.
    #[error("ring operation would block")]
    WouldBlock,

    /// The attached segment stores a different capacity than this handle
    /// computed locally. Fatal for the handle.
    #[error("capacity mismatch: requested {requested}, segment holds {stored}")]
    CapacityMismatch {
        /// Power-of-two capacity computed from the constructor argument.
        requested: u64,
        /// Capacity found in the segment header.
        stored: u64,
    },

    /// A named shared region already exists with a different size. Fatal.
    #[error("shared memory size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch {
        /// Page-rounded size this handle asked for.
        expected: u64,
        /// Size of the existing object reported by `fstat`.
        found: u64,
    },

    /// The requested region size does not fit the file-offset range (or
    /// overflows the segment size computation). Fatal.
    #[error("requested size overflows the file offset range")]
    SizeOverflow,

    /// An OS call failed; carries the original errno.
    #[error("{call} failed: {source}")]
    System {
        /// The libc entry point that failed.
        call: &'static str,
        /// Errno captured at the failure site.
        source: io::Error,
    },
}

impl RingError {
    /// Wraps the current `errno` for a failed libc call.
    pub(crate) fn system(call: &'static str) -> Self {
        Self::System {
            call,
            source: io::Error::last_os_error(),
        }
    }

    /// Returns `true` when the operation may legitimately be retried
    /// (the ring was full or empty at the instant of the attempt).
    #[inline]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RingError>;
