//! RingSHM - Lock-Free Bounded Rings over Anonymous or POSIX Shared Memory
//!
//! A ring is the product of three choices: an element type (any flat
//! `Copy` record), a memory backend, and a synchronization discipline.
//! The same segment format works in-process and across processes: a
//! control header of five cache-line-aligned words followed by a slot
//! array whose stride depends only on the element's size, so every
//! attacher computes identical offsets.
//!
//! # Key Features
//!
//! - SPSC / MPSC / MPMC disciplines as zero-sized policy types
//! - Anonymous (`LocalMem`) and named POSIX (`ShmMem`) backends with
//!   huge-page attempt, best-effort NUMA binding, and page pinning
//! - Exactly-once segment bring-up via a magic-word handshake
//! - Non-blocking `try_push`/`try_pop`, blocking `push`/`pop` on an
//!   adaptive back-off ladder (spin → yield → microsleep), and deadline
//!   variants
//!
//! # Example
//!
//! ```
//! use ringshm_rs::LocalSpsc;
//!
//! let ring = LocalSpsc::<u64>::new(8)?;
//! ring.try_push(42)?;
//! assert_eq!(ring.try_pop()?, 42);
//! assert!(ring.empty());
//! # Ok::<(), ringshm_rs::RingError>(())
//! ```
//!
//! Cross-process, both sides name the same segment:
//!
//! ```no_run
//! use ringshm_rs::ShmMpsc;
//!
//! let ring = ShmMpsc::<[u8; 64]>::open(4096, "/my_ring")?;
//! ring.push([0u8; 64])?;
//! // ... later, once every peer is done:
//! ShmMpsc::<[u8; 64]>::unlink("/my_ring")?;
//! # Ok::<(), ringshm_rs::RingError>(())
//! ```

mod backoff;
mod error;
mod invariants;
pub mod layout;
mod mem;
mod metrics;
mod queue;
mod segment;
mod sync;

pub use backoff::Backoff;
pub use error::{Result, RingError};
pub use mem::{LocalMem, Memory, ShmMem};
pub use metrics::MetricsSnapshot;
pub use queue::Queue;
pub use segment::Segment;
pub use sync::{Mpmc, Mpsc, Spsc, SyncPolicy};

/// In-process ring, single producer and single consumer.
pub type LocalSpsc<T> = Queue<T, LocalMem, Spsc>;
/// In-process ring, multiple producers and a single consumer.
pub type LocalMpsc<T> = Queue<T, LocalMem, Mpsc>;
/// In-process ring, multiple producers and multiple consumers.
pub type LocalMpmc<T> = Queue<T, LocalMem, Mpmc>;
/// Named cross-process ring, single producer and single consumer.
pub type ShmSpsc<T> = Queue<T, ShmMem, Spsc>;
/// Named cross-process ring, multiple producers and a single consumer.
pub type ShmMpsc<T> = Queue<T, ShmMem, Mpsc>;
/// Named cross-process ring, multiple producers and multiple consumers.
pub type ShmMpmc<T> = Queue<T, ShmMem, Mpmc>;
