//! Shared-backend behavior: create-or-attach semantics, mismatch
//! detection, unlink lifecycle, and a forked cross-process exchange.
//!
//! Every test uses a name unique to this process and test so parallel
//! test threads (and stale objects from aborted runs) cannot collide.

use ringshm_rs::{RingError, ShmMpmc, ShmSpsc};
use std::time::Duration;

fn unique_name(tag: &str) -> String {
    format!("/ringshm_{}_{}", tag, std::process::id())
}

#[test]
fn test_create_then_attach_and_exchange() {
    let name = unique_name("pair");
    let _ = ShmSpsc::<u64>::unlink(&name);

    let producer = ShmSpsc::<u64>::open(8, &name).unwrap();
    let consumer = ShmSpsc::<u64>::open(8, &name).unwrap();

    assert_eq!(producer.capacity(), 8);
    assert_eq!(consumer.capacity(), 8);
    assert_eq!(producer.slot_bytes(), consumer.slot_bytes());

    // The two handles are views over the same slots.
    producer.try_push(0xFEED).unwrap();
    assert_eq!(consumer.pending(), 1);
    assert_eq!(consumer.try_pop().unwrap(), 0xFEED);
    assert!(producer.empty());

    ShmSpsc::<u64>::unlink(&name).unwrap();
}

#[test]
fn test_attach_with_different_capacity_in_same_page_fails() {
    // Both capacities fit one page after rounding, so the backend attaches
    // cleanly and the header capacity check is the one that trips.
    let name = unique_name("capmismatch");
    let _ = ShmSpsc::<u64>::unlink(&name);

    let _first = ShmSpsc::<u64>::open(16, &name).unwrap();

    let err = ShmSpsc::<u64>::open(8, &name).err().expect("must fail");
    match err {
        RingError::CapacityMismatch { requested, stored } => {
            assert_eq!(requested, 8);
            assert_eq!(stored, 16);
        }
        other => panic!("expected CapacityMismatch, got {other}"),
    }

    ShmSpsc::<u64>::unlink(&name).unwrap();
}

#[test]
fn test_attach_with_different_region_size_fails() {
    let name = unique_name("sizemismatch");
    let _ = ShmSpsc::<u64>::unlink(&name);

    let _first = ShmSpsc::<u64>::open(16, &name).unwrap();

    // 4096 slots need far more pages than 16; the backend rejects before
    // the header is ever examined.
    let err = ShmSpsc::<u64>::open(4096, &name).err().expect("must fail");
    match err {
        RingError::SizeMismatch { expected, found } => {
            assert!(expected > found);
        }
        other => panic!("expected SizeMismatch, got {other}"),
    }

    ShmSpsc::<u64>::unlink(&name).unwrap();
}

#[test]
fn test_unlink_unknown_name_is_success() {
    ShmSpsc::<u64>::unlink("/ringshm_never_created_anywhere").unwrap();
}

#[test]
fn test_unlink_allows_recreation_with_new_parameters() {
    let name = unique_name("recreate");
    let _ = ShmSpsc::<u64>::unlink(&name);

    let first = ShmSpsc::<u64>::open(16, &name).unwrap();
    first.try_push(1).unwrap();

    // Unlink detaches the name, not the live mapping.
    ShmSpsc::<u64>::unlink(&name).unwrap();
    assert_eq!(first.pending(), 1);

    // A new attacher now creates a fresh segment with new parameters.
    let second = ShmMpmc::<u64>::open(128, &name).unwrap();
    assert_eq!(second.capacity(), 128);
    assert!(second.empty());

    ShmMpmc::<u64>::unlink(&name).unwrap();
}

#[test]
fn test_cross_process_spsc_exchange() {
    const N: u64 = 500;

    let name = unique_name("fork");
    let _ = ShmSpsc::<u64>::unlink(&name);

    // Parent is the first attacher and initializes the segment before the
    // fork, so the child exercises the attach-to-ready path.
    let consumer = ShmSpsc::<u64>::open(64, &name).unwrap();

    // SAFETY: the child touches only the freshly attached ring and exits
    // through _exit, skipping destructors and the test harness.
    let pid = unsafe { libc::fork() };
    assert!(pid >= 0, "fork failed");

    if pid == 0 {
        // Child: attach by name and stream N elements.
        let status = match ShmSpsc::<u64>::open(64, &name) {
            Ok(producer) => {
                let mut rc = 0;
                for i in 0..N {
                    if producer.push(i).is_err() {
                        rc = 2;
                        break;
                    }
                }
                rc
            }
            Err(_) => 1,
        };
        // SAFETY: terminating the child without unwinding into the harness.
        unsafe { libc::_exit(status) };
    }

    // Parent: consume everything in order, with a per-pop deadline so a
    // wedged child cannot hang the suite.
    for i in 0..N {
        let v = consumer
            .timed_pop(Duration::from_secs(2))
            .unwrap_or_else(|e| panic!("pop {i} failed: {e}"));
        assert_eq!(v, i, "cross-process FIFO violation");
    }

    let mut status = 0;
    // SAFETY: pid is our direct child.
    let waited = unsafe { libc::waitpid(pid, &mut status, 0) };
    assert_eq!(waited, pid);
    assert!(libc::WIFEXITED(status), "child did not exit cleanly");
    assert_eq!(libc::WEXITSTATUS(status), 0, "child reported failure");

    assert!(consumer.empty());
    ShmSpsc::<u64>::unlink(&name).unwrap();
}
