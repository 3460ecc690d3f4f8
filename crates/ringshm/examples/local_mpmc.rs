//! Four producers and four consumers over one in-process MPMC ring.
//!
//! Run with: `cargo run --example local_mpmc`

use ringshm_rs::{LocalMpmc, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PRODUCERS: u64 = 4;
const CONSUMERS: u64 = 4;
const ITEMS_PER_PRODUCER: u64 = 100_000;

fn main() -> Result<()> {
    let ring = Arc::new(LocalMpmc::<u64>::new(16)?);

    let mut handles = Vec::new();
    for p in 0..PRODUCERS {
        let ring = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                ring.push(p * ITEMS_PER_PRODUCER + i).unwrap();
            }
        }));
    }

    let mut consumers = Vec::new();
    for _ in 0..CONSUMERS {
        let ring = Arc::clone(&ring);
        consumers.push(thread::spawn(move || {
            let mut count = 0u64;
            while ring.timed_pop(Duration::from_millis(100)).is_ok() {
                count += 1;
            }
            count
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    let consumed: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();

    println!(
        "consumed {consumed} / {} elements, ring empty: {}",
        PRODUCERS * ITEMS_PER_PRODUCER,
        ring.empty()
    );
    println!("handle metrics: {:?}", ring.metrics());
    Ok(())
}
