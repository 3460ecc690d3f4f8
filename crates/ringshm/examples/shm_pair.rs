//! Cross-process exchange over a named shared-memory ring.
//!
//! Run the consumer first, then the producer (any order works — the first
//! attacher initializes the segment):
//!
//! ```text
//! cargo run --example shm_pair -- consume
//! cargo run --example shm_pair -- produce
//! ```
//!
//! The consumer unlinks the segment when it is done.

use ringshm_rs::{Result, ShmSpsc};
use std::time::Duration;

const NAME: &str = "/ringshm_pair_demo";
const CAPACITY: u64 = 1024;
const COUNT: u64 = 1_000_000;

fn main() -> Result<()> {
    let role = std::env::args().nth(1).unwrap_or_default();
    match role.as_str() {
        "produce" => produce(),
        "consume" => consume(),
        _ => {
            eprintln!("usage: shm_pair <produce|consume>");
            Ok(())
        }
    }
}

fn produce() -> Result<()> {
    let ring = ShmSpsc::<u64>::open(CAPACITY, NAME)?;
    for i in 0..COUNT {
        ring.push(i)?;
    }
    println!("produced {COUNT} elements");
    Ok(())
}

fn consume() -> Result<()> {
    let ring = ShmSpsc::<u64>::open(CAPACITY, NAME)?;
    let mut next = 0u64;
    while next < COUNT {
        match ring.timed_pop(Duration::from_secs(10)) {
            Ok(v) => {
                assert_eq!(v, next, "out-of-order delivery");
                next += 1;
            }
            Err(err) if err.is_would_block() => {
                eprintln!("gave up waiting at element {next}");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    println!("consumed {next} elements in order");
    ShmSpsc::<u64>::unlink(NAME)?;
    Ok(())
}
