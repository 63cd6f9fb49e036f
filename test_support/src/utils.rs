// Common utilities for tests

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Bits reserved for the per-producer sequence number in a tagged payload.
const SEQ_BITS: u32 = 40;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;

/// Pack a producer id and its sequence number into one payload.
pub fn tag(producer: u16, seq: u64) -> u64 {
    assert!(seq <= SEQ_MASK, "sequence number too large");
    ((producer as u64) << SEQ_BITS) | seq
}

/// Inverse of [`tag`].
pub fn untag(value: u64) -> (u16, u64) {
    ((value >> SEQ_BITS) as u16, value & SEQ_MASK)
}

/// Assert that, restricted to each producer, sequence numbers appear in strictly
/// increasing order. `observed` is what a single consumer saw, in the order it saw it.
pub fn assert_fifo_per_producer(observed: &[u64]) {
    let mut last: HashMap<u16, u64> = HashMap::new();
    for &value in observed {
        let (producer, seq) = untag(value);
        if let Some(&prev) = last.get(&producer) {
            assert!(
                seq > prev,
                "producer {producer} out of order: {seq} seen after {prev}"
            );
        }
        last.insert(producer, seq);
    }
}

/// Assert that `observed` holds every value in `expected` exactly once and nothing else.
pub fn assert_exact_multiset(mut observed: Vec<u64>, expected: impl IntoIterator<Item = u64>) {
    let mut expected: Vec<u64> = expected.into_iter().collect();
    observed.sort_unstable();
    expected.sort_unstable();

    if let Some(dup) = observed.windows(2).find(|w| w[0] == w[1]) {
        panic!("duplicate value dequeued: {}", dup[0]);
    }
    assert_eq!(
        observed.len(),
        expected.len(),
        "dequeued {} values, expected {}",
        observed.len(),
        expected.len()
    );
    assert_eq!(observed, expected, "dequeued values differ from enqueued values");
}

/// A wall-clock guard so a broken queue fails a test instead of hanging it.
pub struct Deadline {
    limit: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Deadline {
            limit: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn check(&self) {
        if Instant::now() > self.limit {
            panic!("test timed out after {:?}", self.timeout);
        }
    }
}
