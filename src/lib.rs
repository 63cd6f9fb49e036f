/// the queue capability shared by both implementations
pub mod queue;
pub use queue::YMQueue;
pub use queue::YMQueueKind;

/// Two-lock blocking queue
pub mod two_lock_queue;
pub use two_lock_queue::YMTwoLockQueue;

/// Michael & Scott lock-free queue
pub mod lock_free_queue;
pub use lock_free_queue::YMLockFreeQueue;

/// epoch-based reclamation for the lock-free queue
mod reclaim;

/// idle backoff for consumers
pub mod backoff;
pub use backoff::{YMBackoff, YMBackoffStep};

/// the producer/consumer benchmark harness
pub mod bench;
pub use bench::{
    YMBenchConfig, YMBenchCounter, YMBenchReport, YMBurstShape, YMPhaseResult, drain,
    run_benchmark, run_benchmark_on, run_phase,
};

/// the errors
pub mod error;
pub use error::YMQueueError;

/// optional `tracing` output
pub mod trace;

/// utils for internal usage
mod utils;
