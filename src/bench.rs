//! Multi-producer/multi-consumer benchmark harness.
//!
//! A run seeds the queue with one element per consumer, runs an untimed warmup whose
//! numbers are kept apart from the measurement, then runs the measured phase. Every
//! worker owns its [`YMBenchCounter`]; counters come back through the join handles and
//! are only summed after every worker has stopped, so the harness never shares a
//! contended counter with the code it is measuring.

use std::fmt;
use std::hint::black_box;
use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use core_affinity::CoreId;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

#[cfg(feature = "tracing")]
use crate::trace::trace;
use crate::trace::{debug, info, warn};
use crate::utils::{busy_work, human_rate};
use crate::{YMBackoff, YMQueue, YMQueueError, YMQueueKind};

/// Longest single sleep a paused producer takes before rechecking the stop signal.
const PAUSE_SLICE: Duration = Duration::from_millis(1);

/// Producer shaping: after every `burst` enqueues, sleep for `pause`.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct YMBurstShape {
    pub burst: u32,
    pub pause: Duration,
}

/// Everything needed to run one benchmark.
#[derive(Clone, Debug)]
pub struct YMBenchConfig {
    pub kind: YMQueueKind,
    pub producers: u16,
    pub consumers: u16,
    /// Length of the measured phase.
    pub duration: Duration,
    /// Length of the discarded warmup phase. Zero skips it.
    pub warmup: Duration,
    /// Synthetic work burned after every successful enqueue or dequeue.
    pub work_per_op: Duration,
    pub burst: Option<YMBurstShape>,
    /// Pin each worker to a core, round-robin over the cores the OS reports.
    pub pin_threads: bool,
    /// Base seed for the producers' payload generators.
    pub seed: u64,
}

impl Default for YMBenchConfig {
    fn default() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        YMBenchConfig {
            kind: YMQueueKind::TwoLock,
            producers: 4,
            consumers: 4,
            duration: Duration::from_secs(5),
            warmup: Duration::from_millis(500),
            work_per_op: Duration::ZERO,
            burst: None,
            pin_threads: false,
            seed,
        }
    }
}

impl YMBenchConfig {
    /// Reject configurations that cannot produce a meaningful run.
    ///
    /// # Errors
    /// Returns `YMQueueError::InvalidArgs` naming the offending setting.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::{YMBenchConfig, YMQueueError};
    ///
    /// let config = YMBenchConfig { consumers: 0, ..YMBenchConfig::default() };
    /// assert!(matches!(config.validate(), Err(YMQueueError::InvalidArgs(_))));
    /// ```
    pub fn validate(&self) -> Result<(), YMQueueError> {
        if self.producers == 0 {
            return Err(YMQueueError::InvalidArgs(
                "at least one producer thread is required",
            ));
        }
        if self.consumers == 0 {
            return Err(YMQueueError::InvalidArgs(
                "at least one consumer thread is required",
            ));
        }
        if self.duration.is_zero() {
            return Err(YMQueueError::InvalidArgs(
                "measurement duration must be greater than zero",
            ));
        }
        if matches!(self.burst, Some(shape) if shape.burst == 0) {
            return Err(YMQueueError::InvalidArgs(
                "burst size must be greater than zero",
            ));
        }
        Ok(())
    }

    fn worker_count(&self) -> usize {
        self.producers as usize + self.consumers as usize
    }
}

/// Per-worker operation counts.
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug)]
pub struct YMBenchCounter {
    pub enqueued_ok: u64,
    pub dequeued_ok: u64,
    pub dequeue_empty_misses: u64,
}

impl YMBenchCounter {
    pub fn merge(&mut self, other: &YMBenchCounter) {
        self.enqueued_ok += other.enqueued_ok;
        self.dequeued_ok += other.dequeued_ok;
        self.dequeue_empty_misses += other.dequeue_empty_misses;
    }
}

impl<'a> std::iter::Sum<&'a YMBenchCounter> for YMBenchCounter {
    fn sum<I: Iterator<Item = &'a YMBenchCounter>>(iter: I) -> Self {
        iter.fold(YMBenchCounter::default(), |mut total, c| {
            total.merge(c);
            total
        })
    }
}

/// Outcome of one phase: summed counters and the wall-clock time from the start barrier
/// until the last worker joined.
#[derive(Clone, Debug)]
pub struct YMPhaseResult {
    pub totals: YMBenchCounter,
    pub per_worker: Vec<YMBenchCounter>,
    pub elapsed: Duration,
}

/// Result of a full run.
#[derive(Clone, Debug)]
pub struct YMBenchReport {
    pub kind: YMQueueKind,
    pub producers: u16,
    pub consumers: u16,
    pub duration: Duration,
    pub work_per_op: Duration,
    /// Elements enqueued before the warmup started.
    pub seeded: u64,
    /// Warmup counts, kept only for accounting; they never feed the rates.
    pub warmup: YMBenchCounter,
    pub totals: YMBenchCounter,
    pub elapsed: Duration,
}

impl YMBenchReport {
    pub fn enqueue_rate(&self) -> f64 {
        rate(self.totals.enqueued_ok, self.elapsed)
    }

    pub fn dequeue_rate(&self) -> f64 {
        rate(self.totals.dequeued_ok, self.elapsed)
    }

    /// Everything ever put in the queue during this run, seeds included.
    pub fn total_enqueued(&self) -> u64 {
        self.seeded + self.warmup.enqueued_ok + self.totals.enqueued_ok
    }

    pub fn total_dequeued(&self) -> u64 {
        self.warmup.dequeued_ok + self.totals.dequeued_ok
    }
}

fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

impl fmt::Display for YMBenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Queue: {} | P={} C={} | dur={:?} (measured {:?}) | work/op={}ns",
            self.kind,
            self.producers,
            self.consumers,
            self.duration,
            self.elapsed,
            self.work_per_op.as_nanos()
        )?;
        writeln!(
            f,
            "Enqueue: {}  ({})",
            self.totals.enqueued_ok,
            human_rate(self.totals.enqueued_ok, self.elapsed)
        )?;
        writeln!(
            f,
            "Dequeue: {}  ({})",
            self.totals.dequeued_ok,
            human_rate(self.totals.dequeued_ok, self.elapsed)
        )?;
        write!(
            f,
            "Empty  : {}  (dequeue attempts when empty)",
            self.totals.dequeue_empty_misses
        )
    }
}

/// Build the configured queue and benchmark it.
///
/// # Errors
/// Returns the validation error if `config` is rejected; nothing is spawned in that case.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use yep_msq::{YMBenchConfig, YMQueueKind, run_benchmark};
///
/// let config = YMBenchConfig {
///     kind: YMQueueKind::LockFree,
///     producers: 1,
///     consumers: 1,
///     duration: Duration::from_millis(20),
///     warmup: Duration::from_millis(5),
///     ..YMBenchConfig::default()
/// };
/// let report = run_benchmark(&config).unwrap();
/// assert!(report.total_dequeued() <= report.total_enqueued());
/// ```
pub fn run_benchmark(config: &YMBenchConfig) -> Result<YMBenchReport, YMQueueError> {
    config.validate()?;
    let queue = config.kind.build::<u64>();
    run_benchmark_on(queue.as_ref(), config)
}

/// Benchmark an existing queue, leaving whatever is still queued in place so the caller
/// can inspect or [`drain`] it afterwards. `config.kind` is ignored in favour of
/// `queue.kind()`.
///
/// # Errors
/// Returns the validation error if `config` is rejected.
pub fn run_benchmark_on(
    queue: &dyn YMQueue<u64>,
    config: &YMBenchConfig,
) -> Result<YMBenchReport, YMQueueError> {
    config.validate()?;

    // give every consumer something to find on its first attempt
    let seeded = config.consumers as u64;
    for i in 0..seeded {
        queue.enqueue(i);
    }
    debug!(kind = %queue.kind(), seeded, "seeded queue");

    let warmup = if config.warmup.is_zero() {
        YMBenchCounter::default()
    } else {
        debug!(warmup = ?config.warmup, "starting warmup phase");
        run_phase(queue, config, config.warmup, Duration::ZERO).totals
    };

    debug!(duration = ?config.duration, "starting measured phase");
    let measured = run_phase(queue, config, config.duration, config.work_per_op);

    let report = YMBenchReport {
        kind: queue.kind(),
        producers: config.producers,
        consumers: config.consumers,
        duration: config.duration,
        work_per_op: config.work_per_op,
        seeded,
        warmup,
        totals: measured.totals,
        elapsed: measured.elapsed,
    };

    info!(
        kind = %report.kind,
        enqueued = report.totals.enqueued_ok,
        dequeued = report.totals.dequeued_ok,
        empty = report.totals.dequeue_empty_misses,
        elapsed = ?report.elapsed,
        "benchmark finished"
    );

    Ok(report)
}

/// Run `config.producers` producers and `config.consumers` consumers against `queue` for
/// `duration`, burning `work` per successful operation.
///
/// The calling thread acts as the timer: it releases the workers through a barrier,
/// sleeps for `duration`, raises the stop signal and joins every worker. A worker panic
/// is re-raised here after the stop signal has gone out.
pub fn run_phase(
    queue: &dyn YMQueue<u64>,
    config: &YMBenchConfig,
    duration: Duration,
    work: Duration,
) -> YMPhaseResult {
    let total_workers = config.worker_count();
    let barrier = Barrier::new(total_workers + 1); // +1 for the timer
    let stop = AtomicBool::new(false);
    let cores = select_cores(config.pin_threads);

    let (per_worker, elapsed) = thread::scope(|s| {
        let mut handles = Vec::with_capacity(total_workers);

        for idx in 0..config.producers as usize {
            let core = pick_core(&cores, idx);
            let seed = config.seed.wrapping_add((idx as u64).wrapping_mul(1337));
            let (barrier, stop) = (&barrier, &stop);
            let burst = config.burst;
            let handle = thread::Builder::new()
                .name(format!("producer_{idx}"))
                .spawn_scoped(s, move || {
                    pin_current(core);
                    barrier.wait();
                    produce(queue, stop, seed, work, burst)
                })
                .expect("failed to spawn producer thread");
            handles.push(handle);
        }

        for idx in 0..config.consumers as usize {
            let core = pick_core(&cores, config.producers as usize + idx);
            let (barrier, stop) = (&barrier, &stop);
            let handle = thread::Builder::new()
                .name(format!("consumer_{idx}"))
                .spawn_scoped(s, move || {
                    pin_current(core);
                    barrier.wait();
                    consume(queue, stop, work)
                })
                .expect("failed to spawn consumer thread");
            handles.push(handle);
        }

        barrier.wait();
        let start = Instant::now();
        thread::sleep(duration);
        stop.store(true, Ordering::Relaxed);

        let mut per_worker = Vec::with_capacity(total_workers);
        let mut panicked = None;
        for handle in handles {
            match handle.join() {
                Ok(counter) => per_worker.push(counter),
                Err(payload) => {
                    panicked.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = panicked {
            std::panic::resume_unwind(payload);
        }

        (per_worker, start.elapsed())
    });

    #[cfg(feature = "tracing")]
    for (idx, counter) in per_worker.iter().enumerate() {
        trace!(worker = idx, ?counter, "worker joined");
    }

    YMPhaseResult {
        totals: per_worker.iter().sum(),
        per_worker,
        elapsed,
    }
}

/// Dequeue until the queue reports empty and return how many items came out.
///
/// Only meaningful on a quiescent queue, i.e. after every producer has stopped.
pub fn drain(queue: &dyn YMQueue<u64>) -> u64 {
    let mut drained = 0;
    while queue.dequeue().is_some() {
        drained += 1;
    }
    drained
}

fn produce(
    queue: &dyn YMQueue<u64>,
    stop: &AtomicBool,
    seed: u64,
    work: Duration,
    burst: Option<YMBurstShape>,
) -> YMBenchCounter {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut counter = YMBenchCounter::default();
    let mut in_burst = 0u32;

    while !stop.load(Ordering::Relaxed) {
        queue.enqueue(u64::from(rng.next_u32()));
        counter.enqueued_ok += 1;
        busy_work(work);

        if let Some(shape) = burst {
            in_burst += 1;
            if in_burst >= shape.burst {
                in_burst = 0;
                pause(shape.pause, stop);
            }
        }
    }

    counter
}

fn consume(queue: &dyn YMQueue<u64>, stop: &AtomicBool, work: Duration) -> YMBenchCounter {
    let mut counter = YMBenchCounter::default();
    let mut backoff = YMBackoff::new();

    while !stop.load(Ordering::Relaxed) {
        match queue.dequeue() {
            Some(value) => {
                black_box(value);
                counter.dequeued_ok += 1;
                busy_work(work);
                backoff.reset();
            }
            None => {
                counter.dequeue_empty_misses += 1;
                backoff.snooze();
            }
        }
    }

    counter
}

/// Sleep for `total`, waking at least every [`PAUSE_SLICE`] to honor the stop signal.
fn pause(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}

fn select_cores(pin_threads: bool) -> Vec<CoreId> {
    if !pin_threads {
        return Vec::new();
    }

    match core_affinity::get_core_ids() {
        Some(cores) if !cores.is_empty() => cores,
        _ => {
            warn!("core ids unavailable, running unpinned");
            Vec::new()
        }
    }
}

fn pick_core(cores: &[CoreId], idx: usize) -> Option<CoreId> {
    if cores.is_empty() {
        None
    } else {
        Some(cores[idx % cores.len()])
    }
}

fn pin_current(core: Option<CoreId>) {
    if let Some(core) = core {
        if !core_affinity::set_for_current(core) {
            warn!(core = core.id, "failed to pin worker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config(kind: YMQueueKind) -> YMBenchConfig {
        YMBenchConfig {
            kind,
            producers: 2,
            consumers: 2,
            duration: Duration::from_millis(30),
            warmup: Duration::from_millis(10),
            seed: 7,
            ..YMBenchConfig::default()
        }
    }

    #[test]
    fn validate_rejects_bad_counts() {
        let config = short_config(YMQueueKind::TwoLock);
        assert_eq!(config.validate(), Ok(()));

        let no_producers = YMBenchConfig {
            producers: 0,
            ..config.clone()
        };
        assert!(matches!(
            no_producers.validate(),
            Err(YMQueueError::InvalidArgs(_))
        ));

        let no_time = YMBenchConfig {
            duration: Duration::ZERO,
            ..config.clone()
        };
        assert!(matches!(no_time.validate(), Err(YMQueueError::InvalidArgs(_))));

        let empty_burst = YMBenchConfig {
            burst: Some(YMBurstShape {
                burst: 0,
                pause: Duration::from_micros(10),
            }),
            ..config
        };
        assert!(matches!(
            empty_burst.validate(),
            Err(YMQueueError::InvalidArgs(_))
        ));
    }

    #[test]
    fn counters_sum_field_by_field() {
        let counters = [
            YMBenchCounter {
                enqueued_ok: 1,
                dequeued_ok: 2,
                dequeue_empty_misses: 3,
            },
            YMBenchCounter {
                enqueued_ok: 10,
                dequeued_ok: 20,
                dequeue_empty_misses: 30,
            },
        ];
        let total: YMBenchCounter = counters.iter().sum();
        assert_eq!(
            total,
            YMBenchCounter {
                enqueued_ok: 11,
                dequeued_ok: 22,
                dequeue_empty_misses: 33,
            }
        );
    }

    #[test]
    fn phase_splits_roles_across_workers() {
        let config = short_config(YMQueueKind::LockFree);
        let queue = config.kind.build::<u64>();

        let phase = run_phase(queue.as_ref(), &config, config.duration, Duration::ZERO);
        assert_eq!(phase.per_worker.len(), 4);

        // producers come first and never dequeue; consumers never enqueue
        for producer in &phase.per_worker[..2] {
            assert!(producer.enqueued_ok > 0);
            assert_eq!(producer.dequeued_ok + producer.dequeue_empty_misses, 0);
        }
        for consumer in &phase.per_worker[2..] {
            assert_eq!(consumer.enqueued_ok, 0);
        }

        assert!(phase.elapsed >= config.duration);
        let drained = drain(queue.as_ref());
        assert_eq!(phase.totals.enqueued_ok, phase.totals.dequeued_ok + drained);
    }

    #[test]
    fn paused_producer_still_stops_on_time() {
        let config = YMBenchConfig {
            producers: 1,
            consumers: 1,
            burst: Some(YMBurstShape {
                burst: 4,
                pause: Duration::from_secs(60),
            }),
            ..short_config(YMQueueKind::TwoLock)
        };
        let queue = config.kind.build::<u64>();

        let phase = run_phase(queue.as_ref(), &config, config.duration, Duration::ZERO);
        // one burst, then parked in the pause until the stop signal
        assert_eq!(phase.totals.enqueued_ok, 4);
        assert!(phase.elapsed < Duration::from_secs(5));
    }

    #[test]
    fn report_formats_totals() {
        let report = YMBenchReport {
            kind: YMQueueKind::LockFree,
            producers: 2,
            consumers: 3,
            duration: Duration::from_secs(1),
            work_per_op: Duration::from_nanos(100),
            seeded: 3,
            warmup: YMBenchCounter::default(),
            totals: YMBenchCounter {
                enqueued_ok: 2_000,
                dequeued_ok: 1_500,
                dequeue_empty_misses: 42,
            },
            elapsed: Duration::from_secs(1),
        };

        let text = report.to_string();
        assert!(text.starts_with("Queue: lock-free | P=2 C=3"));
        assert!(text.contains("work/op=100ns"));
        assert!(text.contains("Enqueue: 2000  (2.00 Kops/s)"));
        assert!(text.contains("Dequeue: 1500  (1.50 Kops/s)"));
        assert!(text.contains("Empty  : 42"));
        assert_eq!(report.enqueue_rate(), 2_000.0);
        assert_eq!(report.total_enqueued(), 2_003);
    }
}
