//! MPMC Queue Throughput Benchmark
//!
//! Measures steady-state dequeue throughput of the two-lock and lock-free queues using
//! Criterion with time-based samples. Each sample runs the harness's measured phase for a
//! fixed duration, so a regression that stalls the queue shows up as a low rate rather than
//! a hung benchmark.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::time::Duration;
use yep_msq::{YMBenchConfig, YMQueueKind, drain, run_phase};

#[derive(Debug, Clone, Copy)]
struct Params {
    kind: YMQueueKind,
    producers: u16,
    consumers: u16,
    work_ns: u64,
}

impl Params {
    fn id(&self) -> String {
        format!(
            "{}_prod{}_cons{}_work{}",
            self.kind, self.producers, self.consumers, self.work_ns
        )
    }

    fn config(&self) -> YMBenchConfig {
        YMBenchConfig {
            kind: self.kind,
            producers: self.producers,
            consumers: self.consumers,
            work_per_op: Duration::from_nanos(self.work_ns),
            seed: 0x5eed,
            ..YMBenchConfig::default()
        }
    }
}

/// Run a single sample for a fixed duration on a fresh queue.
/// Returns (elapsed_duration, items_dequeued)
fn run_sample(params: &Params, sample_duration: Duration) -> (Duration, u64) {
    let config = params.config();
    let queue = params.kind.build::<u64>();

    let phase = run_phase(queue.as_ref(), &config, sample_duration, config.work_per_op);
    drain(queue.as_ref());

    (phase.elapsed, phase.totals.dequeued_ok)
}

fn is_verbose_mode() -> bool {
    if std::env::var("CRITERION_DEBUG").is_ok() {
        return true;
    }

    std::env::args().any(|arg| arg == "--verbose" || arg == "-v")
}

fn bench_queues(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc");
    group.sample_size(10);

    let sample_duration = Duration::from_millis(200);

    let thread_counts = vec![(1, 1), (2, 2), (4, 4)];
    let work_costs = vec![0, 200];

    for kind in YMQueueKind::ALL {
        for (producers, consumers) in &thread_counts {
            for work_ns in &work_costs {
                let params = Params {
                    kind,
                    producers: *producers,
                    consumers: *consumers,
                    work_ns: *work_ns,
                };

                let (_probe_dt, probe_items) = run_sample(&params, sample_duration);
                let items_per_sample = probe_items.max(1);

                group.throughput(Throughput::Elements(items_per_sample));

                let is_verbose = is_verbose_mode();
                group.bench_with_input(
                    BenchmarkId::from_parameter(params.id()),
                    &params,
                    |b, params| {
                        b.iter_custom(|iters| {
                            let duration = sample_duration
                                .checked_mul(
                                    u32::try_from(iters)
                                        .expect("iters was too large to fit in u32"),
                                )
                                .expect("sample_duration overflow");

                            let (time_taken, items_processed) = run_sample(params, duration);

                            let secs = time_taken.as_secs_f64();
                            if secs > 0.0 && is_verbose {
                                let throughput = items_processed as f64 / secs;
                                println!(
                                    "params={:?} iters={} items_processed={} time_taken={:?} throughput={:.0} items/s",
                                    params, iters, items_processed, time_taken, throughput
                                );
                            }

                            // time `iters * items_per_sample` items would take at the rate
                            // this sample actually achieved
                            Duration::from_nanos(
                                (time_taken.as_nanos() * iters as u128 * items_per_sample as u128
                                    / items_processed.max(1) as u128)
                                    as u64,
                            )
                        });
                    },
                );
            }
        }
    }

    group.finish();
}

criterion_group!(benches, bench_queues);
criterion_main!(benches);
