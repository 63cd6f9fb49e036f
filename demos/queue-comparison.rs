use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use yep_msq::{
    YMBenchConfig, YMBenchReport, YMQueueError, YMQueueKind, drain, run_benchmark_on,
};

/// Run the same producer/consumer workload against the two-lock and lock-free queues.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of producer threads
    #[arg(short = 'p', long, default_value = "4")]
    producers: u16,

    /// Number of consumer threads
    #[arg(short = 'c', long, default_value = "4")]
    consumers: u16,

    /// Length of each measured phase in milliseconds
    #[arg(short = 'd', long, default_value = "2000")]
    duration_ms: u64,

    /// Length of each warmup phase in milliseconds
    #[arg(short = 'w', long, default_value = "250")]
    warmup_ms: u64,

    /// Synthetic CPU work per successful operation, in nanoseconds
    #[arg(long, default_value = "0")]
    work_ns: u64,

    /// Enable verbose logging
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
}

fn run_kind(
    kind: YMQueueKind,
    base: &YMBenchConfig,
) -> Result<(YMBenchReport, u64), YMQueueError> {
    let config = YMBenchConfig {
        kind,
        ..base.clone()
    };
    let queue = kind.build::<u64>();
    let report = run_benchmark_on(queue.as_ref(), &config)?;
    let leftover = drain(queue.as_ref());
    Ok((report, leftover))
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.verbose {
        yep_msq::trace::init_tracing();
    }

    let base = YMBenchConfig {
        producers: args.producers,
        consumers: args.consumers,
        duration: Duration::from_millis(args.duration_ms),
        warmup: Duration::from_millis(args.warmup_ms),
        work_per_op: Duration::from_nanos(args.work_ns),
        ..YMBenchConfig::default()
    };

    println!("Comparison run with:");
    println!("  Producer threads: {}", base.producers);
    println!("  Consumer threads: {}", base.consumers);
    println!("  Duration: {:?} (warmup {:?})", base.duration, base.warmup);
    println!("  Work per op: {}ns", args.work_ns);

    let mut results = Vec::with_capacity(YMQueueKind::ALL.len());
    for kind in YMQueueKind::ALL {
        match run_kind(kind, &base) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    println!("\nThroughput (higher is better):");
    for (report, _) in &results {
        println!(
            "  {:<10} enqueue {:>14.2} ops/s   dequeue {:>14.2} ops/s   empty misses {}",
            report.kind.to_string(),
            report.enqueue_rate(),
            report.dequeue_rate(),
            report.totals.dequeue_empty_misses
        );
    }

    println!("\nConservation (enqueued incl. seeds = dequeued + left in queue):");
    let mut balanced = true;
    for (report, leftover) in &results {
        let ok = report.total_enqueued() == report.total_dequeued() + leftover;
        balanced &= ok;
        println!(
            "  {:<10} {} = {} + {}  {}",
            report.kind.to_string(),
            report.total_enqueued(),
            report.total_dequeued(),
            leftover,
            if ok { "ok" } else { "MISMATCH" }
        );
    }

    if args.verbose {
        for (report, _) in &results {
            println!("\n{report}");
        }
    }

    if balanced {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
