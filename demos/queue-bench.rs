use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use yep_msq::{YMBenchConfig, YMBurstShape, YMQueueKind, run_benchmark};

/// Benchmark one queue implementation under a multi-producer/multi-consumer load.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Queue implementation: two-lock (alias: lock) or lock-free (alias: ms)
    #[arg(short = 'q', long, default_value = "two-lock")]
    queue: YMQueueKind,

    /// Number of producer threads
    #[arg(short = 'p', long, default_value = "4")]
    producers: u16,

    /// Number of consumer threads
    #[arg(short = 'c', long, default_value = "4")]
    consumers: u16,

    /// Length of the measured phase in milliseconds
    #[arg(short = 'd', long, default_value = "5000")]
    duration_ms: u64,

    /// Length of the discarded warmup phase in milliseconds
    #[arg(short = 'w', long, default_value = "500")]
    warmup_ms: u64,

    /// Synthetic CPU work per successful operation, in nanoseconds
    #[arg(long, default_value = "0")]
    work_ns: u64,

    /// Producers pause after this many enqueues (0 disables shaping)
    #[arg(long, default_value = "0")]
    burst: u32,

    /// Pause length after each burst, in microseconds
    #[arg(long, default_value = "100")]
    pause_us: u64,

    /// Pin worker threads to cores
    #[arg(long, default_value_t = false)]
    pin: bool,

    /// Seed for producer payloads (defaults to the clock)
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> YMBenchConfig {
        let defaults = YMBenchConfig::default();
        YMBenchConfig {
            kind: self.queue,
            producers: self.producers,
            consumers: self.consumers,
            duration: Duration::from_millis(self.duration_ms),
            warmup: Duration::from_millis(self.warmup_ms),
            work_per_op: Duration::from_nanos(self.work_ns),
            burst: (self.burst > 0).then(|| YMBurstShape {
                burst: self.burst,
                pause: Duration::from_micros(self.pause_us),
            }),
            pin_threads: self.pin,
            seed: self.seed.unwrap_or(defaults.seed),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.verbose {
        yep_msq::trace::init_tracing();
    }

    let config = args.to_config();
    if args.verbose {
        println!("Benchmark run with: {config:?}");
    }

    match run_benchmark(&config) {
        Ok(report) => {
            println!("{report}");
            if args.verbose {
                println!(
                    "Warmup : {} enq / {} deq (discarded), seeded {}",
                    report.warmup.enqueued_ok, report.warmup.dequeued_ok, report.seeded
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
