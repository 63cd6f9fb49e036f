use std::hint::black_box;
use std::time::{Duration, Instant};

/// Spin for roughly `cost` to stand in for per-item application work.
pub(crate) fn busy_work(cost: Duration) {
    if cost.is_zero() {
        return;
    }

    let start = Instant::now();
    let mut x: u64 = 0x1465_9810_3934_6656;
    while start.elapsed() < cost {
        // xorshift keeps the loop from being optimized away
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        black_box(x);
    }
}

/// Format `count` operations over `elapsed` as a rate with an SI prefix.
pub(crate) fn human_rate(count: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "n/a".to_string();
    }

    let per_sec = count as f64 / secs;
    if per_sec >= 1e9 {
        format!("{:.2} Gops/s", per_sec / 1e9)
    } else if per_sec >= 1e6 {
        format!("{:.2} Mops/s", per_sec / 1e6)
    } else if per_sec >= 1e3 {
        format!("{:.2} Kops/s", per_sec / 1e3)
    } else {
        format!("{per_sec:.2} ops/s")
    }
}
