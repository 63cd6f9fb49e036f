use std::thread;
use std::time::Duration;

/// What a single [`YMBackoff::snooze`] call did.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum YMBackoffStep {
    Yield,
    Sleep,
}

/// Graduated idle backoff for consumers that keep finding the queue empty.
///
/// The first `yield_limit` consecutive misses yield the processor; after that every miss
/// sleeps for `sleep`. Once the miss count passes `reset_limit` the escalation starts over,
/// so a long idle stretch periodically drops back to cheap yields. A successful dequeue
/// should call [`reset`](Self::reset).
#[derive(Clone, Debug)]
pub struct YMBackoff {
    misses: u32,
    yield_limit: u32,
    reset_limit: u32,
    sleep: Duration,
}

impl YMBackoff {
    pub const DEFAULT_YIELD_LIMIT: u32 = 50;
    pub const DEFAULT_RESET_LIMIT: u32 = 1000;
    pub const DEFAULT_SLEEP: Duration = Duration::from_micros(1);

    pub fn new() -> Self {
        Self::with_limits(
            Self::DEFAULT_YIELD_LIMIT,
            Self::DEFAULT_RESET_LIMIT,
            Self::DEFAULT_SLEEP,
        )
    }

    pub fn with_limits(yield_limit: u32, reset_limit: u32, sleep: Duration) -> Self {
        YMBackoff {
            misses: 0,
            yield_limit,
            reset_limit: reset_limit.max(yield_limit),
            sleep,
        }
    }

    /// Record one empty miss and back off accordingly.
    pub fn snooze(&mut self) -> YMBackoffStep {
        self.misses += 1;

        if self.misses < self.yield_limit {
            thread::yield_now();
            return YMBackoffStep::Yield;
        }

        thread::sleep(self.sleep);
        if self.misses > self.reset_limit {
            self.misses = 0;
        }
        YMBackoffStep::Sleep
    }

    pub fn reset(&mut self) {
        self.misses = 0;
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }
}

impl Default for YMBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_then_resets() {
        let mut backoff = YMBackoff::with_limits(3, 5, Duration::ZERO);

        let steps: Vec<_> = (0..8).map(|_| backoff.snooze()).collect();
        assert_eq!(
            steps,
            vec![
                YMBackoffStep::Yield,
                YMBackoffStep::Yield,
                YMBackoffStep::Sleep,
                YMBackoffStep::Sleep,
                YMBackoffStep::Sleep,
                // sixth miss passes the reset limit, sleeps once more and starts over
                YMBackoffStep::Sleep,
                YMBackoffStep::Yield,
                YMBackoffStep::Yield,
            ]
        );
        assert_eq!(backoff.misses(), 2);
    }

    #[test]
    fn reset_after_success() {
        let mut backoff = YMBackoff::with_limits(2, 10, Duration::ZERO);
        assert_eq!(backoff.snooze(), YMBackoffStep::Yield);
        assert_eq!(backoff.snooze(), YMBackoffStep::Sleep);

        backoff.reset();
        assert_eq!(backoff.misses(), 0);
        assert_eq!(backoff.snooze(), YMBackoffStep::Yield);
    }

    #[test]
    fn defaults_match_consumer_policy() {
        let mut backoff = YMBackoff::new();
        for _ in 0..YMBackoff::DEFAULT_YIELD_LIMIT - 1 {
            assert_eq!(backoff.snooze(), YMBackoffStep::Yield);
        }
        assert_eq!(backoff.snooze(), YMBackoffStep::Sleep);
    }
}
