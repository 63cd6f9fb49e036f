use std::fmt;
use std::str::FromStr;

use crate::{YMLockFreeQueue, YMQueueError, YMTwoLockQueue};

/// The capability both queue implementations expose to the benchmark harness.
///
/// `enqueue` never fails (both queues are unbounded). `dequeue` returns `None` when the
/// queue was observed empty; that is an ordinary outcome, not an error.
pub trait YMQueue<T>: Send + Sync {
    /// Append `value` at the tail.
    fn enqueue(&self, value: T);

    /// Remove and return the value at the head, or `None` if the queue is empty.
    fn dequeue(&self) -> Option<T>;

    /// Which implementation this is, for reporting.
    fn kind(&self) -> YMQueueKind;
}

/// Selector for the queue implementation under test.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum YMQueueKind {
    /// [`YMTwoLockQueue`]: separate head and tail mutexes.
    TwoLock,
    /// [`YMLockFreeQueue`]: Michael & Scott CAS queue.
    LockFree,
}

impl YMQueueKind {
    pub const ALL: [YMQueueKind; 2] = [YMQueueKind::TwoLock, YMQueueKind::LockFree];

    /// Construct an empty queue of this kind.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::{YMQueue, YMQueueKind};
    ///
    /// let queue = YMQueueKind::LockFree.build::<u64>();
    /// queue.enqueue(7);
    /// assert_eq!(queue.dequeue(), Some(7));
    /// assert_eq!(queue.dequeue(), None);
    /// ```
    pub fn build<T: Send + 'static>(self) -> Box<dyn YMQueue<T>> {
        match self {
            YMQueueKind::TwoLock => Box::new(YMTwoLockQueue::new()),
            YMQueueKind::LockFree => Box::new(YMLockFreeQueue::new()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YMQueueKind::TwoLock => "two-lock",
            YMQueueKind::LockFree => "lock-free",
        }
    }
}

impl fmt::Display for YMQueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YMQueueKind {
    type Err = YMQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-lock" | "twolock" | "lock" => Ok(YMQueueKind::TwoLock),
            "lock-free" | "lockfree" | "ms" => Ok(YMQueueKind::LockFree),
            _ => Err(YMQueueError::UnknownQueueKind(s.to_string())),
        }
    }
}

impl<T: Send> YMQueue<T> for YMTwoLockQueue<T> {
    fn enqueue(&self, value: T) {
        YMTwoLockQueue::enqueue(self, value)
    }

    fn dequeue(&self) -> Option<T> {
        YMTwoLockQueue::dequeue(self)
    }

    fn kind(&self) -> YMQueueKind {
        YMQueueKind::TwoLock
    }
}

impl<T: Send> YMQueue<T> for YMLockFreeQueue<T> {
    fn enqueue(&self, value: T) {
        YMLockFreeQueue::enqueue(self, value)
    }

    fn dequeue(&self) -> Option<T> {
        YMLockFreeQueue::dequeue(self)
    }

    fn kind(&self) -> YMQueueKind {
        YMQueueKind::LockFree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_queue_kinds() {
        assert_eq!("two-lock".parse::<YMQueueKind>(), Ok(YMQueueKind::TwoLock));
        assert_eq!("lock".parse::<YMQueueKind>(), Ok(YMQueueKind::TwoLock));
        assert_eq!("Lock-Free".parse::<YMQueueKind>(), Ok(YMQueueKind::LockFree));
        assert_eq!("ms".parse::<YMQueueKind>(), Ok(YMQueueKind::LockFree));
        assert_eq!(
            "ring".parse::<YMQueueKind>(),
            Err(YMQueueError::UnknownQueueKind("ring".to_string()))
        );

        for kind in YMQueueKind::ALL {
            assert_eq!(kind.to_string().parse::<YMQueueKind>(), Ok(kind));
        }
    }

    #[test]
    fn build_reports_its_kind() {
        for kind in YMQueueKind::ALL {
            let queue = kind.build::<String>();
            assert_eq!(queue.kind(), kind);
            assert_eq!(queue.dequeue(), None);

            queue.enqueue("a".to_string());
            queue.enqueue("b".to_string());
            assert_eq!(queue.dequeue().as_deref(), Some("a"));
            assert_eq!(queue.dequeue().as_deref(), Some("b"));
            assert_eq!(queue.dequeue(), None);
        }
    }
}
