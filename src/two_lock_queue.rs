use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_utils::CachePadded;

struct Node<T> {
    /// `None` only for the sentinel.
    value: Option<T>,
    /// Written under the tail lock, read under the head lock. With a single element both
    /// locks reach the same node, hence the atomic.
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Unbounded FIFO queue with independent head-side and tail-side mutexes.
///
/// `head` always points at a sentinel node whose `next` is the first element, so
/// enqueue only touches `tail` and dequeue only touches `head`. Concurrent enqueues
/// serialize on the tail lock, concurrent dequeues serialize on the head lock, and the
/// two sides never wait on each other.
pub struct YMTwoLockQueue<T> {
    head: CachePadded<Mutex<*mut Node<T>>>,
    tail: CachePadded<Mutex<*mut Node<T>>>,
}

// The raw pointers are only dereferenced while the owning lock is held.
unsafe impl<T: Send> Send for YMTwoLockQueue<T> {}
unsafe impl<T: Send> Sync for YMTwoLockQueue<T> {}

// Critical sections are pointer swaps that cannot panic midway, so a poisoned lock still
// guards a consistent list.
fn lock<P>(mutex: &Mutex<P>) -> MutexGuard<'_, P> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> YMTwoLockQueue<T> {
    /// Create an empty queue holding only the sentinel.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::YMTwoLockQueue;
    ///
    /// let queue: YMTwoLockQueue<u32> = YMTwoLockQueue::new();
    /// assert!(queue.is_empty());
    /// ```
    pub fn new() -> Self {
        let sentinel = Node::alloc(None);
        YMTwoLockQueue {
            head: CachePadded::new(Mutex::new(sentinel)),
            tail: CachePadded::new(Mutex::new(sentinel)),
        }
    }

    /// Append `value` at the tail. Always succeeds.
    ///
    /// The node is allocated before the tail lock is taken so the critical section is
    /// just the link and the tail swing.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::YMTwoLockQueue;
    ///
    /// let queue = YMTwoLockQueue::new();
    /// queue.enqueue(1);
    /// queue.enqueue(2);
    /// assert_eq!(queue.dequeue(), Some(1));
    /// ```
    pub fn enqueue(&self, value: T) {
        let node = Node::alloc(Some(value));

        let mut tail = lock(&*self.tail);
        // Release pairs with the Acquire load in `dequeue`, publishing the payload.
        unsafe { (**tail).next.store(node, Ordering::Release) };
        *tail = node;
    }

    /// Remove and return the value at the head, or `None` if the queue is empty.
    ///
    /// On success the dequeued node becomes the new sentinel and the old sentinel is
    /// freed after the head lock is released.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::YMTwoLockQueue;
    ///
    /// let queue = YMTwoLockQueue::new();
    /// assert_eq!(queue.dequeue(), None);
    /// queue.enqueue("x");
    /// assert_eq!(queue.dequeue(), Some("x"));
    /// assert_eq!(queue.dequeue(), None);
    /// ```
    pub fn dequeue(&self) -> Option<T> {
        let mut head = lock(&*self.head);
        let sentinel = *head;
        let next = unsafe { (*sentinel).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }

        // Only the head lock holder touches `value`; an enqueuer may concurrently write
        // `next` of this same node, which is a separate field.
        let value = unsafe { (*next).value.take() };
        *head = next;
        drop(head);

        // Unreachable now: the head moved past it and the tail has already moved on
        // (a non-null `next` means the enqueuer finished its store on this node).
        drop(unsafe { Box::from_raw(sentinel) });

        debug_assert!(value.is_some(), "non-sentinel node without a payload");
        value
    }

    /// Whether the queue was empty at the instant the head lock was held.
    pub fn is_empty(&self) -> bool {
        let head = lock(&*self.head);
        unsafe { (**head).next.load(Ordering::Acquire).is_null() }
    }
}

impl<T> Default for YMTwoLockQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for YMTwoLockQueue<T> {
    fn drop(&mut self) {
        let mut cursor = *self
            .head
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        while !cursor.is_null() {
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next.load(Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fifo_roundtrip_through_sentinel_swaps() {
        let queue = YMTwoLockQueue::new();
        assert!(queue.is_empty());

        for i in 0..64 {
            queue.enqueue(i);
        }
        assert!(!queue.is_empty());

        for i in 0..32 {
            assert_eq!(queue.dequeue(), Some(i));
        }

        // interleave so the tail keeps moving while the head chases it
        for i in 64..96 {
            queue.enqueue(i);
            assert_eq!(queue.dequeue(), Some(i - 32));
        }

        for i in 64..96 {
            assert_eq!(queue.dequeue(), Some(i));
        }
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_queue_stays_empty() {
        let queue: YMTwoLockQueue<u64> = YMTwoLockQueue::new();
        for _ in 0..1000 {
            assert_eq!(queue.dequeue(), None);
        }
        assert!(queue.is_empty());

        queue.enqueue(5);
        assert_eq!(queue.dequeue(), Some(5));
    }

    #[test]
    fn drop_releases_remaining_payloads() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let queue = YMTwoLockQueue::new();
            for _ in 0..10 {
                queue.enqueue(Tracked(Arc::clone(&drops)));
            }
            drop(queue.dequeue());
            drop(queue.dequeue());
            assert_eq!(drops.load(Ordering::SeqCst), 2);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn enqueue_and_dequeue_sides_run_in_parallel() {
        let queue = YMTwoLockQueue::new();

        // hold the head lock; enqueues must still go through
        let head = lock(&*queue.head);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..100 {
                    queue.enqueue(i);
                }
            });
        });
        drop(head);

        for i in 0..100 {
            assert_eq!(queue.dequeue(), Some(i));
        }
    }
}
