//! Michael & Scott non-blocking FIFO queue.
//!
//! The list always starts with a sentinel node. `head` points at the sentinel, the first
//! element lives in `head.next`, and `tail` points at the last linked node or, briefly,
//! at its predecessor. Any thread that sees `tail.next` non-null swings `tail` forward
//! before doing its own work, so a stalled enqueuer can never block the others.
//!
//! Linearization points:
//! * enqueue: the CAS that links the new node onto `tail.next`.
//! * dequeue (found): the CAS that moves `head` to `head.next`.
//! * dequeue (empty): the load of a null `head.next` from a verified `head` snapshot.

use std::mem::MaybeUninit;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::{Backoff, CachePadded};

use crate::reclaim;

struct Node<T> {
    /// Uninitialized in the sentinel. Moved out exactly once, by the thread whose head CAS
    /// turned this node into the new sentinel.
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Node {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }

    fn with_value(value: T) -> Self {
        Node {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        }
    }
}

/// Unbounded lock-free FIFO queue (Michael & Scott, 1996).
///
/// Unlinked sentinels are released through epoch-based reclamation, so a snapshot taken
/// by a concurrent operation never dangles and a retired address is never reused while
/// such a snapshot exists.
///
/// Progress is lock-free, not wait-free: some thread always completes, but a single
/// thread can in principle retry indefinitely under an adversarial schedule.
pub struct YMLockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

unsafe impl<T: Send> Send for YMLockFreeQueue<T> {}
unsafe impl<T: Send> Sync for YMLockFreeQueue<T> {}

impl<T> YMLockFreeQueue<T> {
    /// Create an empty queue holding only the sentinel.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::YMLockFreeQueue;
    ///
    /// let queue: YMLockFreeQueue<u32> = YMLockFreeQueue::new();
    /// assert!(queue.is_empty());
    /// ```
    pub fn new() -> Self {
        let queue = YMLockFreeQueue {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };

        unsafe {
            // nothing else can see the queue yet
            let guard = epoch::unprotected();
            let sentinel = Owned::new(Node::sentinel()).into_shared(guard);
            queue.head.store(sentinel, Ordering::Relaxed);
            queue.tail.store(sentinel, Ordering::Relaxed);
        }

        queue
    }

    /// Append `value` at the tail. Always succeeds.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::YMLockFreeQueue;
    ///
    /// let queue = YMLockFreeQueue::new();
    /// queue.enqueue(1);
    /// queue.enqueue(2);
    /// assert_eq!(queue.dequeue(), Some(1));
    /// ```
    pub fn enqueue(&self, value: T) {
        let guard = &reclaim::pin();
        let node = Owned::new(Node::with_value(value)).into_shared(guard);
        let backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // tail is never null and, being reachable, never retired while we are pinned
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if tail != self.tail.load(Ordering::Acquire, guard) {
                // torn snapshot
                backoff.spin();
                continue;
            }

            if next.is_null() {
                if tail_ref
                    .next
                    .compare_exchange(
                        Shared::null(),
                        node,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    )
                    .is_ok()
                {
                    // best effort: a failed swing is repaired by the next thread through
                    let _ = self.try_advance_tail(tail, node, guard);
                    return;
                }
            } else {
                self.try_advance_tail(tail, next, guard);
            }

            backoff.spin();
        }
    }

    /// Remove and return the value at the head, or `None` if the queue is empty.
    ///
    /// # Examples
    /// ```
    /// use yep_msq::YMLockFreeQueue;
    ///
    /// let queue = YMLockFreeQueue::new();
    /// assert_eq!(queue.dequeue(), None);
    /// queue.enqueue("x");
    /// assert_eq!(queue.dequeue(), Some("x"));
    /// assert_eq!(queue.dequeue(), None);
    /// ```
    pub fn dequeue(&self) -> Option<T> {
        let guard = &reclaim::pin();
        self.dequeue_with(guard)
    }

    /// Whether the queue was observed empty.
    pub fn is_empty(&self) -> bool {
        let guard = &reclaim::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        unsafe { head.deref() }
            .next
            .load(Ordering::Acquire, guard)
            .is_null()
    }

    fn dequeue_with(&self, guard: &Guard) -> Option<T> {
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let tail = self.tail.load(Ordering::Acquire, guard);
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);

            if head != self.head.load(Ordering::Acquire, guard) {
                backoff.spin();
                continue;
            }

            let next_ref = match unsafe { next.as_ref() } {
                Some(node) => node,
                None => return None,
            };

            if head == tail {
                // an enqueuer linked `next` but has not swung the tail yet; moving the head
                // past the tail would leave the tail on a retired node
                self.try_advance_tail(tail, next, guard);
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                // winning the CAS makes `next` the sentinel and its payload ours
                let value = unsafe { next_ref.value.assume_init_read() };
                unsafe { reclaim::retire(guard, head) };
                return Some(value);
            }

            backoff.spin();
        }
    }

    /// Help a lagging tail: move it from `observed` to `next` if nobody else has yet.
    ///
    /// Returns whether this call performed the swing. Failure means another thread
    /// already advanced the tail, which is just as good.
    fn try_advance_tail<'g>(
        &self,
        observed: Shared<'g, Node<T>>,
        next: Shared<'g, Node<T>>,
        guard: &'g Guard,
    ) -> bool {
        self.tail
            .compare_exchange(observed, next, Ordering::Release, Ordering::Relaxed, guard)
            .is_ok()
    }

    /// Link `value` without swinging the tail, as an enqueuer stalled right after its
    /// link CAS would leave the queue.
    #[cfg(test)]
    fn link_without_swing(&self, value: T) {
        let guard = &reclaim::pin();
        let node = Owned::new(Node::with_value(value)).into_shared(guard);
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);
            if !next.is_null() {
                self.try_advance_tail(tail, next, guard);
                continue;
            }
            if tail_ref
                .next
                .compare_exchange(
                    Shared::null(),
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                )
                .is_ok()
            {
                return;
            }
        }
    }

    #[cfg(test)]
    fn tail_lags(&self) -> bool {
        let guard = &reclaim::pin();
        let tail = self.tail.load(Ordering::Acquire, guard);
        !unsafe { tail.deref() }
            .next
            .load(Ordering::Acquire, guard)
            .is_null()
    }
}

impl<T> Default for YMLockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for YMLockFreeQueue<T> {
    fn drop(&mut self) {
        unsafe {
            // `&mut self`: no other thread holds a snapshot, destructors run immediately
            let guard = epoch::unprotected();

            while self.dequeue_with(guard).is_some() {}

            let sentinel = self.head.load(Ordering::Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}
