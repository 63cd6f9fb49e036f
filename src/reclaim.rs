//! Deferred node reclamation for the lock-free queue.
//!
//! A node unlinked by a successful head CAS can still be referenced by any thread that
//! loaded it before the CAS. Freeing is therefore handed to `crossbeam_epoch`, which only
//! runs the destructor once every thread pinned at retirement time has unpinned. The same
//! rule keeps retired addresses out of circulation while stale snapshots exist, so a CAS
//! can never succeed against a recycled node (no ABA).

use crossbeam_epoch::{self as epoch, Guard, Shared};

/// Pin the current thread for the duration of one queue operation.
///
/// Every `Shared` pointer loaded under the returned guard stays dereferenceable until the
/// guard is dropped.
#[inline]
pub(crate) fn pin() -> Guard {
    epoch::pin()
}

/// Hand an unlinked node to the collector.
///
/// # Safety
/// `node` must be unreachable from the queue for any thread that pins after this call,
/// and must not be retired twice.
#[inline]
pub(crate) unsafe fn retire<T>(guard: &Guard, node: Shared<'_, T>) {
    unsafe { guard.defer_destroy(node) };
}
