//! Thread-local storage for the active scheduler
//!
//! Each OS thread hosts at most one runtime. `run` publishes its scheduler
//! here for the duration of the call; free functions and the preemption
//! signal handler find it through this slot.

use crate::scheduler::Scheduler;
use std::cell::Cell;

thread_local! {
    /// Scheduler owned by the `run` call on this OS thread
    static SCHEDULER: Cell<*const Scheduler> = const { Cell::new(std::ptr::null()) };
}

/// Publish the scheduler for this OS thread
#[inline]
pub(crate) fn set_scheduler(sched: *const Scheduler) {
    SCHEDULER.with(|cell| cell.set(sched));
}

/// Clear the slot (runtime shut down)
#[inline]
pub(crate) fn clear_scheduler() {
    SCHEDULER.with(|cell| cell.set(std::ptr::null()));
}

/// Active scheduler on this OS thread, if any
///
/// The reference stays valid until the enclosing `run` returns, which cannot
/// happen while any logical thread of that runtime is still executing.
/// Callers must not keep it past the current call. Safe to call from the
/// signal handler: the slot is const-initialized.
#[inline]
pub(crate) fn scheduler<'a>() -> Option<&'a Scheduler> {
    let ptr = SCHEDULER.with(|cell| cell.get());
    unsafe { ptr.as_ref() }
}

/// Check if a runtime is active on this OS thread
#[inline]
pub fn in_runtime() -> bool {
    SCHEDULER.with(|cell| !cell.get().is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        assert!(!in_runtime());
        assert!(scheduler().is_none());
    }
}
