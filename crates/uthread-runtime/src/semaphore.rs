//! Counting semaphore for logical threads
//!
//! Waiters queue up in FIFO order and block through the scheduler. `up`
//! wakes the oldest waiter but does not hand the unit over: the waiter
//! re-checks the count when it runs, and if another thread got there first
//! it waits again at the head of the line.
//!
//! A semaphore is shared between threads of one runtime, typically through
//! an `Rc`.

use std::cell::{Cell, RefCell};
use std::fmt;

use uthread_core::error::{SchedError, SchedResult};
use uthread_core::{kdebug, kwarn};
use uthread_core::{Queue, ThreadId, ThreadState};

use crate::scheduler::Scheduler;
use crate::tls;

pub struct Semaphore {
    count: Cell<usize>,
    /// Threads blocked in `down`, oldest first
    waiters: RefCell<Queue<ThreadId>>,
}

impl Semaphore {
    pub const fn new(initial: usize) -> Self {
        Self {
            count: Cell::new(initial),
            waiters: RefCell::new(Queue::new()),
        }
    }

    /// Take one unit, blocking while none is available
    ///
    /// Returns `NotInitialized` only if the call would have to block
    /// outside a runtime.
    pub fn down(&self) -> SchedResult<()> {
        let Some(sched) = tls::scheduler() else {
            return if self.try_take() {
                Ok(())
            } else {
                Err(SchedError::NotInitialized)
            };
        };

        let masked = sched.preemption().disable();
        if self.count.get() == 0 {
            self.wait(sched);
        }
        self.count.set(self.count.get() - 1);
        sched.preemption().restore(masked);
        Ok(())
    }

    /// Block until `count > 0`; preemption is masked throughout
    fn wait(&self, sched: &Scheduler) {
        let me = sched.current();
        self.waiters.borrow_mut().enqueue(me);

        loop {
            sched.reschedule(ThreadState::Blocked);
            if self.count.get() > 0 {
                break;
            }
            // Woken, but the unit went to a thread that never waited.
            // `up` already dequeued us from the head; go back there.
            let queued = self.waiters.borrow().iter().any(|w| *w == me);
            if !queued {
                self.waiters.borrow_mut().push_front(me);
            }
        }

        // Unblocked by someone other than `up`
        self.waiters.borrow_mut().delete_by(|w| *w == me);
    }

    /// Take one unit if available, never blocking
    pub fn try_down(&self) -> bool {
        match tls::scheduler() {
            Some(sched) => {
                let masked = sched.preemption().disable();
                let taken = self.try_take();
                sched.preemption().restore(masked);
                taken
            }
            None => self.try_take(),
        }
    }

    fn try_take(&self) -> bool {
        let count = self.count.get();
        if count == 0 {
            return false;
        }
        self.count.set(count - 1);
        true
    }

    /// Release one unit and make the oldest waiter Ready
    pub fn up(&self) {
        let Some(sched) = tls::scheduler() else {
            self.count.set(self.count.get() + 1);
            return;
        };

        let masked = sched.preemption().disable();
        self.count.set(self.count.get() + 1);
        let next = self.waiters.borrow_mut().dequeue();
        if let Some(id) = next {
            if let Err(e) = sched.unblock_locked(id) {
                kdebug!("semaphore up: waiter {}: {}", id, e);
            }
        }
        sched.preemption().restore(masked);
    }

    /// Units currently available
    #[inline]
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Threads blocked in `down`
    pub fn waiters(&self) -> usize {
        self.waiters.borrow().len()
    }

    /// Dispose of the semaphore
    ///
    /// Fails, handing the semaphore back, while threads are waiting on it.
    pub fn destroy(self) -> Result<(), SemaphoreBusy> {
        if self.waiters() != 0 {
            return Err(SemaphoreBusy(self));
        }
        Ok(())
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        let waiting = self.waiters.get_mut().len();
        if waiting != 0 {
            kwarn!("semaphore dropped with {} waiter(s)", waiting);
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("count", &self.count.get())
            .field("waiters", &self.waiters.try_borrow().map(|w| w.len()).ok())
            .finish()
    }
}

/// `destroy` refused: threads are still waiting
pub struct SemaphoreBusy(pub Semaphore);

impl fmt::Debug for SemaphoreBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SemaphoreBusy").field(&self.0.waiters()).finish()
    }
}

impl fmt::Display for SemaphoreBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "semaphore busy ({} waiter(s))", self.0.waiters())
    }
}

impl std::error::Error for SemaphoreBusy {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::scheduler::{create, current, run_with_config, yield_now};
    use std::rc::Rc;

    fn small() -> RuntimeConfig {
        RuntimeConfig::new().stack_size(64 * 1024)
    }

    #[test]
    fn test_outside_runtime() {
        let sem = Semaphore::new(1);
        assert!(sem.down().is_ok());
        assert_eq!(sem.down(), Err(SchedError::NotInitialized));
        assert!(!sem.try_down());
        sem.up();
        assert_eq!(sem.count(), 1);
        assert!(sem.try_down());
        assert!(sem.destroy().is_ok());
    }

    #[test]
    fn test_down_blocks_until_up() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sem = Rc::new(Semaphore::new(0));
        let (l, s) = (log.clone(), sem.clone());

        run_with_config(small(), false, move || {
            let (l2, s2) = (l.clone(), s.clone());
            create(move || {
                l2.borrow_mut().push("waiting");
                s2.down().unwrap();
                l2.borrow_mut().push("acquired");
            })
            .unwrap();

            yield_now();
            l.borrow_mut().push(if s.waiters() == 1 { "release" } else { "no waiter" });
            s.up();
        })
        .unwrap();

        assert_eq!(*log.borrow(), vec!["waiting", "release", "acquired"]);
        assert_eq!(sem.count(), 0);
        assert_eq!(sem.waiters(), 0);
    }

    #[test]
    fn test_barging_waiter_requeues() {
        // W waits, up() wakes W, then this thread takes the unit first
        let sem = Rc::new(Semaphore::new(0));
        let order = Rc::new(RefCell::new(Vec::new()));
        let (s, o) = (sem.clone(), order.clone());

        run_with_config(small(), false, move || {
            let (sw, ow) = (s.clone(), o.clone());
            create(move || {
                sw.down().unwrap();
                ow.borrow_mut().push(current().as_u32());
            })
            .unwrap();
            yield_now(); // W blocks

            s.up(); // W Ready, count 1
            if s.try_down() {
                o.borrow_mut().push(current().as_u32());
            }

            yield_now(); // W runs, finds 0, waits again
            o.borrow_mut().push(s.waiters() as u32 + 100);
            s.up();
        })
        .unwrap();

        assert_eq!(*order.borrow(), vec![1, 101, 2]);
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn test_barged_waiter_keeps_its_place() {
        // A and B wait in that order; A loses a unit to this thread and
        // must still be served before B.
        let sem = Rc::new(Semaphore::new(0));
        let order = Rc::new(RefCell::new(Vec::new()));
        let (s, o) = (sem.clone(), order.clone());

        run_with_config(small(), false, move || {
            for _ in 0..2 {
                let (sw, ow) = (s.clone(), o.clone());
                create(move || {
                    sw.down().unwrap();
                    ow.borrow_mut().push(current().as_u32());
                })
                .unwrap();
            }
            yield_now(); // A (2) then B (3) block

            s.up(); // A Ready, count 1
            if s.try_down() {
                o.borrow_mut().push(current().as_u32());
            }

            yield_now(); // A runs, finds 0, waits again
            o.borrow_mut().push(s.waiters() as u32 + 100);
            s.up();
            s.up();
        })
        .unwrap();

        assert_eq!(*order.borrow(), vec![1, 102, 2, 3]);
        assert_eq!(sem.count(), 0);
        assert_eq!(sem.waiters(), 0);
    }

    #[test]
    fn test_destroy_busy() {
        let sem = Semaphore::new(0);
        sem.waiters.borrow_mut().enqueue(ThreadId::new(9));

        let err = sem.destroy().unwrap_err();
        assert_eq!(err.to_string(), "semaphore busy (1 waiter(s))");

        // Still usable after the refusal
        let sem = err.0;
        sem.waiters.borrow_mut().dequeue();
        assert!(sem.destroy().is_ok());
    }

    #[test]
    fn test_deadlocked_waiter() {
        let sem = Rc::new(Semaphore::new(0));
        let s = sem.clone();
        let result = run_with_config(small(), false, move || {
            let _ = s.down();
        });
        assert_eq!(result, Err(SchedError::Deadlock { blocked: 1 }));
        assert_eq!(sem.waiters(), 1);
        sem.waiters.borrow_mut().dequeue();
    }
}
