//! Thread control block
//!
//! One per logical thread. A `Box<Tcb>` lives in exactly one place at a
//! time: the scheduler's Running slot or one of its Ready, Blocked and
//! Zombie queues. Moving the box is the state transition; the heap address
//! (and with it the saved registers) never moves.

use std::fmt;

use uthread_core::error::{SchedError, SchedResult};
use uthread_core::{ThreadId, ThreadState};

use crate::arch::{self, EntryFn, SavedRegs};
use crate::memory::Stack;

/// Boxed thread body
///
/// Stored as `FnMut` around a one-shot `Option` so that calling it does not
/// free the box; the allocation is released with the TCB, on the run loop's
/// stack, with preemption masked.
pub(crate) type ThreadBody = Box<dyn FnMut()>;

pub struct Tcb {
    id: ThreadId,
    state: ThreadState,
    regs: SavedRegs,
    stack: Option<Stack>,
    body: Option<ThreadBody>,
}

impl Tcb {
    /// TCB for the caller of `run`
    ///
    /// Runs on the OS thread's own stack; its registers are filled by the
    /// first switch away from it.
    pub(crate) fn control() -> Box<Tcb> {
        Box::new(Tcb {
            id: ThreadId::CONTROL,
            state: ThreadState::Running,
            regs: SavedRegs::default(),
            stack: None,
            body: None,
        })
    }

    /// Fresh Ready thread that starts in `entry(id)` on its own stack
    ///
    /// Takes ownership of `stack`; if initialization fails the stack is
    /// released with the half-built TCB.
    pub(crate) fn new<F>(id: ThreadId, stack: Stack, entry: EntryFn, f: F) -> SchedResult<Box<Tcb>>
    where
        F: FnOnce() + 'static,
    {
        let top = stack.top();
        if top.is_null() || stack.size() == 0 {
            return Err(SchedError::ContextInit);
        }

        let mut f = Some(f);
        let body: ThreadBody = Box::new(move || {
            if let Some(f) = f.take() {
                f();
            }
        });

        let mut tcb = Box::new(Tcb {
            id,
            state: ThreadState::Ready,
            regs: SavedRegs::default(),
            stack: Some(stack),
            body: Some(body),
        });

        unsafe { arch::init_context(&mut tcb.regs, top, entry, id.as_u32() as usize) };
        if tcb.regs.stack_pointer() == 0 {
            return Err(SchedError::ContextInit);
        }
        Ok(tcb)
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Move to `next`, checking the lifecycle table in debug builds
    #[inline]
    pub(crate) fn set_state(&mut self, next: ThreadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "thread {}: illegal transition {} -> {}",
            self.id,
            self.state,
            next
        );
        self.state = next;
    }

    #[inline]
    pub(crate) fn regs_ptr(&mut self) -> *mut SavedRegs {
        &mut self.regs
    }

    /// Raw pointer to the thread body, valid while the TCB is alive
    #[inline]
    pub(crate) fn body_ptr(&mut self) -> Option<*mut (dyn FnMut() + 'static)> {
        self.body.as_mut().map(|b| &mut **b as *mut (dyn FnMut() + 'static))
    }

    #[inline]
    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }
}

impl fmt::Debug for Tcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tcb")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("stack", &self.stack)
            .finish()
    }
}
