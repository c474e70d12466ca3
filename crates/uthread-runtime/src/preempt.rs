//! Timer-driven preemption
//!
//! A periodic `SIGVTALRM` (from `ITIMER_VIRTUAL`, so only consumed CPU time
//! counts) forces the running logical thread to yield. The scheduler masks
//! the signal around every queue mutation and context switch; that mask is
//! the only mutual exclusion the runtime needs on a single OS thread.
//!
//! ```text
//!            start(true)              disable()
//!  Stopped ─────────────► Unmasked ◄───────────► Masked
//!     ▲                      │        enable()      │
//!     └──────── stop() ──────┴──────────────────────┘
//! ```
//!
//! Masking is per OS thread (`pthread_sigmask`), which equals the process
//! mask for a single-threaded program. `enable`/`disable` do not nest.

use std::cell::{Cell, RefCell};

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use uthread_core::error::{SchedError, SchedResult};
use uthread_core::kdebug;

use crate::tls;

/// Preemption controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptState {
    /// No handler installed, timer not armed
    Stopped,
    /// Timer armed, signal deliverable
    Unmasked,
    /// Timer armed, signal held pending
    Masked,
}

/// Process state replaced by `start`, put back by `stop`
struct Saved {
    action: SigAction,
    mask: SigSet,
    timer: libc::itimerval,
}

/// Per-runtime preemption controller
pub struct Preemption {
    state: Cell<PreemptState>,
    saved: RefCell<Option<Saved>>,
}

impl Preemption {
    pub const fn new() -> Self {
        Self {
            state: Cell::new(PreemptState::Stopped),
            saved: RefCell::new(None),
        }
    }

    #[inline]
    pub fn state(&self) -> PreemptState {
        self.state.get()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.get() != PreemptState::Stopped
    }

    /// Install the handler and arm the timer to tick every `period_us`
    ///
    /// No-op when `enabled` is false or the controller is already running.
    /// Leaves the signal unmasked. On failure everything already changed is
    /// put back.
    pub fn start(&self, enabled: bool, period_us: u64) -> SchedResult<()> {
        if !enabled || self.is_running() {
            return Ok(());
        }

        let mask = SigSet::thread_get_mask().map_err(platform)?;

        // Hold ticks until the handler is in place
        timer_signal().thread_block().map_err(platform)?;

        let handler = SigAction::new(
            SigHandler::Handler(handle_timer),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        let action = match unsafe { sigaction(Signal::SIGVTALRM, &handler) } {
            Ok(old) => old,
            Err(e) => {
                let _ = mask.thread_set_mask();
                return Err(platform(e));
            }
        };

        let timer = match arm_timer(period_us) {
            Ok(old) => old,
            Err(e) => {
                unsafe {
                    let _ = sigaction(Signal::SIGVTALRM, &action);
                }
                let _ = mask.thread_set_mask();
                return Err(e);
            }
        };

        *self.saved.borrow_mut() = Some(Saved { action, mask, timer });
        self.state.set(PreemptState::Unmasked);
        timer_signal().thread_unblock().map_err(platform)?;

        kdebug!("preemption started, period {} us", period_us);
        Ok(())
    }

    /// Disarm the timer and restore the prior handler, mask and timer
    ///
    /// Every restore step is attempted; the first failure is reported.
    pub fn stop(&self) -> SchedResult<()> {
        if !self.is_running() {
            return Ok(());
        }

        let _ = timer_signal().thread_block();
        self.state.set(PreemptState::Stopped);

        let Some(saved) = self.saved.borrow_mut().take() else {
            return Ok(());
        };

        let mut result = Ok(());
        if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &saved.timer, std::ptr::null_mut()) } != 0 {
            result = Err(platform(Errno::last()));
        }

        // Discard a tick that may still be pending before the old
        // disposition (possibly the default terminate action) comes back.
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        unsafe {
            if let Err(e) = sigaction(Signal::SIGVTALRM, &ignore) {
                result = result.and(Err(platform(e)));
            }
            if let Err(e) = sigaction(Signal::SIGVTALRM, &saved.action) {
                result = result.and(Err(platform(e)));
            }
        }

        if let Err(e) = saved.mask.thread_set_mask() {
            result = result.and(Err(platform(e)));
        }

        kdebug!("preemption stopped");
        result
    }

    /// Let timer ticks through again
    #[inline]
    pub fn enable(&self) {
        if self.state.get() == PreemptState::Stopped {
            return;
        }
        self.state.set(PreemptState::Unmasked);
        let _ = timer_signal().thread_unblock();
    }

    /// Hold timer ticks pending
    ///
    /// Returns true if this call did the masking, i.e. the caller should
    /// `enable` again when done. Stopped or already masked returns false.
    #[inline]
    pub fn disable(&self) -> bool {
        if self.state.get() != PreemptState::Unmasked {
            return false;
        }
        let _ = timer_signal().thread_block();
        self.state.set(PreemptState::Masked);
        true
    }

    /// Undo a `disable` that returned `masked`
    #[inline]
    pub fn restore(&self, masked: bool) {
        if masked {
            self.enable();
        }
    }

    /// Record the mask state the kernel set up for a signal handler
    #[inline]
    pub(crate) fn enter_handler(&self) -> bool {
        if self.state.get() != PreemptState::Unmasked {
            return false;
        }
        self.state.set(PreemptState::Masked);
        true
    }

    /// Sigreturn restores the interrupted mask; mirror it
    #[inline]
    pub(crate) fn leave_handler(&self) {
        self.state.set(PreemptState::Unmasked);
    }
}

impl Default for Preemption {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Preemption {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[inline]
fn timer_signal() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGVTALRM);
    set
}

#[inline]
fn platform(e: Errno) -> SchedError {
    SchedError::PlatformError(e as i32)
}

/// Arm `ITIMER_VIRTUAL`, returning the previous setting
fn arm_timer(period_us: u64) -> SchedResult<libc::itimerval> {
    let period_us = period_us.max(1);
    let period = libc::timeval {
        tv_sec: (period_us / 1_000_000) as _,
        tv_usec: (period_us % 1_000_000) as _,
    };
    let new = libc::itimerval {
        it_interval: period,
        it_value: period,
    };
    let mut old: libc::itimerval = unsafe { std::mem::zeroed() };

    if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &new, &mut old) } != 0 {
        return Err(platform(Errno::last()));
    }
    Ok(old)
}

/// SIGVTALRM handler
///
/// Runs at an arbitrary instruction boundary of unmasked code: no logging,
/// no allocation, no locks. errno belongs to the OS thread, so it is saved
/// across the switch to other logical threads.
extern "C" fn handle_timer(signum: libc::c_int) {
    if signum != libc::SIGVTALRM {
        return;
    }
    let Some(sched) = tls::scheduler() else {
        return;
    };

    let errno = Errno::last_raw();
    sched.preempt_tick();
    Errno::set_raw(errno);
}

// ============================================================================
// User critical sections
// ============================================================================

/// Mask preemption for the calling logical thread
///
/// Does not nest: one `preempt_enable` undoes any number of disables.
/// No-op outside a runtime or when preemption is off.
pub fn preempt_disable() {
    if let Some(sched) = tls::scheduler() {
        sched.preemption().disable();
    }
}

/// Unmask preemption for the calling logical thread
pub fn preempt_enable() {
    if let Some(sched) = tls::scheduler() {
        sched.preemption().enable();
    }
}

/// Run `f` with preemption masked, restoring the previous state afterwards
pub fn without_preemption<R>(f: impl FnOnce() -> R) -> R {
    let Some(sched) = tls::scheduler() else {
        return f();
    };
    let masked = sched.preemption().disable();
    let result = f();
    sched.preemption().restore(masked);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_start_is_noop() {
        let p = Preemption::new();
        p.start(false, 10_000).unwrap();
        assert_eq!(p.state(), PreemptState::Stopped);
        assert!(!p.disable());
        p.enable();
        assert_eq!(p.state(), PreemptState::Stopped);
        p.stop().unwrap();
    }

    fn current_handler() -> libc::sighandler_t {
        let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::sigaction(libc::SIGVTALRM, std::ptr::null(), &mut old) };
        assert_eq!(rc, 0);
        old.sa_sigaction
    }

    fn current_interval() -> (i64, i64) {
        let mut t: libc::itimerval = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::getitimer(libc::ITIMER_VIRTUAL, &mut t) };
        assert_eq!(rc, 0);
        (t.it_interval.tv_sec as i64, t.it_interval.tv_usec as i64)
    }

    #[test]
    fn test_start_mask_stop() {
        let before = SigSet::thread_get_mask().unwrap();
        let handler_before = current_handler();
        let interval_before = current_interval();

        let p = Preemption::new();
        p.start(true, 1000).unwrap();
        assert_eq!(p.state(), PreemptState::Unmasked);
        assert_eq!(current_handler(), handle_timer as libc::sighandler_t);
        assert_ne!(current_interval(), (0, 0));

        assert!(p.disable());
        assert_eq!(p.state(), PreemptState::Masked);
        assert!(SigSet::thread_get_mask().unwrap().contains(Signal::SIGVTALRM));
        // Already masked: no nesting
        assert!(!p.disable());

        p.enable();
        assert_eq!(p.state(), PreemptState::Unmasked);
        assert!(!SigSet::thread_get_mask().unwrap().contains(Signal::SIGVTALRM));

        p.stop().unwrap();
        assert_eq!(p.state(), PreemptState::Stopped);
        assert_eq!(
            SigSet::thread_get_mask().unwrap().contains(Signal::SIGVTALRM),
            before.contains(Signal::SIGVTALRM)
        );
        assert_eq!(current_handler(), handler_before);
        assert_eq!(current_interval(), interval_before);
    }

    #[test]
    fn test_user_helpers_outside_runtime() {
        preempt_disable();
        preempt_enable();
        assert_eq!(without_preemption(|| 7), 7);
    }
}
