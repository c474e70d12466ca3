//! FIFO round-robin scheduler
//!
//! One scheduler per `run` call, owned by the OS thread that called it.
//! It holds the Ready, Blocked and Zombie queues plus the single Running
//! slot. Every mutation of that state and every context switch happens
//! with preemption masked; the timer handler re-enters only through
//! `preempt_tick`, which can therefore never observe a half-updated queue.
//!
//! ```text
//!            create            reschedule
//!   ───────► Ready ─────────────────────────► Running
//!              ▲  ◄──── yield / preempt ────    │  │
//!              │                                │  │ exit
//!              └──── unblock ── Blocked ◄─block─┘  ▼
//!                                                Zombie ──► reclaimed by run loop
//! ```
//!
//! The caller of `run` becomes the control thread (id 0). It takes part in
//! the rotation like any other thread and, each time it gets the CPU,
//! reclaims zombies and checks whether anything is left to run.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Once;

use uthread_core::error::{SchedError, SchedResult};
use uthread_core::kprint::{self, LogLevel};
use uthread_core::{kdebug, kerror, kwarn};
use uthread_core::{Queue, ThreadId, ThreadState};

use crate::arch;
use crate::config::RuntimeConfig;
use crate::memory::Stack;
use crate::preempt::{without_preemption, Preemption};
use crate::tcb::Tcb;
use crate::tls;

/// Queues and Running slot; only touched with preemption masked
struct SchedState {
    ready: Queue<Box<Tcb>>,
    blocked: Queue<Box<Tcb>>,
    zombie: Queue<Box<Tcb>>,
    running: Option<Box<Tcb>>,
    next_id: u32,
    /// TCBs not yet reclaimed (control thread included)
    live: usize,
}

impl SchedState {
    fn new() -> Self {
        Self {
            ready: Queue::new(),
            blocked: Queue::new(),
            zombie: Queue::new(),
            running: None,
            next_id: ThreadId::CONTROL.as_u32() + 1,
            live: 0,
        }
    }

    /// Keep enough spare queue nodes that no reschedule allocates
    fn reserve_all(&mut self) {
        let live = self.live;
        self.ready.reserve(live);
        self.blocked.reserve(live);
        self.zombie.reserve(live);
    }

    fn contains(&self, id: ThreadId) -> bool {
        let matches = |t: &Box<Tcb>| t.id() == id;
        self.running.as_ref().map_or(false, matches)
            || self.ready.iter().any(matches)
            || self.blocked.iter().any(matches)
            || self.zombie.iter().any(matches)
    }

    fn reap_zombies(&mut self) {
        while let Some(tcb) = self.zombie.dequeue() {
            self.live -= 1;
            kdebug!("reclaimed thread {}", tcb.id());
            drop(tcb);
        }
    }
}

/// Snapshot of scheduler occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedStats {
    pub ready: usize,
    pub blocked: usize,
    pub zombie: usize,
    pub live: usize,
}

pub struct Scheduler {
    config: RuntimeConfig,
    preempt: Preemption,
    state: RefCell<SchedState>,
    /// Identity of the Running TCB, readable without masking
    current: Cell<ThreadId>,
}

impl Scheduler {
    /// Scheduler whose control thread is the caller
    pub(crate) fn new(config: RuntimeConfig) -> Self {
        let mut state = SchedState::new();
        state.running = Some(Tcb::control());
        state.live = 1;
        state.reserve_all();

        Self {
            config,
            preempt: Preemption::new(),
            state: RefCell::new(state),
            current: Cell::new(ThreadId::CONTROL),
        }
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn preemption(&self) -> &Preemption {
        &self.preempt
    }

    /// Identity of the running thread
    #[inline]
    pub fn current(&self) -> ThreadId {
        self.current.get()
    }

    pub fn stats(&self) -> SchedStats {
        self.with_state(|st| SchedStats {
            ready: st.ready.len(),
            blocked: st.blocked.len(),
            zombie: st.zombie.len(),
            live: st.live,
        })
    }

    /// Run `f` on the scheduler state with preemption masked
    fn with_state<R>(&self, f: impl FnOnce(&mut SchedState) -> R) -> R {
        let masked = self.preempt.disable();
        let result = f(&mut self.state.borrow_mut());
        self.preempt.restore(masked);
        result
    }

    /// Create a Ready thread that will run `f`
    ///
    /// On failure nothing is left behind: the identity is not consumed and
    /// the stack, if it was mapped, is released.
    pub fn create<F>(&self, f: F) -> SchedResult<ThreadId>
    where
        F: FnOnce() + 'static,
    {
        self.with_state(|st| {
            let id = ThreadId::new(st.next_id);
            if id.as_u32() as usize > self.config.max_threads {
                kwarn!("create: thread limit {} reached", self.config.max_threads);
                return Err(SchedError::ThreadLimit);
            }

            let stack = Stack::allocate(self.config.stack_size).map_err(|e| {
                kwarn!("create: {}", e);
                e
            })?;
            let tcb = Tcb::new(id, stack, thread_entry, f)?;

            st.next_id += 1;
            st.live += 1;
            st.reserve_all();
            st.ready.enqueue(tcb);

            kdebug!("created thread {}", id);
            Ok(id)
        })
    }

    /// Give up the CPU; the caller goes to the tail of Ready
    pub fn yield_now(&self) {
        let masked = self.preempt.disable();
        self.reschedule(ThreadState::Ready);
        self.preempt.restore(masked);
    }

    /// Suspend the caller until some thread unblocks it
    pub fn block(&self) {
        let masked = self.preempt.disable();
        self.reschedule(ThreadState::Blocked);
        self.preempt.restore(masked);
    }

    /// Make a Blocked thread Ready again
    ///
    /// Does not switch to it; it runs when its turn in Ready comes.
    pub fn unblock(&self, id: ThreadId) -> SchedResult<()> {
        let masked = self.preempt.disable();
        let result = self.unblock_locked(id);
        self.preempt.restore(masked);
        result
    }

    /// `unblock` for callers that already masked preemption
    pub(crate) fn unblock_locked(&self, id: ThreadId) -> SchedResult<()> {
        let mut st = self.state.borrow_mut();
        match st.blocked.delete_by(|t| t.id() == id) {
            Some(mut tcb) => {
                tcb.set_state(ThreadState::Ready);
                st.ready.enqueue(tcb);
                Ok(())
            }
            None if st.contains(id) => Err(SchedError::NotBlocked(id)),
            None => Err(SchedError::ThreadNotFound(id)),
        }
    }

    /// Terminate the calling thread
    ///
    /// Its stack stays mapped until the control thread reclaims it.
    pub fn exit(&self) -> ! {
        debug_assert!(!self.current().is_control(), "control thread cannot exit");
        self.preempt.disable();
        self.reschedule(ThreadState::Zombie);
        fatal("zombie thread resumed");
    }

    /// Park the running thread as `next` and switch to the head of Ready
    ///
    /// Must be called with preemption masked; returns (still masked) when
    /// the caller is scheduled again. Switching to itself is skipped.
    pub(crate) fn reschedule(&self, next: ThreadState) {
        let (from, to) = {
            let mut st = self.state.borrow_mut();

            let Some(mut prev) = st.running.take() else {
                fatal("no running thread");
            };
            prev.set_state(next);
            let from = prev.regs_ptr();
            let prev_addr: *const Tcb = &*prev;

            match next {
                ThreadState::Ready => st.ready.enqueue(prev),
                ThreadState::Blocked => st.blocked.enqueue(prev),
                ThreadState::Zombie => st.zombie.enqueue(prev),
                ThreadState::Running => fatal("reschedule into Running"),
            }

            let Some(mut head) = st.ready.dequeue() else {
                fatal("ready queue empty");
            };
            head.set_state(ThreadState::Running);
            let to = head.regs_ptr();
            let same = ptr::eq(prev_addr, &*head);

            self.current.set(head.id());
            kprint::set_thread_id(head.id().as_u32());
            st.running = Some(head);

            if same {
                return;
            }
            (from, to)
        };

        unsafe { arch::context_switch(from, to) };
    }

    /// Timer tick delivered to this OS thread
    ///
    /// Called from the signal handler only. The kernel has already masked
    /// the signal; sigreturn unmasks it again.
    pub(crate) fn preempt_tick(&self) {
        if !self.preempt.enter_handler() {
            return;
        }
        let free = self.state.try_borrow_mut().is_ok();
        if free {
            self.reschedule(ThreadState::Ready);
        }
        self.preempt.leave_handler();
    }

    /// Body of the running thread (called by the entry shim)
    fn running_body(&self) -> Option<*mut (dyn FnMut() + 'static)> {
        self.state
            .borrow_mut()
            .running
            .as_mut()
            .and_then(|tcb| tcb.body_ptr())
    }

    /// Control-thread loop: reclaim zombies, stop when nothing is Ready
    fn run_loop(&self) {
        loop {
            let masked = self.preempt.disable();
            let idle = {
                let mut st = self.state.borrow_mut();
                st.reap_zombies();
                st.ready.is_empty()
            };
            if idle {
                self.preempt.restore(masked);
                break;
            }
            self.reschedule(ThreadState::Ready);
            self.preempt.restore(masked);
        }
    }

    /// Reclaim what is left after the run loop ends
    ///
    /// Threads still Blocked can never be woken and are dropped.
    fn teardown(&self) -> SchedResult<()> {
        let mut guard = self.state.borrow_mut();
        let st = &mut *guard;
        st.reap_zombies();

        let blocked = st.blocked.len();
        while let Some(tcb) = st.blocked.dequeue() {
            kwarn!("thread {} still blocked at shutdown", tcb.id());
            st.live -= 1;
        }

        if let Some(control) = st.running.take() {
            debug_assert!(control.id().is_control());
            st.live -= 1;
        }
        debug_assert_eq!(st.live, 0);

        for queue in [&mut st.ready, &mut st.blocked, &mut st.zombie] {
            if let Err(e) = std::mem::take(queue).destroy() {
                kwarn!("teardown: {}", e);
            }
        }

        if blocked > 0 {
            return Err(SchedError::Deadlock { blocked });
        }
        Ok(())
    }

    fn run_inner<F>(&self, preempt: bool, f: F) -> SchedResult<()>
    where
        F: FnOnce() + 'static,
    {
        self.preempt.start(preempt, self.config.preempt_period_us())?;

        if let Err(e) = self.create(f) {
            let _ = self.preempt.stop();
            self.teardown()?;
            return Err(e);
        }

        self.run_loop();

        let stopped = self.preempt.stop();
        self.teardown()?;
        stopped
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("current", &self.current.get())
            .field("preempt", &self.preempt.state())
            .finish()
    }
}

/// First code run on a new thread's stack
///
/// Arrives with preemption masked, like any thread resuming inside
/// `reschedule`. Panics stop here; unwinding never reaches the trampoline.
extern "C" fn thread_entry(id: usize) -> ! {
    let Some(sched) = tls::scheduler() else {
        fatal("thread started without a runtime");
    };

    let body = sched.running_body();
    sched.preempt.enable();

    if let Some(body) = body {
        let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { (*body)() }));
        if let Err(payload) = result {
            sched.preempt.disable();
            kerror!("thread {} panicked", id);
            drop(payload);
        }
    }

    sched.exit()
}

/// Mask preemption while the panic hook writes to stderr
///
/// Installed once per process, wrapping whatever hook was set before.
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| without_preemption(|| prev(info))));
    });
}

/// Broken scheduler invariant: continuing would switch into garbage
#[cold]
fn fatal(msg: &str) -> ! {
    kerror!("fatal: {}", msg);
    std::process::abort()
}

// ============================================================================
// Public API (free functions on the calling OS thread's runtime)
// ============================================================================

/// Run a runtime on this OS thread until every logical thread has exited
///
/// `f` becomes the first thread. Uses `RuntimeConfig::from_env()`.
///
/// # Errors
///
/// Besides setup failures (invalid config, first stack allocation, signal
/// or timer setup), returns `Deadlock { blocked }` when the Ready queue
/// drains while threads are still Blocked. Those threads can never be
/// woken; their stacks are released before returning.
pub fn run<F>(preempt: bool, f: F) -> SchedResult<()>
where
    F: FnOnce() + 'static,
{
    run_with_config(RuntimeConfig::from_env(), preempt, f)
}

/// `run` with an explicit configuration
pub fn run_with_config<F>(config: RuntimeConfig, preempt: bool, f: F) -> SchedResult<()>
where
    F: FnOnce() + 'static,
{
    if tls::in_runtime() {
        return Err(SchedError::AlreadyInitialized);
    }
    config.validate()?;
    install_panic_hook();

    let saved_level = config.debug_logging.then(|| {
        let level = kprint::log_level();
        kprint::set_log_level(LogLevel::Debug);
        level
    });

    kdebug!(
        "runtime starting (preempt={}, max_threads={}, stack_size={})",
        preempt,
        config.max_threads,
        config.stack_size
    );

    let sched = Box::new(Scheduler::new(config));
    tls::set_scheduler(&*sched);
    kprint::set_thread_id(ThreadId::CONTROL.as_u32());

    let result = sched.run_inner(preempt, f);

    tls::clear_scheduler();
    kprint::clear_thread_id();
    drop(sched);

    kdebug!("runtime stopped: {:?}", result);
    if let Some(level) = saved_level {
        kprint::set_log_level(level);
    }
    result
}

/// Create a thread in the calling OS thread's runtime
pub fn create<F>(f: F) -> SchedResult<ThreadId>
where
    F: FnOnce() + 'static,
{
    tls::scheduler().ok_or(SchedError::NotInitialized)?.create(f)
}

/// Yield to the next Ready thread (or the OS scheduler outside a runtime)
pub fn yield_now() {
    match tls::scheduler() {
        Some(sched) => sched.yield_now(),
        None => std::thread::yield_now(),
    }
}

/// Block the calling thread until `unblock` is called on it
pub fn block() {
    match tls::scheduler() {
        Some(sched) => sched.block(),
        None => kwarn!("block() outside a runtime ignored"),
    }
}

/// Make a Blocked thread Ready
pub fn unblock(id: ThreadId) -> SchedResult<()> {
    tls::scheduler().ok_or(SchedError::NotInitialized)?.unblock(id)
}

/// Identity of the calling thread, `ThreadId::NONE` outside a runtime
pub fn current() -> ThreadId {
    tls::scheduler().map_or(ThreadId::NONE, |sched| sched.current())
}

/// Occupancy of the calling OS thread's runtime, `None` outside one
pub fn stats() -> Option<SchedStats> {
    tls::scheduler().map(|sched| sched.stats())
}

/// Terminate the calling thread
pub fn exit() -> ! {
    match tls::scheduler() {
        Some(sched) => sched.exit(),
        None => fatal("exit() outside a runtime"),
    }
}
