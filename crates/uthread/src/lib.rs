//! # uthread - user-space green threads
//!
//! Many logical threads multiplexed onto the calling OS thread, scheduled
//! in strict FIFO round robin, with optional timer-driven preemption and
//! counting semaphores.
//!
//! ## Features
//!
//! - **Lightweight**: one mmap'd stack per thread with a guard page
//! - **Fast Context Switch**: callee-saved registers only, hand-written assembly
//! - **Preemption**: optional `SIGVTALRM` timer forcing CPU-bound threads to yield
//! - **Synchronization**: counting semaphores with FIFO waiters
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use uthread::{create, run, yield_now, Semaphore};
//!
//! fn main() {
//!     run(false, || {
//!         let sem = Rc::new(Semaphore::new(0));
//!
//!         let s = sem.clone();
//!         create(move || {
//!             s.down().unwrap();
//!             println!("consumer: got it");
//!         })
//!         .unwrap();
//!
//!         yield_now();
//!         println!("producer: releasing");
//!         sem.up();
//!     })
//!     .unwrap();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │      create(), yield_now(), block(), Semaphore::down()      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler                              │
//! │   Ready / Blocked / Zombie queues, Running slot, run loop   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌────────────┐
//!    │   Stacks  │      │  Context  │      │ Preemption │
//!    │ mmap+guard│      │  switch   │      │ SIGVTALRM  │
//!    └───────────┘      └───────────┘      └────────────┘
//! ```
//!
//! ## Preemption caveats
//!
//! With preemption on, a thread can be interrupted anywhere outside the
//! runtime's own masked sections, including inside the allocator or while
//! holding the stdout lock. Wrap such calls in [`without_preemption`] when
//! other threads may make them too.

// Re-export core types
pub use uthread_core::{Queue, SchedError, SchedResult, ThreadId, ThreadState};
pub use uthread_core::error::MemoryError;
pub use uthread_core::queue::DestroyError;

// Re-export kprint macros for debug logging
pub use uthread_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};
pub use uthread_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};

// Re-export env utilities
pub use uthread_core::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

// Re-export runtime API
pub use uthread_runtime::{
    block, create, current, exit, run, run_with_config, stats, unblock, yield_now,
    preempt_disable, preempt_enable, without_preemption,
    ConfigError, RuntimeConfig, SchedStats, Semaphore, SemaphoreBusy,
};

/// Runtime handle: a configuration plus the preemption switch
///
/// ```ignore
/// use uthread::{Runtime, RuntimeConfig};
///
/// Runtime::new(RuntimeConfig::new().preempt_hz(250))
///     .preempt(true)
///     .block_on(|| { /* first thread */ })
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    preempt: bool,
}

impl Runtime {
    /// Runtime with `config`, preemption off
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config, preempt: false }
    }

    /// Turn timer preemption on or off
    pub fn preempt(mut self, enabled: bool) -> Self {
        self.preempt = enabled;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `f` as the first thread until every thread has exited
    pub fn block_on<F>(&self, f: F) -> SchedResult<()>
    where
        F: FnOnce() + 'static,
    {
        run_with_config(self.config.clone(), self.preempt, f)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::from_env())
    }
}

/// Check if the calling code runs inside a runtime
#[inline]
pub fn in_runtime() -> bool {
    uthread_runtime::tls::in_runtime()
}
