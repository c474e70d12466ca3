//! # uthread-runtime
//!
//! Platform-specific runtime for uthread.
//!
//! This crate provides:
//! - Stack memory (mmap with a guard page)
//! - Context switching (architecture-specific assembly)
//! - Timer-signal preemption (SIGVTALRM)
//! - Thread control blocks and the FIFO round-robin scheduler
//! - Counting semaphores
//!
//! A runtime lives on the OS thread that calls [`run`] and ends when that
//! call returns. Logical threads never migrate between OS threads.

pub mod config;
pub mod memory;
pub mod arch;
pub mod tls;
pub mod preempt;
pub mod tcb;
pub mod scheduler;
pub mod semaphore;

// Re-exports
pub use config::{ConfigError, RuntimeConfig};
pub use preempt::{preempt_disable, preempt_enable, without_preemption, PreemptState, Preemption};
pub use scheduler::{block, create, current, exit, run, run_with_config, stats, unblock, yield_now};
pub use scheduler::{SchedStats, Scheduler};
pub use semaphore::{Semaphore, SemaphoreBusy};
