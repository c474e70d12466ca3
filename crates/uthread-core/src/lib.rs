//! # uthread-core
//!
//! Core types for the uthread (user-space thread) runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stacks, context switching, signals and the scheduler itself live in
//! `uthread-runtime`.
//!
//! ## Modules
//!
//! - `id` - Logical thread identifier type
//! - `state` - Thread lifecycle state machine
//! - `queue` - Generic FIFO queue used by the scheduler and semaphores
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod queue;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThreadId;
pub use state::ThreadState;
pub use queue::Queue;
pub use error::{SchedError, SchedResult};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

/// Constants for memory layout and limits
pub mod constants {
    cfg_if::cfg_if! {
        if #[cfg(all(target_os = "macos", target_arch = "aarch64"))] {
            /// Page size (Apple Silicon uses 16 KB pages)
            pub const PAGE_SIZE: usize = 16 * 1024;
        } else {
            /// Page size
            pub const PAGE_SIZE: usize = 4096;
        }
    }

    /// Guard page size below every stack
    pub const GUARD_SIZE: usize = PAGE_SIZE;

    /// Smallest stack the runtime accepts
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Identity of the control thread (the caller of `run`)
    pub const CONTROL_THREAD_ID: u32 = 0;

    /// No thread sentinel value
    pub const THREAD_NONE: u32 = u32::MAX;
}
