//! Error types for the uthread runtime

use core::fmt;
use crate::id::ThreadId;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Thread-count ceiling reached
    ThreadLimit,

    /// Stack allocation/mapping failed
    MemoryError(MemoryError),

    /// Saved context could not be initialized
    ContextInit,

    /// No runtime is active on this OS thread
    NotInitialized,

    /// A runtime is already active on this OS thread
    AlreadyInitialized,

    /// Thread exists but is not blocked
    NotBlocked(ThreadId),

    /// No live thread with this identity
    ThreadNotFound(ThreadId),

    /// Ready queue drained while threads were still blocked
    Deadlock { blocked: usize },

    /// Configuration rejected by validation
    InvalidConfig(&'static str),

    /// Signal or timer syscall failed (errno)
    PlatformError(i32),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::ThreadLimit => write!(f, "thread limit reached"),
            SchedError::MemoryError(e) => write!(f, "memory error: {}", e),
            SchedError::ContextInit => write!(f, "context initialization failed"),
            SchedError::NotInitialized => write!(f, "runtime not initialized"),
            SchedError::AlreadyInitialized => write!(f, "runtime already initialized"),
            SchedError::NotBlocked(id) => write!(f, "thread {} is not blocked", id),
            SchedError::ThreadNotFound(id) => write!(f, "thread {} not found", id),
            SchedError::Deadlock { blocked } => {
                write!(f, "deadlock: {} thread(s) blocked with nothing ready", blocked)
            }
            SchedError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            SchedError::PlatformError(code) => write!(f, "platform error: {}", code),
        }
    }
}

impl std::error::Error for SchedError {}

/// Memory-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed
    AllocationFailed,

    /// mprotect failed on the guard page
    ProtectionFailed,

    /// munmap failed
    ReleaseFailed,

    /// Requested stack is smaller than the runtime minimum
    StackTooSmall,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed => write!(f, "stack allocation failed"),
            MemoryError::ProtectionFailed => write!(f, "guard page protection failed"),
            MemoryError::ReleaseFailed => write!(f, "stack release failed"),
            MemoryError::StackTooSmall => write!(f, "stack too small"),
        }
    }
}

impl From<MemoryError> for SchedError {
    fn from(e: MemoryError) -> Self {
        SchedError::MemoryError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SchedError::ThreadLimit;
        assert_eq!(format!("{}", e), "thread limit reached");

        let e = SchedError::MemoryError(MemoryError::AllocationFailed);
        assert_eq!(format!("{}", e), "memory error: stack allocation failed");

        let e = SchedError::NotBlocked(ThreadId::new(3));
        assert_eq!(format!("{}", e), "thread 3 is not blocked");

        let e = SchedError::Deadlock { blocked: 2 };
        assert_eq!(format!("{}", e), "deadlock: 2 thread(s) blocked with nothing ready");
    }

    #[test]
    fn test_error_conversion() {
        let mem_err = MemoryError::StackTooSmall;
        let sched_err: SchedError = mem_err.into();
        assert!(matches!(sched_err, SchedError::MemoryError(MemoryError::StackTooSmall)));
    }
}
