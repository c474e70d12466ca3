//! Logical thread identifier type

use core::fmt;
use crate::constants::{CONTROL_THREAD_ID, THREAD_NONE};

/// Unique identifier for a logical thread
///
/// Identities are handed out monotonically by the scheduler and never
/// reused within one `run`. Id 0 is the control thread that called `run`.
/// The maximum value (u32::MAX) is reserved as a sentinel for "no thread".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Sentinel value indicating no thread
    pub const NONE: ThreadId = ThreadId(THREAD_NONE);

    /// The control thread representing the caller of `run`
    pub const CONTROL: ThreadId = ThreadId(CONTROL_THREAD_ID);

    /// Create a new ThreadId from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        ThreadId(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == THREAD_NONE
    }

    /// Check if this is a valid thread ID
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != THREAD_NONE
    }

    /// Check if this is the control thread
    #[inline]
    pub const fn is_control(self) -> bool {
        self.0 == CONTROL_THREAD_ID
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<ThreadId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for ThreadId {
    #[inline]
    fn from(id: u32) -> Self {
        ThreadId(id)
    }
}

impl From<ThreadId> for u32 {
    #[inline]
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "ThreadId(NONE)")
        } else {
            write!(f, "ThreadId({})", self.0)
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        ThreadId::NONE
    }
}
