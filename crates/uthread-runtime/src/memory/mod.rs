//! Stack memory for logical threads
//!
//! Every stack is its own anonymous mapping with an inaccessible guard page
//! at the low end, so an overflow faults instead of scribbling over a
//! neighbour. Platform-specific implementations do the mapping.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    } else {
        compile_error!("stack allocation is only implemented for unix");
    }
}

use std::ptr::NonNull;
use uthread_core::constants::GUARD_SIZE;

/// An owned thread stack (grows down)
///
/// ```text
/// base                base+GUARD                          base+mapped
///  │ guard (PROT_NONE) │ usable stack (RW)  ◄── grows ──   │ top
/// ```
///
/// Dropping the stack unmaps it. The scheduler never drops the stack of the
/// thread that is currently executing; exited threads are reclaimed from
/// the run loop instead.
pub struct Stack {
    /// Start of the mapping (guard page)
    base: NonNull<u8>,

    /// Total mapped bytes, guard included
    mapped: usize,
}

impl Stack {
    /// Highest address; initial stack pointer
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.mapped) }
    }

    /// Lowest usable address (just above the guard page)
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(GUARD_SIZE) }
    }

    /// Usable bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.mapped - GUARD_SIZE
    }

    /// Check if `addr` lies in the usable part of this stack
    #[inline]
    pub fn contains(&self, addr: *const u8) -> bool {
        let addr = addr as usize;
        addr >= self.bottom() as usize && addr < self.top() as usize
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("size", &self.size())
            .finish()
    }
}
