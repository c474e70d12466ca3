//! Unix stack implementation using mmap

use super::Stack;
use std::ptr::NonNull;
use uthread_core::constants::{GUARD_SIZE, MIN_STACK_SIZE, PAGE_SIZE};
use uthread_core::error::{MemoryError, SchedResult};
use uthread_core::kwarn;

impl Stack {
    /// Map a new stack with at least `size` usable bytes
    ///
    /// The size is rounded up to whole pages. The guard page stays
    /// PROT_NONE; the rest is readable/writable and committed lazily by the
    /// kernel.
    pub fn allocate(size: usize) -> SchedResult<Stack> {
        if size < MIN_STACK_SIZE {
            return Err(MemoryError::StackTooSmall.into());
        }

        let usable = size
            .checked_add(PAGE_SIZE - 1)
            .ok_or(MemoryError::AllocationFailed)?
            & !(PAGE_SIZE - 1);
        let mapped = usable
            .checked_add(GUARD_SIZE)
            .ok_or(MemoryError::AllocationFailed)?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | map_stack_flag(),
                -1,
                0,
            )
        };

        if base == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed.into());
        }

        // Guard page at the low end; overflow will SIGSEGV
        let ret = unsafe { libc::mprotect(base, GUARD_SIZE, libc::PROT_NONE) };
        if ret != 0 {
            unsafe { libc::munmap(base, mapped) };
            return Err(MemoryError::ProtectionFailed.into());
        }

        let base = NonNull::new(base as *mut u8).ok_or(MemoryError::AllocationFailed)?;
        Ok(Stack { base, mapped })
    }

    /// Unmap the stack, reporting failure instead of logging it
    pub fn destroy(self) -> SchedResult<()> {
        let this = std::mem::ManuallyDrop::new(self);
        this.unmap()
    }

    fn unmap(&self) -> SchedResult<()> {
        let ret = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.mapped) };
        if ret != 0 {
            return Err(MemoryError::ReleaseFailed.into());
        }
        Ok(())
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        if let Err(e) = self.unmap() {
            kwarn!("stack at {:p}: {}", self.base, e);
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "openbsd"))]
#[inline]
fn map_stack_flag() -> libc::c_int {
    libc::MAP_STACK
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "openbsd")))]
#[inline]
fn map_stack_flag() -> libc::c_int {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use uthread_core::SchedError;

    #[test]
    fn test_allocate_rounds_to_pages() {
        let stack = Stack::allocate(MIN_STACK_SIZE + 1).unwrap();
        assert_eq!(stack.size(), MIN_STACK_SIZE + PAGE_SIZE);
        assert_eq!(stack.top() as usize % PAGE_SIZE, 0);
        assert_eq!(stack.top() as usize - stack.bottom() as usize, stack.size());
    }

    #[test]
    fn test_stack_is_writable() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        unsafe {
            // Touch both ends of the usable range
            stack.bottom().write(0xAB);
            stack.top().sub(1).write(0xCD);
            assert_eq!(stack.bottom().read(), 0xAB);
            assert_eq!(stack.top().sub(1).read(), 0xCD);
        }
        assert!(stack.contains(stack.bottom()));
        assert!(!stack.contains(stack.top()));
    }

    #[test]
    fn test_too_small_rejected() {
        let err = Stack::allocate(1024).unwrap_err();
        assert_eq!(err, SchedError::MemoryError(MemoryError::StackTooSmall));
    }

    #[test]
    fn test_explicit_destroy() {
        let stack = Stack::allocate(MIN_STACK_SIZE).unwrap();
        assert!(stack.destroy().is_ok());
    }
}
