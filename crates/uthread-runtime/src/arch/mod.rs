//! Architecture-specific context switching
//!
//! Each backend provides a callee-saved register record (`SavedRegs`),
//! `init_context` to aim a fresh record at a new stack, and
//! `context_switch` to save the current CPU state and resume another.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use self::x86_64::{context_switch, init_context, SavedRegs};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use self::aarch64::{context_switch, init_context, SavedRegs};
    } else {
        compile_error!("Unsupported architecture");
    }
}

/// First Rust code run on a new stack; receives the argument stored by
/// `init_context` and must never return
pub type EntryFn = extern "C" fn(usize) -> !;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Stack;
    use std::cell::Cell;

    thread_local! {
        static MAIN_REGS: Cell<*mut SavedRegs> = const { Cell::new(std::ptr::null_mut()) };
        static SIDE_REGS: Cell<*mut SavedRegs> = const { Cell::new(std::ptr::null_mut()) };
        static HITS: Cell<usize> = const { Cell::new(0) };
    }

    extern "C" fn ping(arg: usize) -> ! {
        HITS.with(|h| h.set(h.get() + arg));
        let (side, main) = (SIDE_REGS.with(|c| c.get()), MAIN_REGS.with(|c| c.get()));
        unsafe { context_switch(side, main) };

        // Resumed a second time
        HITS.with(|h| h.set(h.get() + arg));
        unsafe { context_switch(side, main) };
        std::process::abort();
    }

    #[test]
    fn test_switch_round_trip() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        let mut main_regs = SavedRegs::default();
        let mut side_regs = SavedRegs::default();

        let main_ptr: *mut SavedRegs = &mut main_regs;
        let side_ptr: *mut SavedRegs = &mut side_regs;

        unsafe { init_context(&mut *side_ptr, stack.top(), ping, 10) };
        MAIN_REGS.with(|c| c.set(main_ptr));
        SIDE_REGS.with(|c| c.set(side_ptr));

        unsafe { context_switch(main_ptr, side_ptr) };
        assert_eq!(HITS.with(|h| h.get()), 10);

        unsafe { context_switch(main_ptr, side_ptr) };
        assert_eq!(HITS.with(|h| h.get()), 20);
    }

    #[test]
    fn test_init_aligns_stack() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        let mut regs = SavedRegs::default();
        let odd_top = unsafe { stack.top().sub(5) };
        unsafe { init_context(&mut regs, odd_top, ping, 0) };
        assert_eq!(regs.stack_pointer() % 16, 0);
        assert!(regs.stack_pointer() <= odd_top as usize);
    }
}
