//! x86_64 context switching implementation
//!
//! Uses naked functions for the switch and the entry trampoline.
//! Stable since Rust 1.88.

use super::EntryFn;
use std::arch::naked_asm;

/// Callee-saved registers of the System V AMD64 ABI
///
/// Field offsets are hard-coded in `context_switch`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl SavedRegs {
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }
}

/// Initialize a new thread's context
///
/// Sets up the record so that switching to it begins `entry(arg)` on the
/// stack ending at `stack_top`.
///
/// # Safety
///
/// `stack_top` must be the high end of a mapped, writable stack that stays
/// alive for as long as the context can run.
#[inline]
pub unsafe fn init_context(regs: &mut SavedRegs, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    // The trampoline's `call` pushes the return address, leaving rsp at
    // 8 mod 16 on function entry as the ABI requires.
    let aligned_sp = (stack_top as usize) & !0xF;

    *regs = SavedRegs {
        rsp: aligned_sp as u64,
        rip: entry_trampoline as usize as u64,
        r12: entry as usize as u64,
        r13: arg as u64,
        ..SavedRegs::default()
    };
}

/// Calls `r12(r13)`; the entry function never returns
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
    );
}

/// Save callee-saved registers into `old` and resume from `new`
///
/// Returns when some later switch resumes `old`.
///
/// # Safety
///
/// Both pointers must reference live records; `new` must have been filled
/// by `init_context` or by an earlier switch away from it.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save to old (rdi)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load from new (rsi)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point of a saved context
        "1:",
        "ret",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<SavedRegs>(), 64);
        assert_eq!(std::mem::offset_of!(SavedRegs, rip), 0x08);
        assert_eq!(std::mem::offset_of!(SavedRegs, r15), 0x38);
    }
}
