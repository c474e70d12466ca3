//! aarch64 context switching implementation
//!
//! AAPCS64 callee-saved state: x19-x28, fp (x29), lr (x30), sp and the low
//! halves of v8-v15 (d8-d15).

use super::EntryFn;
use std::arch::naked_asm;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedRegs {
    pub sp: u64,           // 0x00
    pub lr: u64,           // 0x08
    pub x19_28: [u64; 10], // 0x10
    pub fp: u64,           // 0x60
    pub d8_15: [u64; 8],   // 0x68
}

impl SavedRegs {
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/// Initialize a new thread's context
///
/// # Safety
///
/// `stack_top` must be the high end of a mapped, writable stack that stays
/// alive for as long as the context can run.
#[inline]
pub unsafe fn init_context(regs: &mut SavedRegs, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    let aligned_sp = (stack_top as usize) & !0xF;

    let mut x19_28 = [0u64; 10];
    x19_28[0] = entry as usize as u64; // x19
    x19_28[1] = arg as u64; // x20

    *regs = SavedRegs {
        sp: aligned_sp as u64,
        lr: entry_trampoline as usize as u64,
        x19_28,
        ..SavedRegs::default()
    };
}

/// Calls `x19(x20)`; the entry function never returns
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #1",
    );
}

/// Save callee-saved registers into `old` and resume from `new`
///
/// # Safety
///
/// Both pointers must reference live records; `new` must have been filled
/// by `init_context` or by an earlier switch away from it.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save to old (x0)
        "mov x9, sp",
        "str x9,       [x0, #0x00]",
        "str x30,      [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "str x29,      [x0, #0x60]",
        "stp d8,  d9,  [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Load from new (x1)
        "ldr x9,       [x1, #0x00]",
        "mov sp, x9",
        "ldr x30,      [x1, #0x08]",
        "ldp x19, x20, [x1, #0x10]",
        "ldp x21, x22, [x1, #0x20]",
        "ldp x23, x24, [x1, #0x30]",
        "ldp x25, x26, [x1, #0x40]",
        "ldp x27, x28, [x1, #0x50]",
        "ldr x29,      [x1, #0x60]",
        "ldp d8,  d9,  [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "ret",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<SavedRegs>(), 0xa8);
        assert_eq!(std::mem::offset_of!(SavedRegs, fp), 0x60);
        assert_eq!(std::mem::offset_of!(SavedRegs, d8_15), 0x68);
    }
}
