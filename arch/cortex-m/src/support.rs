// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Helper functions for the Cortex-M architecture.

use crate::scb;

/// NOP instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn nop() {
    use core::arch::asm;
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

/// WFI instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn wfi() {
    use core::arch::asm;
    asm!("wfi", options(nomem, preserves_flags));
}

/// Data memory barrier
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn dmb() {
    use core::arch::asm;
    unsafe {
        asm!("dmb", options(nostack, preserves_flags));
    }
}

/// Data synchronization barrier
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn dsb() {
    use core::arch::asm;
    unsafe {
        asm!("dsb", options(nostack, preserves_flags));
    }
}

/// Instruction synchronization barrier
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn isb() {
    use core::arch::asm;
    unsafe {
        asm!("isb", options(nostack, preserves_flags));
    }
}

/// Mask interrupts until the next reset.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn disable_interrupts() {
    use core::arch::asm;
    asm!("cpsid i", options(nomem, nostack));
}

/// Atomic operation
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
pub unsafe fn atomic<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    use core::arch::asm;
    // Set PRIMASK
    asm!("cpsid i", options(nomem, nostack));

    let res = f();

    // Unset PRIMASK
    asm!("cpsie i", options(nomem, nostack));
    res
}

// Mock implementations for host unit tests. The barriers only need to keep
// the compiler from reordering the register accesses around them.

/// NOP instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn nop() {
    unimplemented!()
}

/// WFI instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn wfi() {
    unimplemented!()
}

/// Data memory barrier (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn dmb() {
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

/// Data synchronization barrier (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn dsb() {
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

/// Instruction synchronization barrier (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn isb() {
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

/// Interrupt masking (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn disable_interrupts() {
    unimplemented!()
}

/// Atomic operation (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn atomic<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

/// Reset the chip.
///
/// Outstanding memory accesses complete and interrupts are masked before the
/// reset request, so no handler runs in between.
pub fn reset() -> ! {
    dsb();
    unsafe {
        disable_interrupts();
        scb::reset();
    }
    loop {
        // This is required to avoid the empty loop clippy
        // warning #[warn(clippy::empty_loop)]
        nop();
    }
}
