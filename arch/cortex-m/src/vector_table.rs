// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt vector table relocation.
//!
//! The core boots dispatching through the table linked into flash. Moving it
//! to RAM lets handlers be installed at run time. The whole table is copied
//! before VTOR is redirected, so an interrupt taken mid-copy still dispatches
//! through the intact flash table.

use core::ptr;

use crate::scb::Scb;
use crate::support;

/// RAM address the vector table is relocated to. The linker script must
/// reserve the table's length here.
pub const RAM_VECTOR_TABLE_BASE: u32 = 0x2000_0000;

pub struct VectorTable {
    active: *const u32,
    relocated: *mut u32,
    scb: Scb,
}

impl VectorTable {
    /// `active` is the table the core dispatches through now and `relocated`
    /// the RAM region it is moved to.
    ///
    /// Marked unsafe because both pointers are dereferenced without further
    /// checks by `relocate` and `install`.
    pub const unsafe fn new(active: *const u32, relocated: *mut u32, scb: Scb) -> Self {
        Self {
            active,
            relocated,
            scb,
        }
    }

    /// Copy `count` vectors to RAM and point the core at the copy.
    ///
    /// # Safety
    ///
    /// `count` must not exceed either table and the RAM region must not be in
    /// use by anything else.
    pub unsafe fn relocate(&self, count: usize) {
        for index in 0..count {
            let vector = ptr::read_volatile(self.active.add(index));
            ptr::write_volatile(self.relocated.add(index), vector);
        }
        support::dmb();
        self.scb
            .set_vector_table_offset(self.relocated as usize as u32);
        support::dsb();
    }

    /// Write `handler` into slot `index` of the RAM table.
    ///
    /// # Safety
    ///
    /// No bounds check is made and nothing verifies that `relocate` ran
    /// first; before relocation this overwrites whatever lives at the RAM
    /// base.
    pub unsafe fn install(&self, handler: u32, index: usize) {
        ptr::write_volatile(self.relocated.add(index), handler);
        support::dmb();
        support::dsb();
    }

    /// Read back slot `index` of the RAM table.
    ///
    /// # Safety
    ///
    /// `index` must be inside the relocated table.
    pub unsafe fn read(&self, index: usize) -> u32 {
        ptr::read_volatile(self.relocated.add(index))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::scb::ScbRegisters;
    use kernel::utilities::StaticRef;
    use std::boxed::Box;

    #[test]
    fn relocated_table_is_a_copy_and_takes_installed_handlers() {
        let flash: &'static mut [u32; 60] = Box::leak(Box::new([0u32; 60]));
        for (index, vector) in flash.iter_mut().enumerate() {
            *vector = 0x0800_0101 + (index as u32) * 4;
        }
        let ram: &'static mut [u32; 60] = Box::leak(Box::new([0u32; 60]));
        let ram_ptr = ram.as_mut_ptr();

        let registers: &'static ScbRegisters =
            Box::leak(Box::new(unsafe { core::mem::zeroed::<ScbRegisters>() }));
        let scb = unsafe { Scb::new(StaticRef::new(registers)) };
        let vtor = unsafe { Scb::new(StaticRef::new(registers)) };

        let table = unsafe { VectorTable::new(flash.as_ptr(), ram_ptr, scb) };
        unsafe { table.relocate(60) };

        assert_eq!(vtor.vector_table_offset(), ram_ptr as usize as u32);
        for index in 0..60 {
            assert_eq!(unsafe { table.read(index) }, 0x0800_0101 + index as u32 * 4);
        }

        unsafe { table.install(0x0800_4321, 16) };
        assert_eq!(unsafe { table.read(16) }, 0x0800_4321);
        assert_eq!(unsafe { table.read(15) }, 0x0800_0101 + 15 * 4);
    }
}
