// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Cortex-M NVIC
//!
//! Most NVIC configuration is in the NVIC registers:
//! <https://developer.arm.com/docs/100165/0201/nested-vectored-interrupt-controller/nvic-programmers-model/table-of-nvic-registers>
//!
//! The set/clear register pairs make enable, disable and pending-clear single
//! stores, so they are safe to issue from any context. Priority registers hold
//! four interrupts per word and are updated with a read-modify-write.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    /// NVIC Registers.
    ///
    /// Note this generic interface exposes all possible NVICs. Most cores will
    /// not implement all NVIC_XXXX registers.
    pub NvicRegisters {
        (0x000 => _reserved0),

        /// Interrupt Set-Enable Registers
        (0x100 => iser: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Clear-Enable Registers
        (0x180 => icer: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Set-Pending Registers
        (0x200 => ispr: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Clear-Pending Registers
        (0x280 => icpr: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        // Interrupt Active Bit Registers
        (0x300 => _reserved1),

        /// Interrupt Priority Registers
        (0x400 => ipr: [ReadWrite<u32>; 252]),

        (0x7f0 => @END),
    }
}

register_bitfields![u32,
    NvicSetClear [
        /// For register NVIC_XXXXn, access interrupt (m+(32*n)).
        BITS            OFFSET(0)   NUMBITS(32)
    ]
];

/// The NVIC peripheral in MMIO space.
pub const NVIC_BASE: StaticRef<NvicRegisters> =
    unsafe { StaticRef::new(0xe000e000 as *const NvicRegisters) };

/// Handle on the NVIC through which all interrupt line configuration goes.
pub struct NvicController {
    registers: StaticRef<NvicRegisters>,
    priority_bits: u8,
}

impl NvicController {
    /// Creates the controller for a core implementing `priority_bits` bits of
    /// priority (4 on STM32F1).
    ///
    /// Marked unsafe because only chip/platform configuration code should be
    /// able to create these.
    pub const unsafe fn new(registers: StaticRef<NvicRegisters>, priority_bits: u8) -> Self {
        Self {
            registers,
            priority_bits,
        }
    }

    /// Enable the interrupt
    pub fn enable(&self, irq: u32) {
        self.registers.iser[irq as usize / 32].set(1 << (irq & 31));
    }

    /// Disable the interrupt
    pub fn disable(&self, irq: u32) {
        self.registers.icer[irq as usize / 32].set(1 << (irq & 31));
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        self.registers.iser[irq as usize / 32].get() & (1 << (irq & 31)) != 0
    }

    /// Clear pending state
    pub fn clear_pending(&self, irq: u32) {
        self.registers.icpr[irq as usize / 32].set(1 << (irq & 31));
    }

    pub fn is_pending(&self, irq: u32) -> bool {
        self.registers.ispr[irq as usize / 32].get() & (1 << (irq & 31)) != 0
    }

    /// Program the priority of `irq`. `level` is in implemented-bit units:
    /// 0 is the most urgent, `(1 << priority_bits) - 1` the least. Higher bits
    /// of `level` are ignored.
    ///
    /// The write is a read-modify-write of a word shared with three other
    /// interrupts; callers serialise it against handlers that do the same.
    pub fn set_priority(&self, irq: u32, level: u8) {
        let register = &self.registers.ipr[irq as usize / 4];
        let shift = (irq % 4) * 8;
        let encoded = self.encode_priority(level) as u32;
        let value = register.get() & !(0xff << shift);
        register.set(value | (encoded << shift));
    }

    /// Read back the priority of `irq` in implemented-bit units.
    pub fn get_priority(&self, irq: u32) -> u8 {
        let shift = (irq % 4) * 8;
        let byte = (self.registers.ipr[irq as usize / 4].get() >> shift) as u8;
        byte >> (8 - self.priority_bits)
    }

    fn encode_priority(&self, level: u8) -> u8 {
        let mask = ((1u16 << self.priority_bits) - 1) as u8;
        (level & mask) << (8 - self.priority_bits)
    }
}
