// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARM System Control Block
//!
//! <http://infocenter.arm.com/help/index.jsp?topic=/com.arm.doc.dui0553a/CIHFDJCA.html>

use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    /// The part of the System Control Block this layer programs: the vector
    /// table base and the reset and priority grouping controls.
    pub ScbRegisters {
        /// CPUID and ICSR, not used here.
        (0x00 => _reserved0),

        /// Vector Table Offset Register
        (0x08 => vtor: ReadWrite<u32, VectorTableOffset::Register>),

        /// Application Interrupt and Reset Control Register
        (0x0c => aircr: ReadWrite<u32, ApplicationInterruptAndReset::Register>),

        (0x10 => @END),
    }
}

register_bitfields![u32,
    /// Note: Software can write all 1s to `TBLOFF` and read result to learn
    /// maximum supported value.
    VectorTableOffset [
        /// Bits [31:7] of the vector table address
        /// n.b. bits [6:0] are always 0.
        TBLOFF          OFFSET(7)   NUMBITS(25)
    ],

    ApplicationInterruptAndReset [
        /// Key field. Must write 0x05FA or write is ignored. Reads as 0xFA05.
        /// RW.
        VECTKEY         OFFSET(16)  NUMBITS(16),

        /// 0=Little endian, 1=Big endian.
        /// RO.
        ENDIANNESS      OFFSET(15)  NUMBITS(1),

        /// Binary point position for priority grouping. Defaults to 0b000.
        /// RW.
        PRIGROUP        OFFSET(8)   NUMBITS(3),

        /// Writing 1 to this bit requests a Local reset. Cleared to 0b0 on reset.
        /// RW.
        SYSRESETREQ     OFFSET(2)   NUMBITS(1),

        /// Writing 1 clears all state information for exceptions.
        /// WARN: Writing this bit when not in a Debug halt is UNPREDICTABLE.
        /// WO.
        VECTCLRACTIVE   OFFSET(1)   NUMBITS(1),

        /// Writing 1 causes a local system reset.
        /// WARN: Writing this bit when not in a Debug halt is UNPREDICTABLE.
        /// WARN: Writing this and `SYSRESETREQ` is UNPREDICTABLE.
        /// WO.
        VECTRESET       OFFSET(0)   NUMBITS(1)
    ]
];

/// AIRCR writes are ignored unless they carry this key.
const VECTKEY: u32 = 0x05FA;

pub const SCB_BASE: StaticRef<ScbRegisters> =
    unsafe { StaticRef::new(0xE000ED00 as *const ScbRegisters) };

pub struct Scb {
    registers: StaticRef<ScbRegisters>,
}

impl Scb {
    pub const unsafe fn new(registers: StaticRef<ScbRegisters>) -> Self {
        Self { registers }
    }

    /// Address of the vector table the core currently dispatches from.
    pub fn vector_table_offset(&self) -> u32 {
        self.registers.vtor.get()
    }

    /// Point the core at the vector table at `offset`.
    ///
    /// # Safety
    ///
    /// `offset` must be 128-byte aligned and hold a complete vector table.
    /// Any interrupt taken after this write dispatches through it.
    pub unsafe fn set_vector_table_offset(&self, offset: u32) {
        self.registers.vtor.set(offset);
    }

    /// Select how many of the implemented priority bits are preemption
    /// bits. `group` is written to PRIGROUP unchanged.
    pub fn set_priority_grouping(&self, group: u8) {
        self.registers.aircr.modify(
            ApplicationInterruptAndReset::VECTKEY.val(VECTKEY)
                + ApplicationInterruptAndReset::PRIGROUP.val(group as u32),
        );
    }

    pub fn priority_grouping(&self) -> u8 {
        self.registers
            .aircr
            .read(ApplicationInterruptAndReset::PRIGROUP) as u8
    }

    /// Ask the core to reset the system.
    pub fn request_reset(&self) {
        self.registers.aircr.modify(
            ApplicationInterruptAndReset::VECTKEY.val(VECTKEY)
                + ApplicationInterruptAndReset::SYSRESETREQ::SET,
        );
    }
}

/// Request a system reset through the core's SCB.
pub unsafe fn reset() {
    Scb::new(SCB_BASE).request_reset();
}
