// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Hardware CRC calculation unit (CRC-32, polynomial 0x04C11DB7).
//!
//! The unit consumes 32-bit words. [`Crc::compute`] feeds one byte per word,
//! so its result matches the usual CRC-32/MPEG-2 of the zero-extended words,
//! not of the byte string.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use crate::gate::{self, PeripheralGate};

register_structs! {
    pub CrcRegisters {
        /// Data register
        (0x00 => dr: ReadWrite<u32>),
        /// Independent data register, free scratch byte
        (0x04 => idr: ReadWrite<u32>),
        /// Control register
        (0x08 => cr: ReadWrite<u32, CR::Register>),
        (0x0C => @END),
    }
}

register_bitfields![u32,
    CR [
        RESET OFFSET(0) NUMBITS(1) []
    ]
];

pub const CRC_BASE: StaticRef<CrcRegisters> =
    unsafe { StaticRef::new(0x4002_3000 as *const CrcRegisters) };

pub struct Crc<'a> {
    registers: StaticRef<CrcRegisters>,
    gate: &'a PeripheralGate<'a>,
}

impl<'a> Crc<'a> {
    pub const fn new(gate: &'a PeripheralGate<'a>) -> Self {
        Self::with_registers(CRC_BASE, gate)
    }

    pub(crate) const fn with_registers(
        registers: StaticRef<CrcRegisters>,
        gate: &'a PeripheralGate<'a>,
    ) -> Self {
        Self { registers, gate }
    }

    /// CRC of `data`, starting from the reset value 0xFFFFFFFF.
    ///
    /// The unit is clocked only for the duration of the call.
    pub fn compute(&self, data: &[u8]) -> Result<u32, ErrorCode> {
        self.gate.enable(gate::CRC)?;
        self.registers.cr.write(CR::RESET::SET);
        for &byte in data {
            self.registers.dr.set(byte as u32);
        }
        let crc = self.registers.dr.get();
        self.gate.disable(gate::CRC)?;
        Ok(crc)
    }
}
