// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Flash access control.
//!
//! Only the wait-state and prefetch settings are driven from here; they must
//! track the system clock frequency.

use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    /// FLASH
    pub FlashRegisters {
        /// Flash access control register
        (0x000 => acr: ReadWrite<u32, ACR::Register>),
        (0x004 => @END),
    }
}

register_bitfields![u32,
    ACR [
        /// Prefetch buffer status
        PRFTBS OFFSET(5) NUMBITS(1) [],
        /// Prefetch buffer enable
        PRFTBE OFFSET(4) NUMBITS(1) [],
        /// Flash half cycle access enable
        HLFCYA OFFSET(3) NUMBITS(1) [],
        /// Latency
        LATENCY OFFSET(0) NUMBITS(3) []
    ]
];

pub const FLASH_BASE: StaticRef<FlashRegisters> =
    unsafe { StaticRef::new(0x40022000 as *const FlashRegisters) };

pub struct Flash {
    registers: StaticRef<FlashRegisters>,
}

#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub enum FlashLatency {
    Latency0,
    Latency1,
    Latency2,
}

impl TryFrom<usize> for FlashLatency {
    type Error = &'static str;

    fn try_from(item: usize) -> Result<Self, Self::Error> {
        match item {
            0 => Ok(FlashLatency::Latency0),
            1 => Ok(FlashLatency::Latency1),
            2 => Ok(FlashLatency::Latency2),
            _ => Err("Error value for FlashLatency::try_from"),
        }
    }
}

impl Flash {
    pub const fn new() -> Self {
        Self::with_registers(FLASH_BASE)
    }

    pub(crate) const fn with_registers(registers: StaticRef<FlashRegisters>) -> Self {
        Self { registers }
    }

    pub(crate) fn get_number_wait_cycles_based_on_frequency(
        &self,
        frequency_mhz: usize,
    ) -> FlashLatency {
        if frequency_mhz <= 24 {
            FlashLatency::Latency0
        } else if frequency_mhz <= 48 {
            FlashLatency::Latency1
        } else {
            FlashLatency::Latency2
        }
    }

    pub fn get_latency(&self) -> FlashLatency {
        // Values 0b011 to 0b111 are reserved; treat them as the slowest setting
        TryFrom::try_from(self.registers.acr.read(ACR::LATENCY) as usize)
            .unwrap_or(FlashLatency::Latency2)
    }

    // This method is public(crate) because flash latency depends on the system
    // clock frequency. Raise it before a frequency increase, lower it after a
    // decrease.
    pub(crate) fn set_latency(&self, sys_clock_frequency_mhz: usize) -> Result<(), ErrorCode> {
        let flash_latency = self.get_number_wait_cycles_based_on_frequency(sys_clock_frequency_mhz);
        self.registers
            .acr
            .modify(ACR::LATENCY.val(flash_latency as u32));

        for _ in 0..16 {
            if self.get_latency() == flash_latency {
                return Ok(());
            }
        }

        Err(ErrorCode::BUSY)
    }

    pub fn enable_prefetch_buffer(&self) {
        self.registers.acr.modify(ACR::PRFTBE::SET);
    }

    pub fn is_enabled_prefetch_buffer(&self) -> bool {
        self.registers.acr.is_set(ACR::PRFTBE)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::flash;
    use super::*;

    #[test]
    fn wait_states_follow_the_frequency_thresholds() {
        let flash = flash();
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(8), FlashLatency::Latency0);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(16), FlashLatency::Latency0);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(24), FlashLatency::Latency0);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(32), FlashLatency::Latency1);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(36), FlashLatency::Latency1);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(48), FlashLatency::Latency1);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(64), FlashLatency::Latency2);
        assert_eq!(flash.get_number_wait_cycles_based_on_frequency(72), FlashLatency::Latency2);
    }

    #[test]
    fn set_latency_writes_the_field_and_keeps_prefetch() {
        let flash = flash();
        flash.enable_prefetch_buffer();

        assert_eq!(flash.set_latency(72), Ok(()));
        assert_eq!(flash.get_latency(), FlashLatency::Latency2);
        assert!(flash.is_enabled_prefetch_buffer());

        assert_eq!(flash.set_latency(8), Ok(()));
        assert_eq!(flash.get_latency(), FlashLatency::Latency0);
        assert!(flash.is_enabled_prefetch_buffer());
    }
}
