// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Chip level setup: the default peripheral set, interrupt routing and the
//! vector table.

use cortexm::scb::{Scb, SCB_BASE};
use cortexm::vector_table::{VectorTable, RAM_VECTOR_TABLE_BASE};
use kernel::platform::chip::InterruptService;

use crate::clocks::Clocks;
use crate::crc::Crc;
use crate::dma::Dma;
use crate::exti::Exti;
use crate::flash::Flash;
use crate::gate::PeripheralGate;
use crate::gpio::Gpio;
use crate::iwdg::Iwdg;
use crate::nvic;
use crate::rcc::Rcc;

/// Where the boot vector table is linked. Address 0 aliases it when booting
/// from main flash.
pub const FLASH_VECTOR_TABLE_BASE: u32 = 0x0800_0000;

/// Core exceptions plus every device interrupt.
pub const VECTOR_COUNT: usize = 16 + nvic::OTG_FS as usize + 1;

pub struct Stm32f1xxDefaultPeripherals<'a> {
    pub clocks: Clocks<'a>,
    pub gate: &'a PeripheralGate<'a>,
    pub dma: Dma<'a>,
    pub exti: &'a Exti<'a>,
    pub gpio: Gpio<'a>,
    pub iwdg: Iwdg<'a>,
    pub crc: Crc<'a>,
}

impl<'a> Stm32f1xxDefaultPeripherals<'a> {
    pub fn new(
        rcc: &'a Rcc,
        flash: &'a Flash,
        gate: &'a PeripheralGate<'a>,
        exti: &'a Exti<'a>,
    ) -> Self {
        Self {
            clocks: Clocks::new(rcc, flash),
            gate,
            dma: Dma::new(),
            exti,
            gpio: Gpio::new(gate, exti),
            iwdg: Iwdg::new(rcc),
            crc: Crc::new(gate),
        }
    }
}

impl InterruptService for Stm32f1xxDefaultPeripherals<'_> {
    unsafe fn service_interrupt(&self, interrupt: u32) -> bool {
        self.exti.handle_irq(interrupt) || self.dma.handle_irq(interrupt)
    }
}

/// Give all NVIC priority bits to preemption.
pub fn init(scb: &Scb) {
    scb.set_priority_grouping(nvic::PRIORITY_GROUPING);
}

/// The boot table and its RAM destination.
///
/// # Safety
///
/// The linker script must reserve [VECTOR_COUNT] words at
/// [RAM_VECTOR_TABLE_BASE].
pub unsafe fn vector_table() -> VectorTable {
    VectorTable::new(
        FLASH_VECTOR_TABLE_BASE as *const u32,
        RAM_VECTOR_TABLE_BASE as *mut u32,
        Scb::new(SCB_BASE),
    )
}

/// Copy the first `count` vectors to RAM and dispatch through the copy.
///
/// # Safety
///
/// See [VectorTable::relocate]. `count` is at most [VECTOR_COUNT].
pub unsafe fn relocate_vector_table(count: usize) {
    vector_table().relocate(count);
}

/// Replace vector `index` of the RAM table with `handler`.
///
/// # Safety
///
/// See [VectorTable::install]. Calling this before
/// [relocate_vector_table] writes into RAM the core does not dispatch
/// through.
pub unsafe fn install_vector(handler: u32, index: usize) {
    vector_table().install(handler, index);
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::crc::CrcRegisters;
    use crate::dma::{DmaRegisters, CONTROLLER_COUNT};
    use crate::exti::testing::exti;
    use crate::flash::testing::flash;
    use crate::gpio::testing::leak_ports;
    use crate::iwdg::IwdgRegisters;
    use crate::rcc::testing::{leak_registers, rcc};
    use cortexm::scb::ScbRegisters;
    use kernel::utilities::StaticRef;
    use std::boxed::Box;

    fn zeroed<T: 'static>() -> &'static T {
        Box::leak(Box::new(unsafe { core::mem::zeroed::<T>() }))
    }

    fn peripherals() -> Stm32f1xxDefaultPeripherals<'static> {
        let harness = exti();
        let rcc: &'static Rcc = Box::leak(Box::new(rcc(leak_registers())));
        let flash: &'static Flash = Box::leak(Box::new(flash()));
        let controllers: [StaticRef<DmaRegisters>; CONTROLLER_COUNT] =
            core::array::from_fn(|_| unsafe { StaticRef::new(zeroed::<DmaRegisters>()) });
        let (ports, _) = leak_ports();
        Stm32f1xxDefaultPeripherals {
            clocks: Clocks::new(rcc, flash),
            gate: harness.gate,
            dma: Dma::with_registers(controllers),
            exti: harness.exti,
            gpio: Gpio::with_registers(ports, harness.gate, harness.exti),
            iwdg: Iwdg::with_registers(
                unsafe { StaticRef::new(zeroed::<IwdgRegisters>()) },
                rcc,
            ),
            crc: Crc::with_registers(
                unsafe { StaticRef::new(zeroed::<CrcRegisters>()) },
                harness.gate,
            ),
        }
    }

    #[test]
    fn exti_and_dma_lines_are_serviced() {
        let peripherals = peripherals();
        for irq in [
            nvic::EXTI0,
            nvic::EXTI4,
            nvic::EXTI9_5,
            nvic::EXTI15_10,
            nvic::DMA1_Channel1,
            nvic::DMA1_Channel7,
        ] {
            assert!(unsafe { peripherals.service_interrupt(irq) }, "irq {}", irq);
        }
        assert!(!unsafe { peripherals.service_interrupt(nvic::RCC) });
        assert!(!unsafe { peripherals.service_interrupt(nvic::USART1) });
    }

    #[cfg(any(feature = "stm32f103xe", feature = "stm32f107xc"))]
    #[test]
    fn second_controller_lines_are_serviced() {
        let peripherals = peripherals();
        assert!(unsafe { peripherals.service_interrupt(nvic::DMA2_Channel1) });
        assert!(unsafe { peripherals.service_interrupt(nvic::DMA2_Channel4_5) });
    }

    #[test]
    fn init_selects_four_preemption_bits() {
        let registers = zeroed::<ScbRegisters>();
        let scb = unsafe { Scb::new(StaticRef::new(registers)) };
        init(&scb);
        assert_eq!(scb.priority_grouping(), 3);
    }
}
