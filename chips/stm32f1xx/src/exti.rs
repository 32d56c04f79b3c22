// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! External interrupt lines 0 to 15 and their port selectors.
//!
//! Line `n` can be driven by pin `n` of exactly one port at a time. The
//! selector lives in the AFIO EXTICR registers, four lines per register and
//! four bits per line. Routing a pin from a second port evicts the first.
//!
//! Lines 0 to 4 have an NVIC input each; lines 5 to 9 and 10 to 15 share one.

use cortexm::nvic::NvicController;
use cortexm::support::atomic;
use kernel::utilities::cells::OptionalCell;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use crate::gate::{self, PeripheralGate};
use crate::gpio::{PinConfig, PortId, MAX_PIN};
use crate::nvic;

register_structs! {
    /// Alternate function I/O, the part used for EXTI routing
    pub AfioRegisters {
        /// Event control and remap registers
        (0x00 => _reserved0),
        /// External interrupt configuration registers 1 to 4
        (0x08 => exticr: [ReadWrite<u32>; 4]),
        /// Remap register 2 and padding
        (0x18 => _reserved1),
        (0x20 => @END),
    }
}

register_structs! {
    /// External interrupt/event controller
    pub ExtiRegisters {
        /// Interrupt mask register
        (0x00 => imr: ReadWrite<u32>),
        /// Event mask register
        (0x04 => emr: ReadWrite<u32>),
        /// Rising trigger selection register
        (0x08 => rtsr: ReadWrite<u32>),
        /// Falling trigger selection register
        (0x0C => ftsr: ReadWrite<u32>),
        /// Software interrupt event register
        (0x10 => swier: ReadWrite<u32>),
        /// Pending register, write 1 to clear
        (0x14 => pr: ReadWrite<u32>),
        (0x18 => @END),
    }
}

pub const AFIO_BASE: StaticRef<AfioRegisters> =
    unsafe { StaticRef::new(0x4001_0000 as *const AfioRegisters) };

pub const EXTI_BASE: StaticRef<ExtiRegisters> =
    unsafe { StaticRef::new(0x4001_0400 as *const ExtiRegisters) };

/// Lines reachable from GPIO pins. Lines 16 and up (PVD, RTC, USB, Ethernet)
/// are not handled here.
pub const LINE_COUNT: usize = 16;

const LINE_MASK: u32 = (1 << LINE_COUNT) - 1;
const SELECTOR_BITS: usize = 4;
const SELECTOR_MASK: u32 = 0xF;

/// NVIC input serving EXTI line `pin`.
///
/// Pins above 15 map to the last shared input.
pub fn resolve_irq_number(pin: u8) -> u32 {
    match pin {
        0..=4 => nvic::EXTI0 + pin as u32,
        5..=9 => nvic::EXTI9_5,
        _ => nvic::EXTI15_10,
    }
}

/// Receives edges on a line that has a client registered.
pub trait ExtiClient {
    /// `port` is the port selected for `line` when the edge was handled.
    fn fired(&self, port: PortId, line: u8);
}

fn line_bit(pin: u8) -> Result<u32, ErrorCode> {
    if pin > MAX_PIN {
        Err(ErrorCode::INVAL)
    } else {
        Ok(1 << pin)
    }
}

fn set_bit(register: &ReadWrite<u32>, bit: u32, value: bool) {
    if value {
        register.set(register.get() | bit);
    } else {
        register.set(register.get() & !bit);
    }
}

pub struct Exti<'a> {
    registers: StaticRef<ExtiRegisters>,
    afio: StaticRef<AfioRegisters>,
    gate: &'a PeripheralGate<'a>,
    nvic: &'a NvicController,
    clients: [OptionalCell<&'a dyn ExtiClient>; LINE_COUNT],
}

impl<'a> Exti<'a> {
    pub const fn new(gate: &'a PeripheralGate<'a>, nvic: &'a NvicController) -> Self {
        Self::with_registers(EXTI_BASE, AFIO_BASE, gate, nvic)
    }

    pub(crate) const fn with_registers(
        registers: StaticRef<ExtiRegisters>,
        afio: StaticRef<AfioRegisters>,
        gate: &'a PeripheralGate<'a>,
        nvic: &'a NvicController,
    ) -> Self {
        Self {
            registers,
            afio,
            gate,
            nvic,
            clients: [const { OptionalCell::empty() }; LINE_COUNT],
        }
    }

    pub fn set_client(&self, line: u8, client: &'a dyn ExtiClient) -> Result<(), ErrorCode> {
        line_bit(line)?;
        self.clients[line as usize].set(client);
        Ok(())
    }

    /// Route pin `config.pin` of `port` to its EXTI line and arm it.
    ///
    /// Turns on the AFIO clock, rewrites the line selector, unmasks the
    /// interrupt, programs both edge selections from `config` and enables the
    /// NVIC input at [`nvic::priority::NORMAL`]. A pin from another port that
    /// held the line loses it.
    pub fn set_extended_it(&self, port: PortId, config: &PinConfig) -> Result<(), ErrorCode> {
        let bit = line_bit(config.pin)?;
        self.gate.enable(gate::AFIO)?;

        let pin = config.pin as usize;
        let selector = &self.afio.exticr[pin / 4];
        let shift = (pin % 4) * SELECTOR_BITS;
        selector.set(
            (selector.get() & !(SELECTOR_MASK << shift)) | (port.index() as u32) << shift,
        );

        set_bit(&self.registers.imr, bit, true);
        set_bit(&self.registers.rtsr, bit, config.rising);
        set_bit(&self.registers.ftsr, bit, config.falling);

        let irq = resolve_irq_number(config.pin);
        self.nvic.set_priority(irq, nvic::priority::NORMAL);
        self.nvic.enable(irq);
        Ok(())
    }

    /// Disarm line `pin`: NVIC input off, interrupt and event masked, both
    /// edges deselected. The port selector is left as it was.
    ///
    /// The NVIC input is shared by lines 5 to 9 and 10 to 15, so this also
    /// silences the other lines of the group.
    pub fn reset_extended_it(&self, pin: u8) -> Result<(), ErrorCode> {
        let bit = line_bit(pin)?;
        self.nvic.disable(resolve_irq_number(pin));
        set_bit(&self.registers.imr, bit, false);
        set_bit(&self.registers.emr, bit, false);
        set_bit(&self.registers.rtsr, bit, false);
        set_bit(&self.registers.ftsr, bit, false);
        Ok(())
    }

    pub fn mask_extended_it(&self, pin: u8) -> Result<(), ErrorCode> {
        set_bit(&self.registers.imr, line_bit(pin)?, false);
        Ok(())
    }

    pub fn unmask_extended_it(&self, pin: u8) -> Result<(), ErrorCode> {
        set_bit(&self.registers.imr, line_bit(pin)?, true);
        Ok(())
    }

    pub fn clear_pending_extended_it(&self, pin: u8) -> Result<(), ErrorCode> {
        self.registers.pr.set(line_bit(pin)?);
        Ok(())
    }

    pub fn is_pending(&self, pin: u8) -> bool {
        line_bit(pin).is_ok_and(|bit| self.registers.pr.get() & bit != 0)
    }

    /// Port index selected for line `pin` in bits 8 and up, the line number
    /// in bits 0 to 7. Only the low four bits of `pin` are used.
    pub fn get_extended_it(&self, pin: u8) -> u32 {
        let pin = (pin & MAX_PIN) as usize;
        let shift = (pin % 4) * SELECTOR_BITS;
        let port = (self.afio.exticr[pin / 4].get() >> shift) & SELECTOR_MASK;
        port << 8 | pin as u32
    }

    fn selected_port(&self, line: usize) -> Option<PortId> {
        PortId::from_index((self.get_extended_it(line as u8) >> 8) as usize)
    }

    /// Acknowledge every pending line and notify their clients.
    pub fn handle_interrupt(&self) {
        let pending = unsafe {
            atomic(|| {
                let pending = self.registers.pr.get() & LINE_MASK;
                self.registers.pr.set(pending);
                pending
            })
        };

        for line in 0..LINE_COUNT {
            if pending & (1 << line) == 0 {
                continue;
            }
            if let Some(port) = self.selected_port(line) {
                self.clients[line].map(|client| client.fired(port, line as u8));
            }
        }
    }

    /// Service `irq` if it is one of the EXTI inputs.
    pub fn handle_irq(&self, irq: u32) -> bool {
        match irq {
            nvic::EXTI0..=nvic::EXTI4 | nvic::EXTI9_5 | nvic::EXTI15_10 => {
                self.handle_interrupt();
                true
            }
            _ => false,
        }
    }
}


#[cfg(test)]
mod tests {
    extern crate std;

    use super::testing::exti;
    use super::*;
    use crate::gpio::PinMode;
    use core::cell::Cell;

    #[test]
    fn lines_map_to_their_nvic_inputs() {
        for pin in 0..=4 {
            assert_eq!(resolve_irq_number(pin), 6 + pin as u32);
        }
        for pin in 5..=9 {
            assert_eq!(resolve_irq_number(pin), 23);
        }
        for pin in 10..=15 {
            assert_eq!(resolve_irq_number(pin), 40);
        }
        assert_eq!(resolve_irq_number(200), 40);
    }

    #[test]
    fn arming_a_line_programs_selector_edges_and_nvic() {
        let harness = exti();
        let config = PinConfig::new(6, PinMode::InputFloating).with_interrupt(true, false);

        assert_eq!(harness.exti.set_extended_it(PortId::D, &config), Ok(()));
        assert!(harness.gate.is_enabled(gate::AFIO));
        assert_eq!(harness.afio.exticr[1].get(), 3 << 8);
        assert_eq!(harness.lines.imr.get(), 1 << 6);
        assert_eq!(harness.lines.rtsr.get(), 1 << 6);
        assert_eq!(harness.lines.ftsr.get(), 0);
        assert!(harness.nvic.is_enabled(nvic::EXTI9_5));
        assert_eq!(harness.nvic.get_priority(nvic::EXTI9_5), 13);
        assert_eq!(harness.exti.get_extended_it(6), 0x0306);
    }

    #[test]
    fn a_second_port_evicts_the_first() {
        let harness = exti();
        let both = PinConfig::new(3, PinMode::InputPullUp).with_interrupt(true, true);
        let falling = PinConfig::new(3, PinMode::InputPullUp).with_interrupt(false, true);

        assert_eq!(harness.exti.set_extended_it(PortId::B, &both), Ok(()));
        assert_eq!(harness.exti.get_extended_it(3), 0x0103);
        assert_eq!(harness.exti.set_extended_it(PortId::C, &falling), Ok(()));
        assert_eq!(harness.exti.get_extended_it(3), 0x0203);
        assert_eq!(harness.afio.exticr[0].get(), 2 << 12);
        assert_eq!(harness.lines.rtsr.get(), 0);
        assert_eq!(harness.lines.ftsr.get(), 1 << 3);
    }

    #[test]
    fn neighbouring_selectors_are_preserved() {
        let harness = exti();
        harness.afio.exticr[3].set(0xFFFF);
        let config = PinConfig::new(13, PinMode::InputFloating).with_interrupt(true, true);

        assert_eq!(harness.exti.set_extended_it(PortId::A, &config), Ok(()));
        assert_eq!(harness.afio.exticr[3].get(), 0xFF0F);
        assert!(harness.nvic.is_enabled(nvic::EXTI15_10));
    }

    #[test]
    fn reset_disarms_but_keeps_the_selector() {
        let harness = exti();
        let config = PinConfig::new(2, PinMode::InputFloating).with_interrupt(true, true);
        assert_eq!(harness.exti.set_extended_it(PortId::E, &config), Ok(()));
        harness.lines.emr.set(1 << 2);

        assert_eq!(harness.exti.reset_extended_it(2), Ok(()));
        assert_eq!(harness.lines.imr.get(), 0);
        assert_eq!(harness.lines.emr.get(), 0);
        assert_eq!(harness.lines.rtsr.get(), 0);
        assert_eq!(harness.lines.ftsr.get(), 0);
        assert_eq!(harness.exti.get_extended_it(2), 0x0402);
    }

    #[test]
    fn out_of_range_lines_are_rejected() {
        let harness = exti();
        let config = PinConfig::new(16, PinMode::InputFloating).with_interrupt(true, true);

        assert_eq!(harness.exti.set_extended_it(PortId::A, &config), Err(ErrorCode::INVAL));
        assert!(!harness.gate.is_enabled(gate::AFIO));
        assert_eq!(harness.exti.reset_extended_it(16), Err(ErrorCode::INVAL));
        assert_eq!(harness.exti.mask_extended_it(20), Err(ErrorCode::INVAL));
        assert_eq!(harness.exti.unmask_extended_it(16), Err(ErrorCode::INVAL));
        assert_eq!(harness.exti.clear_pending_extended_it(16), Err(ErrorCode::INVAL));
        assert!(!harness.exti.is_pending(16));
    }

    #[test]
    fn mask_and_unmask_touch_one_bit() {
        let harness = exti();
        harness.lines.imr.set(0b1001);
        assert_eq!(harness.exti.mask_extended_it(3), Ok(()));
        assert_eq!(harness.lines.imr.get(), 0b0001);
        assert_eq!(harness.exti.unmask_extended_it(7), Ok(()));
        assert_eq!(harness.lines.imr.get(), 0b1000_0001);
    }

    struct Recorder {
        last: Cell<Option<(PortId, u8)>>,
        count: Cell<usize>,
    }

    impl ExtiClient for Recorder {
        fn fired(&self, port: PortId, line: u8) {
            self.last.set(Some((port, line)));
            self.count.set(self.count.get() + 1);
        }
    }

    #[test]
    fn pending_lines_are_acknowledged_and_dispatched() {
        let harness = exti();
        let recorder = recorder();
        let config = PinConfig::new(11, PinMode::InputPullDown).with_interrupt(true, false);
        assert_eq!(harness.exti.set_extended_it(PortId::B, &config), Ok(()));
        assert_eq!(harness.exti.set_client(11, recorder), Ok(()));
        assert_eq!(harness.exti.set_client(16, recorder), Err(ErrorCode::INVAL));

        // Line 17 (RTC alarm) is outside the GPIO lines and stays pending
        harness.lines.pr.set(1 << 11 | 1 << 4 | 1 << 17);
        assert!(harness.exti.is_pending(11));
        assert!(harness.exti.handle_irq(nvic::EXTI15_10));

        assert_eq!(recorder.last.get(), Some((PortId::B, 11)));
        assert_eq!(recorder.count.get(), 1);
        // The write-back carries exactly the acknowledged lines
        assert_eq!(harness.lines.pr.get(), 1 << 11 | 1 << 4);

        assert!(!harness.exti.handle_irq(nvic::DMA1_Channel1));
        assert_eq!(recorder.count.get(), 1);
    }

    fn recorder() -> &'static Recorder {
        std::boxed::Box::leak(std::boxed::Box::new(Recorder {
            last: Cell::new(None),
            count: Cell::new(0),
        }))
    }

    #[test]
    fn upper_lines_share_one_input_and_are_acknowledged_together() {
        let harness = exti();
        let (ten, twelve, fourteen) = (recorder(), recorder(), recorder());
        let rising = |pin| PinConfig::new(pin, PinMode::InputFloating).with_interrupt(true, false);

        assert_eq!(harness.exti.set_extended_it(PortId::A, &rising(10)), Ok(()));
        assert_eq!(harness.exti.set_extended_it(PortId::C, &rising(12)), Ok(()));
        assert_eq!(harness.exti.set_extended_it(PortId::E, &rising(14)), Ok(()));
        assert_eq!(harness.exti.set_client(10, ten), Ok(()));
        assert_eq!(harness.exti.set_client(12, twelve), Ok(()));
        assert_eq!(harness.exti.set_client(14, fourteen), Ok(()));

        // Only the one NVIC input is involved
        assert!(harness.nvic.is_enabled(nvic::EXTI15_10));
        assert!(!harness.nvic.is_enabled(nvic::EXTI9_5));

        harness.lines.pr.set(1 << 10 | 1 << 14);
        assert!(harness.exti.handle_irq(nvic::EXTI15_10));

        assert_eq!(ten.last.get(), Some((PortId::A, 10)));
        assert_eq!(fourteen.last.get(), Some((PortId::E, 14)));
        assert_eq!(ten.count.get(), 1);
        assert_eq!(fourteen.count.get(), 1);
        assert_eq!(twelve.count.get(), 0);
        // One write-back carrying a 1 for each serviced line
        assert_eq!(harness.lines.pr.get(), 1 << 10 | 1 << 14);
    }

    #[test]
    fn clear_pending_writes_the_line_bit() {
        let harness = exti();
        assert_eq!(harness.exti.clear_pending_extended_it(9), Ok(()));
        assert_eq!(harness.lines.pr.get(), 1 << 9);
    }
}
