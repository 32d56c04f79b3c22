// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! General purpose I/O ports.
//!
//! Each pin is configured by a 4-bit field (CNF and MODE together) in CRL
//! for pins 0 to 7 and CRH for pins 8 to 15. The input pull direction is not
//! part of that field: a pulled input is written as "input with pull" and the
//! ODR bit picks up (1) or down (0).
//!
//! ```rust,ignore
//! let button = PinConfig::new(13, PinMode::InputPullUp).with_interrupt(false, true);
//! gpio.init_pin(PortId::C, &button)?;
//! ```

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_structs, ReadOnly, ReadWrite, WriteOnly};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use crate::exti::Exti;
use crate::gate::{self, PeripheralGate, PeripheralHandle};

register_structs! {
    /// General purpose I/O port
    pub GpioRegisters {
        /// Port configuration register low (pins 0 to 7)
        (0x00 => crl: ReadWrite<u32>),
        /// Port configuration register high (pins 8 to 15)
        (0x04 => crh: ReadWrite<u32>),
        /// Port input data register
        (0x08 => idr: ReadOnly<u32>),
        /// Port output data register
        (0x0C => odr: ReadWrite<u32>),
        /// Port bit set/reset register
        (0x10 => bsrr: WriteOnly<u32>),
        /// Port bit reset register
        (0x14 => brr: WriteOnly<u32>),
        /// Port configuration lock register
        (0x18 => lckr: ReadWrite<u32>),
        (0x1C => @END),
    }
}

/// Distance between two port register blocks
const PORT_STRIDE: u32 = 0x400;

/// Ports A to G. Not every device bonds them all out; the gate refuses the
/// missing ones.
pub const PORT_COUNT: usize = 7;

/// Highest pin number of a port
pub const MAX_PIN: u8 = 15;

const MODE_FIELD_BITS: usize = 4;
const MODE_FIELD_MASK: u32 = 0xF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortId {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
}

impl PortId {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(PortId::A),
            1 => Some(PortId::B),
            2 => Some(PortId::C),
            3 => Some(PortId::D),
            4 => Some(PortId::E),
            5 => Some(PortId::F),
            6 => Some(PortId::G),
            _ => None,
        }
    }

    /// Port whose register block starts at `handle`.
    pub fn from_handle(handle: PeripheralHandle) -> Option<Self> {
        let offset = handle.address().checked_sub(gate::GPIOA.address())?;
        if offset % PORT_STRIDE != 0 {
            return None;
        }
        Self::from_index((offset / PORT_STRIDE) as usize)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn handle(self) -> PeripheralHandle {
        PeripheralHandle(gate::GPIOA.address() + PORT_STRIDE * self as u32)
    }
}

/// Pin configuration values, as written to the CRL/CRH field.
///
/// `InputPullUp` has no field value of its own; it is written as
/// `InputPullDown` with the ODR bit set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PinMode {
    Analog = 0x0,
    InputFloating = 0x4,
    InputPullDown = 0x8,
    InputPullUp = 0xC,
    OutputPushPull2Mhz = 0x2,
    OutputPushPull10Mhz = 0x1,
    OutputPushPull50Mhz = 0x3,
    OutputOpenDrain2Mhz = 0x6,
    OutputOpenDrain10Mhz = 0x5,
    OutputOpenDrain50Mhz = 0x7,
    AlternatePushPull2Mhz = 0xA,
    AlternatePushPull10Mhz = 0x9,
    AlternatePushPull50Mhz = 0xB,
    AlternateOpenDrain2Mhz = 0xE,
    AlternateOpenDrain10Mhz = 0xD,
    AlternateOpenDrain50Mhz = 0xF,
}

impl PinMode {
    /// Every 4-bit value names a mode.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0xF {
            0x0 => PinMode::Analog,
            0x4 => PinMode::InputFloating,
            0x8 => PinMode::InputPullDown,
            0xC => PinMode::InputPullUp,
            0x2 => PinMode::OutputPushPull2Mhz,
            0x1 => PinMode::OutputPushPull10Mhz,
            0x3 => PinMode::OutputPushPull50Mhz,
            0x6 => PinMode::OutputOpenDrain2Mhz,
            0x5 => PinMode::OutputOpenDrain10Mhz,
            0x7 => PinMode::OutputOpenDrain50Mhz,
            0xA => PinMode::AlternatePushPull2Mhz,
            0x9 => PinMode::AlternatePushPull10Mhz,
            0xB => PinMode::AlternatePushPull50Mhz,
            0xE => PinMode::AlternateOpenDrain2Mhz,
            0xD => PinMode::AlternateOpenDrain10Mhz,
            _ => PinMode::AlternateOpenDrain50Mhz,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Digital inputs are the only modes that can be routed to EXTI.
    pub fn accepts_interrupt(self) -> bool {
        matches!(
            self,
            PinMode::InputFloating | PinMode::InputPullDown | PinMode::InputPullUp
        )
    }
}

const CONFIG_MODE_MASK: u32 = 0x0F;
const CONFIG_INTERRUPT: u32 = 1 << 4;
const CONFIG_RISING: u32 = 1 << 5;
const CONFIG_FALLING: u32 = 1 << 6;
const CONFIG_PIN_SHIFT: u32 = 24;

/// Everything needed to set up one pin.
///
/// The packed 32-bit form keeps the mode in bits 0 to 3, the interrupt,
/// rising and falling flags in bits 4, 5 and 6, and the pin number in bits
/// 24 to 31.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinConfig {
    pub mode: PinMode,
    /// Route the pin to its EXTI line. Ignored unless the mode is a digital
    /// input.
    pub interrupt: bool,
    pub rising: bool,
    pub falling: bool,
    pub pin: u8,
}

impl PinConfig {
    pub const fn new(pin: u8, mode: PinMode) -> Self {
        Self {
            mode,
            interrupt: false,
            rising: false,
            falling: false,
            pin,
        }
    }

    pub const fn with_interrupt(self, rising: bool, falling: bool) -> Self {
        Self {
            interrupt: true,
            rising,
            falling,
            ..self
        }
    }

    pub fn encode(&self) -> u32 {
        let mut word = self.mode.bits() as u32;
        if self.interrupt {
            word |= CONFIG_INTERRUPT;
        }
        if self.rising {
            word |= CONFIG_RISING;
        }
        if self.falling {
            word |= CONFIG_FALLING;
        }
        word | (self.pin as u32) << CONFIG_PIN_SHIFT
    }

    /// Bits 7 to 23 are ignored.
    pub fn decode(word: u32) -> Self {
        Self {
            mode: PinMode::from_bits((word & CONFIG_MODE_MASK) as u8),
            interrupt: word & CONFIG_INTERRUPT != 0,
            rising: word & CONFIG_RISING != 0,
            falling: word & CONFIG_FALLING != 0,
            pin: (word >> CONFIG_PIN_SHIFT) as u8,
        }
    }
}

impl From<PinConfig> for u32 {
    fn from(config: PinConfig) -> u32 {
        config.encode()
    }
}

impl From<u32> for PinConfig {
    fn from(word: u32) -> Self {
        PinConfig::decode(word)
    }
}

pub struct Gpio<'a> {
    ports: [StaticRef<GpioRegisters>; PORT_COUNT],
    gate: &'a PeripheralGate<'a>,
    exti: &'a Exti<'a>,
}

impl<'a> Gpio<'a> {
    pub fn new(gate: &'a PeripheralGate<'a>, exti: &'a Exti<'a>) -> Self {
        let ports = [
            PortId::A,
            PortId::B,
            PortId::C,
            PortId::D,
            PortId::E,
            PortId::F,
            PortId::G,
        ]
        .map(|port| unsafe { StaticRef::new(port.handle().address() as *const GpioRegisters) });
        Self::with_registers(ports, gate, exti)
    }

    pub(crate) fn with_registers(
        ports: [StaticRef<GpioRegisters>; PORT_COUNT],
        gate: &'a PeripheralGate<'a>,
        exti: &'a Exti<'a>,
    ) -> Self {
        Self { ports, gate, exti }
    }

    fn registers(&self, port: PortId) -> &GpioRegisters {
        &self.ports[port.index()]
    }

    /// Turn on the APB2 clock of `port`.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::NODEVICE]\): the device has no such port.
    pub fn port_clock_on(&self, port: PortId) -> Result<(), ErrorCode> {
        self.gate.enable(port.handle())
    }

    /// Configure one pin, and its external interrupt when requested.
    ///
    /// The 4-bit field and the ODR bit of the pin are cleared before the new
    /// mode is written. The interrupt request is silently dropped for modes
    /// other than the digital inputs.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): pin number above 15. Nothing is
    ///   touched.
    /// + [Err]\([ErrorCode::NODEVICE]\): the device has no such port.
    pub fn init_pin(&self, port: PortId, config: &PinConfig) -> Result<(), ErrorCode> {
        if config.pin > MAX_PIN {
            return Err(ErrorCode::INVAL);
        }
        self.port_clock_on(port)?;

        let registers = self.registers(port);
        let pin = config.pin as usize;
        let (field_register, slot) = if pin < 8 {
            (&registers.crl, pin)
        } else {
            (&registers.crh, pin - 8)
        };
        let shift = slot * MODE_FIELD_BITS;
        let pin_bit = 1u32 << pin;

        field_register.set(field_register.get() & !(MODE_FIELD_MASK << shift));
        registers.odr.set(registers.odr.get() & !pin_bit);

        let mode = match config.mode {
            PinMode::InputPullUp => {
                registers.odr.set(registers.odr.get() | pin_bit);
                PinMode::InputPullDown
            }
            mode => mode,
        };
        field_register.set(field_register.get() | (mode.bits() as u32) << shift);

        if config.interrupt && config.mode.accepts_interrupt() {
            self.exti.set_extended_it(port, config)?;
        }

        Ok(())
    }

    /// Drive an output pin through the atomic set/reset register.
    pub fn set_output(&self, port: PortId, pin: u8, high: bool) -> Result<(), ErrorCode> {
        if pin > MAX_PIN {
            return Err(ErrorCode::INVAL);
        }
        let registers = self.registers(port);
        if high {
            registers.bsrr.set(1 << pin);
        } else {
            registers.brr.set(1 << pin);
        }
        Ok(())
    }

    /// Level seen on the pin. Pins above 15 read low.
    pub fn read_input(&self, port: PortId, pin: u8) -> bool {
        pin <= MAX_PIN && self.registers(port).idr.get() & (1 << pin) != 0
    }
}


#[cfg(test)]
mod tests {
    extern crate std;

    use super::testing::leak_ports;
    use super::*;
    use crate::exti::testing::{exti, Harness};

    fn gpio(harness: &'static Harness) -> (Gpio<'static>, [*mut u32; PORT_COUNT]) {
        let (ports, words) = leak_ports();
        (Gpio::with_registers(ports, harness.gate, harness.exti), words)
    }

    #[test]
    fn packed_config_layout() {
        let config = PinConfig::new(13, PinMode::InputPullUp).with_interrupt(false, true);
        assert_eq!(config.encode(), 0x0D00_005C);
        assert_eq!(PinConfig::decode(0x0D00_005C), config);
        // Reserved bits are dropped
        assert_eq!(PinConfig::decode(0x0D7F_FF8C), PinConfig::new(13, PinMode::InputPullUp));
        assert_eq!(u32::from(PinConfig::new(2, PinMode::OutputPushPull50Mhz)), 0x0200_0003);
    }

    #[test]
    fn every_nibble_decodes_to_its_mode() {
        for bits in 0..16u8 {
            assert_eq!(PinMode::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn port_handles_step_by_the_register_stride() {
        assert_eq!(PortId::A.handle(), gate::GPIOA);
        assert_eq!(PortId::C.handle(), gate::GPIOC);
        assert_eq!(PortId::G.handle(), gate::GPIOG);
        assert_eq!(PortId::from_handle(gate::GPIOE), Some(PortId::E));
        assert_eq!(PortId::from_handle(gate::AFIO), None);
        assert_eq!(PortId::from_handle(PeripheralHandle(0x4001_0A00)), None);
        assert_eq!(PortId::from_handle(PeripheralHandle(0x4001_2400)), None);
    }

    #[test]
    fn pull_up_is_written_as_pull_down_with_the_odr_bit() {
        let harness = exti();
        let (gpio, _) = gpio(harness);
        let registers = gpio.registers(PortId::A);
        registers.crl.set(0xFFFF_FFFF);

        assert_eq!(gpio.init_pin(PortId::A, &PinConfig::new(5, PinMode::InputPullUp)), Ok(()));
        assert_eq!((registers.crl.get() >> 20) & 0xF, 0x8);
        assert_eq!(registers.crl.get() | (0xF << 20), 0xFFFF_FFFF);
        assert_eq!(registers.odr.get(), 1 << 5);
        assert!(harness.gate.is_enabled(gate::GPIOA));

        // Switching to pull-down clears the ODR bit again
        assert_eq!(gpio.init_pin(PortId::A, &PinConfig::new(5, PinMode::InputPullDown)), Ok(()));
        assert_eq!((registers.crl.get() >> 20) & 0xF, 0x8);
        assert_eq!(registers.odr.get(), 0);
    }

    #[test]
    fn high_pins_use_crh() {
        let harness = exti();
        let (gpio, _) = gpio(harness);
        let registers = gpio.registers(PortId::B);

        let config = PinConfig::new(12, PinMode::AlternatePushPull50Mhz);
        assert_eq!(gpio.init_pin(PortId::B, &config), Ok(()));
        assert_eq!(registers.crh.get(), 0xB << 16);
        assert_eq!(registers.crl.get(), 0);
    }

    #[test]
    fn out_of_range_pins_touch_nothing() {
        let harness = exti();
        let (gpio, _) = gpio(harness);

        assert_eq!(
            gpio.init_pin(PortId::A, &PinConfig::new(16, PinMode::OutputPushPull2Mhz)),
            Err(ErrorCode::INVAL)
        );
        assert!(!harness.gate.is_enabled(gate::GPIOA));
        assert_eq!(gpio.registers(PortId::A).crh.get(), 0);
        assert_eq!(gpio.set_output(PortId::A, 16, true), Err(ErrorCode::INVAL));
    }

    #[cfg(not(feature = "stm32f103xe"))]
    #[test]
    fn ports_missing_from_the_device_are_refused() {
        let harness = exti();
        let (gpio, _) = gpio(harness);
        assert_eq!(
            gpio.init_pin(PortId::F, &PinConfig::new(0, PinMode::InputFloating)),
            Err(ErrorCode::NODEVICE)
        );
    }

    #[test]
    fn interrupt_requests_only_apply_to_digital_inputs() {
        let harness = exti();
        let (gpio, _) = gpio(harness);

        let output = PinConfig::new(4, PinMode::OutputPushPull2Mhz).with_interrupt(true, false);
        assert_eq!(gpio.init_pin(PortId::B, &output), Ok(()));
        assert!(!harness.gate.is_enabled(gate::AFIO));
        assert_eq!(harness.exti.get_extended_it(4), 4);

        let input = PinConfig::new(4, PinMode::InputFloating).with_interrupt(true, false);
        assert_eq!(gpio.init_pin(PortId::B, &input), Ok(()));
        assert!(harness.gate.is_enabled(gate::AFIO));
        assert_eq!(harness.exti.get_extended_it(4), 0x0104);
    }

    #[test]
    fn outputs_go_through_set_and_reset_registers() {
        let harness = exti();
        let (gpio, words) = gpio(harness);
        let port = words[PortId::C.index()];

        assert_eq!(gpio.set_output(PortId::C, 13, true), Ok(()));
        assert_eq!(unsafe { core::ptr::read_volatile(port.add(4)) }, 1 << 13);
        assert_eq!(gpio.set_output(PortId::C, 13, false), Ok(()));
        assert_eq!(unsafe { core::ptr::read_volatile(port.add(5)) }, 1 << 13);

        unsafe { core::ptr::write_volatile(port.add(2), 1 << 7) };
        assert!(gpio.read_input(PortId::C, 7));
        assert!(!gpio.read_input(PortId::C, 6));
        assert!(!gpio.read_input(PortId::C, 40));
    }
}
