// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Bus clock gating by peripheral identity.
//!
//! A peripheral is named by the base address of its register block. Each
//! recognised address maps to one bit in one of AHBENR, APB1ENR and APB2ENR.
//! The table is fixed at compile time by the device variant feature;
//! peripherals the variant lacks are absent from it and behave like any other
//! unknown address.
//!
//! Gating two peripherals on the same bus is a read-modify-write of a shared
//! register. Callers serialise it (init code, or interrupts masked).
//!
//! ```rust,ignore
//! let gate = PeripheralGate::new(&rcc);
//! gate.enable(gate::USART1)?;
//! assert!(gate.is_enabled(gate::USART1));
//! ```

use crate::rcc::PeripheralBus::{AHB, APB1, APB2};
use crate::rcc::{PeripheralBus, Rcc};

use kernel::platform::chip::ClockInterface;
use kernel::ErrorCode;

/// Base address of a peripheral register block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeripheralHandle(pub u32);

impl PeripheralHandle {
    pub const fn address(self) -> u32 {
        self.0
    }
}

// APB1
pub const TIM2: PeripheralHandle = PeripheralHandle(0x4000_0000);
pub const TIM3: PeripheralHandle = PeripheralHandle(0x4000_0400);
pub const TIM4: PeripheralHandle = PeripheralHandle(0x4000_0800);
pub const TIM5: PeripheralHandle = PeripheralHandle(0x4000_0C00);
pub const TIM6: PeripheralHandle = PeripheralHandle(0x4000_1000);
pub const TIM7: PeripheralHandle = PeripheralHandle(0x4000_1400);
pub const WWDG: PeripheralHandle = PeripheralHandle(0x4000_2C00);
pub const SPI2: PeripheralHandle = PeripheralHandle(0x4000_3800);
pub const SPI3: PeripheralHandle = PeripheralHandle(0x4000_3C00);
pub const USART2: PeripheralHandle = PeripheralHandle(0x4000_4400);
pub const USART3: PeripheralHandle = PeripheralHandle(0x4000_4800);
pub const UART4: PeripheralHandle = PeripheralHandle(0x4000_4C00);
pub const UART5: PeripheralHandle = PeripheralHandle(0x4000_5000);
pub const I2C1: PeripheralHandle = PeripheralHandle(0x4000_5400);
pub const I2C2: PeripheralHandle = PeripheralHandle(0x4000_5800);
pub const USB: PeripheralHandle = PeripheralHandle(0x4000_5C00);
pub const CAN1: PeripheralHandle = PeripheralHandle(0x4000_6400);
pub const CAN2: PeripheralHandle = PeripheralHandle(0x4000_6800);
pub const BKP: PeripheralHandle = PeripheralHandle(0x4000_6C00);
pub const PWR: PeripheralHandle = PeripheralHandle(0x4000_7000);
pub const DAC: PeripheralHandle = PeripheralHandle(0x4000_7400);

// APB2
pub const AFIO: PeripheralHandle = PeripheralHandle(0x4001_0000);
pub const GPIOA: PeripheralHandle = PeripheralHandle(0x4001_0800);
pub const GPIOB: PeripheralHandle = PeripheralHandle(0x4001_0C00);
pub const GPIOC: PeripheralHandle = PeripheralHandle(0x4001_1000);
pub const GPIOD: PeripheralHandle = PeripheralHandle(0x4001_1400);
pub const GPIOE: PeripheralHandle = PeripheralHandle(0x4001_1800);
pub const GPIOF: PeripheralHandle = PeripheralHandle(0x4001_1C00);
pub const GPIOG: PeripheralHandle = PeripheralHandle(0x4001_2000);
pub const ADC1: PeripheralHandle = PeripheralHandle(0x4001_2400);
pub const ADC2: PeripheralHandle = PeripheralHandle(0x4001_2800);
pub const TIM1: PeripheralHandle = PeripheralHandle(0x4001_2C00);
pub const SPI1: PeripheralHandle = PeripheralHandle(0x4001_3000);
pub const TIM8: PeripheralHandle = PeripheralHandle(0x4001_3400);
pub const USART1: PeripheralHandle = PeripheralHandle(0x4001_3800);
pub const ADC3: PeripheralHandle = PeripheralHandle(0x4001_3C00);

// AHB
pub const SRAM: PeripheralHandle = PeripheralHandle(0x2000_0000);
pub const DMA1: PeripheralHandle = PeripheralHandle(0x4002_0000);
pub const DMA2: PeripheralHandle = PeripheralHandle(0x4002_0400);
pub const FLITF: PeripheralHandle = PeripheralHandle(0x4002_2000);
pub const CRC: PeripheralHandle = PeripheralHandle(0x4002_3000);
pub const ETHMAC: PeripheralHandle = PeripheralHandle(0x4002_8000);
// The MAC transmit and receive clocks have no register block of their own.
// They are named by the Ethernet DMA descriptor list address registers.
pub const ETHMACRX: PeripheralHandle = PeripheralHandle(0x4002_900C);
pub const ETHMACTX: PeripheralHandle = PeripheralHandle(0x4002_9010);
pub const OTG_FS: PeripheralHandle = PeripheralHandle(0x5000_0000);

struct GateEntry {
    handle: PeripheralHandle,
    bus: PeripheralBus,
    bit: u8,
}

const fn entry(handle: PeripheralHandle, bus: PeripheralBus, bit: u8) -> GateEntry {
    GateEntry { handle, bus, bit }
}

// Present on every supported device
const COMMON: &[GateEntry] = &[
    entry(TIM2, APB1, 0),
    entry(TIM3, APB1, 1),
    entry(TIM4, APB1, 2),
    entry(WWDG, APB1, 11),
    entry(SPI2, APB1, 14),
    entry(USART2, APB1, 17),
    entry(USART3, APB1, 18),
    entry(I2C1, APB1, 21),
    entry(I2C2, APB1, 22),
    entry(CAN1, APB1, 25),
    entry(BKP, APB1, 27),
    entry(PWR, APB1, 28),
    entry(AFIO, APB2, 0),
    entry(GPIOA, APB2, 2),
    entry(GPIOB, APB2, 3),
    entry(GPIOC, APB2, 4),
    entry(GPIOD, APB2, 5),
    entry(GPIOE, APB2, 6),
    entry(ADC1, APB2, 9),
    entry(ADC2, APB2, 10),
    entry(TIM1, APB2, 11),
    entry(SPI1, APB2, 12),
    entry(USART1, APB2, 14),
    entry(DMA1, AHB, 0),
    entry(SRAM, AHB, 2),
    entry(FLITF, AHB, 4),
    entry(CRC, AHB, 6),
];

// High density and connectivity line
#[cfg(any(feature = "stm32f103xe", feature = "stm32f107xc"))]
const EXTENDED: &[GateEntry] = &[
    entry(TIM5, APB1, 3),
    entry(TIM6, APB1, 4),
    entry(TIM7, APB1, 5),
    entry(SPI3, APB1, 15),
    entry(UART4, APB1, 19),
    entry(UART5, APB1, 20),
    entry(DAC, APB1, 29),
    entry(DMA2, AHB, 1),
];
#[cfg(not(any(feature = "stm32f103xe", feature = "stm32f107xc")))]
const EXTENDED: &[GateEntry] = &[];

// The connectivity line replaces the USB device block with OTG FS
#[cfg(not(feature = "stm32f107xc"))]
const USB_DEVICE: &[GateEntry] = &[entry(USB, APB1, 23)];
#[cfg(feature = "stm32f107xc")]
const USB_DEVICE: &[GateEntry] = &[];

#[cfg(feature = "stm32f103xe")]
const HIGH_DENSITY: &[GateEntry] = &[
    entry(GPIOF, APB2, 7),
    entry(GPIOG, APB2, 8),
    entry(TIM8, APB2, 13),
    entry(ADC3, APB2, 15),
];
#[cfg(not(feature = "stm32f103xe"))]
const HIGH_DENSITY: &[GateEntry] = &[];

#[cfg(feature = "stm32f107xc")]
const CONNECTIVITY: &[GateEntry] = &[
    entry(CAN2, APB1, 26),
    entry(OTG_FS, AHB, 12),
    entry(ETHMAC, AHB, 14),
    entry(ETHMACTX, AHB, 15),
    entry(ETHMACRX, AHB, 16),
];
#[cfg(not(feature = "stm32f107xc"))]
const CONNECTIVITY: &[GateEntry] = &[];

const TABLE: [&[GateEntry]; 5] = [COMMON, EXTENDED, USB_DEVICE, HIGH_DENSITY, CONNECTIVITY];

fn entries() -> impl Iterator<Item = &'static GateEntry> {
    TABLE.into_iter().flatten()
}

/// Gating register and bit mask for `handle`, if this device has it.
pub fn lookup(handle: PeripheralHandle) -> Option<(PeripheralBus, u32)> {
    entries()
        .find(|entry| entry.handle == handle)
        .map(|entry| (entry.bus, 1 << entry.bit))
}

/// Every peripheral this device variant can gate.
pub fn handles() -> impl Iterator<Item = PeripheralHandle> {
    entries().map(|entry| entry.handle)
}

pub struct PeripheralGate<'a> {
    rcc: &'a Rcc,
}

impl<'a> PeripheralGate<'a> {
    pub const fn new(rcc: &'a Rcc) -> Self {
        Self { rcc }
    }

    /// Turn on the bus clock of `handle`.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::NODEVICE]\): `handle` is not a peripheral of this
    ///   device. No register is touched.
    pub fn enable(&self, handle: PeripheralHandle) -> Result<(), ErrorCode> {
        let (bus, mask) = lookup(handle).ok_or(ErrorCode::NODEVICE)?;
        self.rcc.enable_peripheral_clock(bus, mask);
        Ok(())
    }

    /// Turn off the bus clock of `handle`. Same errors as [Self::enable].
    pub fn disable(&self, handle: PeripheralHandle) -> Result<(), ErrorCode> {
        let (bus, mask) = lookup(handle).ok_or(ErrorCode::NODEVICE)?;
        self.rcc.disable_peripheral_clock(bus, mask);
        Ok(())
    }

    /// Unknown handles read as disabled.
    pub fn is_enabled(&self, handle: PeripheralHandle) -> bool {
        lookup(handle)
            .map(|(bus, mask)| self.rcc.is_enabled_peripheral_clock(bus, mask))
            .unwrap_or(false)
    }
}

/// The bus clock of one peripheral, for drivers that take a [ClockInterface].
pub struct PeripheralClock<'a> {
    rcc: &'a Rcc,
    bus: PeripheralBus,
    mask: u32,
}

impl<'a> PeripheralClock<'a> {
    /// None when `handle` is not a peripheral of this device.
    pub fn new(handle: PeripheralHandle, rcc: &'a Rcc) -> Option<Self> {
        lookup(handle).map(|(bus, mask)| Self { rcc, bus, mask })
    }

    pub fn bus(&self) -> PeripheralBus {
        self.bus
    }
}

impl ClockInterface for PeripheralClock<'_> {
    fn is_enabled(&self) -> bool {
        self.rcc.is_enabled_peripheral_clock(self.bus, self.mask)
    }

    fn enable(&self) {
        self.rcc.enable_peripheral_clock(self.bus, self.mask);
    }

    fn disable(&self) {
        self.rcc.disable_peripheral_clock(self.bus, self.mask);
    }
}
