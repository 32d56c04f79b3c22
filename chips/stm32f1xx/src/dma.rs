// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! DMA channel manager.
//!
//! DMA1 has seven channels. High density and connectivity line devices add
//! DMA2 with five more, numbered 7 to 11 here. A channel is named by the base
//! address of its register group (CCR first) and resolved through a static
//! table to its index and IRQ line.
//!
//! A channel is idle while CCR.EN is clear. [`Dma::move_bytes`] arms it and
//! returns at once. Completion (TC) or error (TE) is then observed either by
//! polling with [`Dma::wait_channel_free`] or from the channel interrupt
//! through [`Dma::handle_interrupt`]; both clear the flags and disarm the
//! channel.
//!
//! The status register is shared by every channel of a controller. Each
//! channel owns four bits at `4 * local_index`: GIF, TCIF, HTIF and TEIF.

use kernel::utilities::cells::OptionalCell;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{
    register_bitfields, register_structs, ReadOnly, ReadWrite, WriteOnly,
};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use crate::gate::PeripheralHandle;
use crate::nvic;
use crate::spin::{self, WaitPolicy};

register_structs! {
    /// One DMA channel
    pub DmaChannelRegisters {
        /// Channel configuration register
        (0x00 => ccr: ReadWrite<u32, CCR::Register>),
        /// Channel number of data register
        (0x04 => cndtr: ReadWrite<u32>),
        /// Channel peripheral address register
        (0x08 => cpar: ReadWrite<u32>),
        /// Channel memory address register
        (0x0C => cmar: ReadWrite<u32>),
        (0x10 => _reserved0),
        (0x14 => @END),
    }
}

register_structs! {
    /// DMA controller
    pub DmaRegisters {
        /// Interrupt status register
        (0x00 => isr: ReadOnly<u32>),
        /// Interrupt flag clear register
        (0x04 => ifcr: WriteOnly<u32>),
        (0x08 => channels: [DmaChannelRegisters; 7]),
        (0x94 => @END),
    }
}

register_bitfields![u32,
    CCR [
        /// Memory to memory mode
        MEM2MEM OFFSET(14) NUMBITS(1) [],
        /// Channel priority level
        PL OFFSET(12) NUMBITS(2) [
            Low = 0b00,
            Medium = 0b01,
            High = 0b10,
            VeryHigh = 0b11
        ],
        /// Memory size
        MSIZE OFFSET(10) NUMBITS(2) [
            Bits8 = 0b00,
            Bits16 = 0b01,
            Bits32 = 0b10
        ],
        /// Peripheral size
        PSIZE OFFSET(8) NUMBITS(2) [
            Bits8 = 0b00,
            Bits16 = 0b01,
            Bits32 = 0b10
        ],
        /// Memory increment mode
        MINC OFFSET(7) NUMBITS(1) [],
        /// Peripheral increment mode
        PINC OFFSET(6) NUMBITS(1) [],
        /// Circular mode
        CIRC OFFSET(5) NUMBITS(1) [],
        /// Data transfer direction
        DIR OFFSET(4) NUMBITS(1) [
            FromPeripheral = 0,
            FromMemory = 1
        ],
        /// Transfer error interrupt enable
        TEIE OFFSET(3) NUMBITS(1) [],
        /// Half transfer interrupt enable
        HTIE OFFSET(2) NUMBITS(1) [],
        /// Transfer complete interrupt enable
        TCIE OFFSET(1) NUMBITS(1) [],
        /// Channel enable
        EN OFFSET(0) NUMBITS(1) []
    ]
];

/// Global interrupt flag. Status only; it has no enable bit.
pub const GLOBAL: u32 = 1 << 0;
/// Transfer complete
pub const TRANSFER_COMPLETE: u32 = 1 << 1;
/// Half transfer
pub const HALF_TRANSFER: u32 = 1 << 2;
/// Transfer error
pub const TRANSFER_ERROR: u32 = 1 << 3;

// Flags that have an enable bit in CCR
const ENABLE_MASK: u32 = TRANSFER_COMPLETE | HALF_TRANSFER | TRANSFER_ERROR;
// A channel's slice of ISR and IFCR
const STATUS_MASK: u32 = 0x0F;
const STATUS_BITS: usize = 4;

const CHANNELS_PER_CONTROLLER: usize = 7;

pub const DMA1_BASE: StaticRef<DmaRegisters> =
    unsafe { StaticRef::new(0x4002_0000 as *const DmaRegisters) };
pub const DMA2_BASE: StaticRef<DmaRegisters> =
    unsafe { StaticRef::new(0x4002_0400 as *const DmaRegisters) };

pub const DMA1_CHANNEL1: PeripheralHandle = PeripheralHandle(0x4002_0008);
pub const DMA1_CHANNEL2: PeripheralHandle = PeripheralHandle(0x4002_001C);
pub const DMA1_CHANNEL3: PeripheralHandle = PeripheralHandle(0x4002_0030);
pub const DMA1_CHANNEL4: PeripheralHandle = PeripheralHandle(0x4002_0044);
pub const DMA1_CHANNEL5: PeripheralHandle = PeripheralHandle(0x4002_0058);
pub const DMA1_CHANNEL6: PeripheralHandle = PeripheralHandle(0x4002_006C);
pub const DMA1_CHANNEL7: PeripheralHandle = PeripheralHandle(0x4002_0080);
pub const DMA2_CHANNEL1: PeripheralHandle = PeripheralHandle(0x4002_0408);
pub const DMA2_CHANNEL2: PeripheralHandle = PeripheralHandle(0x4002_041C);
pub const DMA2_CHANNEL3: PeripheralHandle = PeripheralHandle(0x4002_0430);
pub const DMA2_CHANNEL4: PeripheralHandle = PeripheralHandle(0x4002_0444);
pub const DMA2_CHANNEL5: PeripheralHandle = PeripheralHandle(0x4002_0458);

#[cfg(feature = "stm32f107xc")]
const DMA2_CHANNEL5_IRQ: u32 = nvic::DMA2_Channel5;
#[cfg(not(feature = "stm32f107xc"))]
const DMA2_CHANNEL5_IRQ: u32 = nvic::DMA2_Channel4_5;

const DMA1_CHANNELS: [(PeripheralHandle, u32); 7] = [
    (DMA1_CHANNEL1, nvic::DMA1_Channel1),
    (DMA1_CHANNEL2, nvic::DMA1_Channel2),
    (DMA1_CHANNEL3, nvic::DMA1_Channel3),
    (DMA1_CHANNEL4, nvic::DMA1_Channel4),
    (DMA1_CHANNEL5, nvic::DMA1_Channel5),
    (DMA1_CHANNEL6, nvic::DMA1_Channel6),
    (DMA1_CHANNEL7, nvic::DMA1_Channel7),
];

#[cfg(any(feature = "stm32f103xe", feature = "stm32f107xc"))]
const DMA2_CHANNELS: &[(PeripheralHandle, u32)] = &[
    (DMA2_CHANNEL1, nvic::DMA2_Channel1),
    (DMA2_CHANNEL2, nvic::DMA2_Channel2),
    (DMA2_CHANNEL3, nvic::DMA2_Channel3),
    (DMA2_CHANNEL4, nvic::DMA2_Channel4_5),
    (DMA2_CHANNEL5, DMA2_CHANNEL5_IRQ),
];
#[cfg(not(any(feature = "stm32f103xe", feature = "stm32f107xc")))]
const DMA2_CHANNELS: &[(PeripheralHandle, u32)] = &[];

/// Number of DMA controllers on this device
pub const CONTROLLER_COUNT: usize = if DMA2_CHANNELS.is_empty() { 1 } else { 2 };

/// Number of DMA channels on this device
pub const CHANNEL_COUNT: usize = DMA1_CHANNELS.len() + DMA2_CHANNELS.len();

fn channel_entry(index: usize) -> Option<(PeripheralHandle, u32)> {
    if index < CHANNELS_PER_CONTROLLER {
        Some(DMA1_CHANNELS[index])
    } else {
        DMA2_CHANNELS.get(index - CHANNELS_PER_CONTROLLER).copied()
    }
}

/// A DMA channel known to exist on this device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaChannel {
    index: usize,
}

impl DmaChannel {
    /// Channel by global index: 0 to 6 on DMA1, 7 to 11 on DMA2.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < CHANNEL_COUNT).then_some(Self { index })
    }

    pub fn index(self) -> usize {
        self.index
    }

    /// 0 for DMA1, 1 for DMA2
    pub fn controller(self) -> usize {
        self.index / CHANNELS_PER_CONTROLLER
    }

    /// Position within its controller, which also locates its status bits
    pub fn local_index(self) -> usize {
        self.index % CHANNELS_PER_CONTROLLER
    }

    pub fn handle(self) -> PeripheralHandle {
        channel_entry(self.index).map_or(PeripheralHandle(0), |(handle, _)| handle)
    }

    pub fn irq(self) -> u32 {
        channel_entry(self.index).map_or(0, |(_, irq)| irq)
    }

    fn status_shift(self) -> usize {
        STATUS_BITS * self.local_index()
    }
}

/// Channel and IRQ line for a channel register group address.
pub fn resolve_channel(handle: PeripheralHandle) -> Option<(DmaChannel, u32)> {
    (0..CHANNEL_COUNT).find_map(|index| {
        let (entry_handle, irq) = channel_entry(index)?;
        (entry_handle == handle).then_some((DmaChannel { index }, irq))
    })
}

/// Notified from [Dma::handle_interrupt] when an armed channel finishes.
pub trait DmaClient {
    /// `result` is `Err(ErrorCode::FAIL)` when the transfer error flag was
    /// raised.
    fn transfer_done(&self, channel: DmaChannel, result: Result<(), ErrorCode>);
}

pub struct Dma<'a> {
    controllers: [StaticRef<DmaRegisters>; CONTROLLER_COUNT],
    clients: [OptionalCell<&'a dyn DmaClient>; CHANNEL_COUNT],
}

impl<'a> Dma<'a> {
    pub const fn new() -> Self {
        #[cfg(any(feature = "stm32f103xe", feature = "stm32f107xc"))]
        let controllers = [DMA1_BASE, DMA2_BASE];
        #[cfg(not(any(feature = "stm32f103xe", feature = "stm32f107xc")))]
        let controllers = [DMA1_BASE];
        Self::with_registers(controllers)
    }

    pub(crate) const fn with_registers(
        controllers: [StaticRef<DmaRegisters>; CONTROLLER_COUNT],
    ) -> Self {
        Self {
            controllers,
            clients: [const { OptionalCell::empty() }; CHANNEL_COUNT],
        }
    }

    fn controller(&self, channel: DmaChannel) -> &DmaRegisters {
        &self.controllers[channel.controller()]
    }

    fn channel_registers(&self, channel: DmaChannel) -> &DmaChannelRegisters {
        &self.controller(channel).channels[channel.local_index()]
    }

    pub fn set_client(&self, channel: DmaChannel, client: &'a dyn DmaClient) {
        self.clients[channel.index()].set(client);
    }

    /// Set or clear the interrupt enables in `flags` (HT, TC, TE; other bits
    /// are ignored).
    pub fn set_interrupt_flags(&self, channel: DmaChannel, flags: u32, enabled: bool) {
        let ccr = &self.channel_registers(channel).ccr;
        let flags = flags & ENABLE_MASK;
        if enabled {
            ccr.set(ccr.get() | flags);
        } else {
            ccr.set(ccr.get() & !flags);
        }
    }

    pub fn enable_interrupts(&self, channel: DmaChannel, flags: u32) {
        self.set_interrupt_flags(channel, flags, true);
    }

    pub fn disable_interrupts(&self, channel: DmaChannel, flags: u32) {
        self.set_interrupt_flags(channel, flags, false);
    }

    /// Whether any of `flags` (GIF, TC, HT, TE) is raised for `channel`.
    pub fn check_interrupts(&self, channel: DmaChannel, flags: u32) -> bool {
        let status = self.controller(channel).isr.get() >> channel.status_shift();
        status & flags & STATUS_MASK != 0
    }

    pub fn clear_interrupts(&self, channel: DmaChannel, flags: u32) {
        self.controller(channel)
            .ifcr
            .set((flags & STATUS_MASK) << channel.status_shift());
    }

    pub fn clear_all_interrupts(&self, channel: DmaChannel) {
        self.clear_interrupts(channel, STATUS_MASK);
    }

    /// A transfer is programmed and has not been reaped yet.
    pub fn is_armed(&self, channel: DmaChannel) -> bool {
        self.channel_registers(channel).ccr.is_set(CCR::EN)
    }

    /// Items left to move on `channel`.
    pub fn remaining(&self, channel: DmaChannel) -> u16 {
        self.channel_registers(channel).cndtr.get() as u16
    }

    fn disarm(&self, channel: DmaChannel) {
        self.channel_registers(channel).ccr.modify(CCR::EN::CLEAR);
    }

    // Flags cleared and channel disarmed; error reported if TE was set
    fn reap(&self, channel: DmaChannel) -> Result<(), ErrorCode> {
        let failed = self.check_interrupts(channel, TRANSFER_ERROR);
        self.clear_all_interrupts(channel);
        self.disarm(channel);
        if failed {
            Err(ErrorCode::FAIL)
        } else {
            Ok(())
        }
    }

    fn wait_channel_free_with(
        &self,
        channel: DmaChannel,
        policy: WaitPolicy,
    ) -> Result<(), ErrorCode> {
        if !self.is_armed(channel) {
            return Ok(());
        }

        spin::wait_for(policy, || {
            self.check_interrupts(channel, TRANSFER_COMPLETE | TRANSFER_ERROR)
        })?;
        self.reap(channel)
    }

    /// Busy-wait until `channel` is idle.
    ///
    /// Returns at once when the channel is not armed. Otherwise polls until
    /// TC or TE, then clears the flags and disarms the channel. A channel
    /// armed with interrupts whose source never completes hangs here.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::FAIL]\): the transfer ended with an error.
    pub fn wait_channel_free(&self, channel: DmaChannel) -> Result<(), ErrorCode> {
        self.wait_channel_free_with(channel, WaitPolicy::Unbounded)
    }

    /// As [Self::wait_channel_free], but gives up with
    /// `Err(ErrorCode::BUSY)` after `limit` polls, leaving the channel armed.
    pub fn wait_channel_free_bounded(
        &self,
        channel: DmaChannel,
        limit: usize,
    ) -> Result<(), ErrorCode> {
        self.wait_channel_free_with(channel, WaitPolicy::Bounded(limit))
    }

    /// Start a memory to memory copy of `length` bytes and return without
    /// waiting.
    ///
    /// The channel reads from `source` (CPAR) and writes to `destination`
    /// (CMAR), one byte at a time with both addresses incremented. TC and TE
    /// interrupts are enabled.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::BUSY]\): the channel is armed.
    /// + [Err]\([ErrorCode::INVAL]\): a pointer is null.
    /// + [Err]\([ErrorCode::SIZE]\): `length` is zero.
    ///
    /// On error the channel registers are untouched.
    ///
    /// # Safety
    ///
    /// Both buffers must stay valid for `length` bytes until the transfer is
    /// reaped, and nothing else may access `destination` meanwhile.
    pub unsafe fn move_bytes(
        &self,
        channel: DmaChannel,
        source: *const u8,
        destination: *mut u8,
        length: u16,
    ) -> Result<(), ErrorCode> {
        if self.is_armed(channel) {
            return Err(ErrorCode::BUSY);
        }
        if source.is_null() || destination.is_null() {
            return Err(ErrorCode::INVAL);
        }
        if length == 0 {
            return Err(ErrorCode::SIZE);
        }

        let registers = self.channel_registers(channel);
        self.clear_all_interrupts(channel);
        registers.cpar.set(source as usize as u32);
        registers.cmar.set(destination as usize as u32);
        registers.cndtr.set(length as u32);
        registers.ccr.write(
            CCR::MEM2MEM::SET
                + CCR::PL::Low
                + CCR::MSIZE::Bits8
                + CCR::PSIZE::Bits8
                + CCR::MINC::SET
                + CCR::PINC::SET
                + CCR::DIR::FromPeripheral
                + CCR::TEIE::SET
                + CCR::TCIE::SET,
        );
        registers.ccr.modify(CCR::EN::SET);

        Ok(())
    }

    /// Reap a finished transfer on `channel` and notify its client.
    ///
    /// Returns false when neither TC nor TE was raised.
    pub fn handle_interrupt(&self, channel: DmaChannel) -> bool {
        if !self.check_interrupts(channel, TRANSFER_COMPLETE | TRANSFER_ERROR) {
            return false;
        }

        let result = self.reap(channel);
        self.clients[channel.index()].map(|client| client.transfer_done(channel, result));
        true
    }

    /// Service every channel wired to `irq`. Returns false if `irq` is not a
    /// DMA line of this device.
    pub fn handle_irq(&self, irq: u32) -> bool {
        let mut known = false;
        for index in 0..CHANNEL_COUNT {
            if let Some(channel) = DmaChannel::from_index(index) {
                if channel.irq() == irq {
                    known = true;
                    self.handle_interrupt(channel);
                }
            }
        }
        known
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::Cell;
    use std::boxed::Box;
    use std::vec::Vec;

    const WORDS: usize = 0x94 / 4;

    // ISR is read-only and IFCR write-only through the register interface,
    // so the test plays the hardware through the raw words.
    struct Fake {
        words: [*mut u32; CONTROLLER_COUNT],
    }

    impl Fake {
        fn isr_set(&self, controller: usize, value: u32) {
            unsafe { core::ptr::write_volatile(self.words[controller], value) };
        }

        fn ifcr(&self, controller: usize) -> u32 {
            unsafe { core::ptr::read_volatile(self.words[controller].add(1)) }
        }
    }

    fn dma() -> (Dma<'static>, Fake) {
        let words: [*mut u32; CONTROLLER_COUNT] =
            core::array::from_fn(|_| Box::into_raw(Box::new([0u32; WORDS])) as *mut u32);
        let controllers = words.map(|base| unsafe { StaticRef::new(base as *const DmaRegisters) });
        (Dma::with_registers(controllers), Fake { words })
    }

    fn channel(index: usize) -> DmaChannel {
        match DmaChannel::from_index(index) {
            Some(channel) => channel,
            None => panic!("no channel {}", index),
        }
    }

    #[test]
    fn resolution_is_a_bijection_onto_the_channel_indices() {
        let mut seen = Vec::new();
        for index in 0..CHANNEL_COUNT {
            let handle = channel(index).handle();
            let resolved = resolve_channel(handle);
            assert!(resolved.is_some());
            if let Some((resolved, irq)) = resolved {
                assert_eq!(resolved.index(), index);
                assert_eq!(irq, resolved.irq());
            }
            assert!(!seen.contains(&handle));
            seen.push(handle);
        }
        assert_eq!(DmaChannel::from_index(CHANNEL_COUNT), None);
        assert_eq!(resolve_channel(PeripheralHandle(0x4002_000C)), None);
    }

    #[test]
    fn channel_handles_follow_the_register_stride() {
        assert_eq!(resolve_channel(DMA1_CHANNEL1).map(|(c, irq)| (c.index(), irq)), Some((0, 11)));
        assert_eq!(resolve_channel(DMA1_CHANNEL7).map(|(c, irq)| (c.index(), irq)), Some((6, 17)));
        for index in 0..7 {
            assert_eq!(channel(index).handle().address(), 0x4002_0008 + 20 * index as u32);
        }
    }

    #[cfg(any(feature = "stm32f103xe", feature = "stm32f107xc"))]
    #[test]
    fn dma2_channels_four_and_five_irqs() {
        assert_eq!(resolve_channel(DMA2_CHANNEL1).map(|(c, irq)| (c.index(), irq)), Some((7, 56)));
        assert_eq!(resolve_channel(DMA2_CHANNEL4).map(|(_, irq)| irq), Some(59));
        let expected = if cfg!(feature = "stm32f107xc") { 60 } else { 59 };
        assert_eq!(resolve_channel(DMA2_CHANNEL5).map(|(_, irq)| irq), Some(expected));
        assert_eq!(channel(11).controller(), 1);
        assert_eq!(channel(11).local_index(), 4);
    }

    #[cfg(not(any(feature = "stm32f103xe", feature = "stm32f107xc")))]
    #[test]
    fn dma2_is_absent_on_medium_density() {
        assert_eq!(CHANNEL_COUNT, 7);
        assert_eq!(resolve_channel(DMA2_CHANNEL1), None);
    }

    #[test]
    fn interrupt_enables_are_restricted_to_ht_tc_te() {
        let (dma, _) = dma();
        let ch = channel(2);
        dma.enable_interrupts(ch, 0xFFFF_FFFF);
        assert_eq!(dma.channel_registers(ch).ccr.get(), 0x0E);
        dma.disable_interrupts(ch, HALF_TRANSFER | GLOBAL);
        assert_eq!(dma.channel_registers(ch).ccr.get(), 0x0A);
    }

    #[test]
    fn status_flags_are_read_and_cleared_at_the_channel_offset() {
        let (dma, fake) = dma();
        let ch = channel(3);

        fake.isr_set(0, TRANSFER_COMPLETE << 12);
        assert!(dma.check_interrupts(ch, TRANSFER_COMPLETE));
        assert!(!dma.check_interrupts(ch, TRANSFER_ERROR));
        assert!(!dma.check_interrupts(channel(2), 0xFF));

        dma.clear_interrupts(ch, TRANSFER_ERROR | 0xF0);
        assert_eq!(fake.ifcr(0), TRANSFER_ERROR << 12);
        dma.clear_all_interrupts(ch);
        assert_eq!(fake.ifcr(0), 0xF << 12);
    }

    #[test]
    fn move_bytes_programs_a_memory_to_memory_byte_copy() {
        let (dma, _) = dma();
        let ch = channel(0);
        let source = 0x2000_0100 as *const u8;
        let destination = 0x2000_0200 as *mut u8;

        assert_eq!(unsafe { dma.move_bytes(ch, source, destination, 64) }, Ok(()));
        let registers = dma.channel_registers(ch);
        assert_eq!(registers.cpar.get(), 0x2000_0100);
        assert_eq!(registers.cmar.get(), 0x2000_0200);
        assert_eq!(registers.cndtr.get(), 64);
        // MEM2MEM | MINC | PINC | TEIE | TCIE | EN
        assert_eq!(registers.ccr.get(), (1 << 14) | (1 << 7) | (1 << 6) | 0b1011);
        assert!(dma.is_armed(ch));
        assert_eq!(dma.remaining(ch), 64);
    }

    #[test]
    fn move_bytes_rejects_busy_channels_and_null_pointers_untouched() {
        let (dma, _) = dma();
        let ch = channel(1);
        let source = 0x2000_0100 as *const u8;
        let destination = 0x2000_0200 as *mut u8;

        let snapshot = |dma: &Dma| {
            let registers = dma.channel_registers(ch);
            (
                registers.ccr.get(),
                registers.cpar.get(),
                registers.cmar.get(),
                registers.cndtr.get(),
            )
        };

        let idle = snapshot(&dma);
        assert_eq!(
            unsafe { dma.move_bytes(ch, core::ptr::null(), destination, 4) },
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            unsafe { dma.move_bytes(ch, source, core::ptr::null_mut(), 4) },
            Err(ErrorCode::INVAL)
        );
        assert_eq!(unsafe { dma.move_bytes(ch, source, destination, 0) }, Err(ErrorCode::SIZE));
        assert_eq!(snapshot(&dma), idle);

        assert_eq!(unsafe { dma.move_bytes(ch, source, destination, 8) }, Ok(()));
        let armed = snapshot(&dma);
        assert_eq!(
            unsafe { dma.move_bytes(ch, 0x2000_0300 as *const u8, destination, 16) },
            Err(ErrorCode::BUSY)
        );
        assert_eq!(snapshot(&dma), armed);
    }

    #[test]
    fn wait_channel_free_reaps_on_transfer_complete() {
        let (dma, fake) = dma();
        let ch = channel(5);
        let isr = fake.words[0];

        // Idle channels return at once
        assert_eq!(dma.wait_channel_free(ch), Ok(()));

        assert_eq!(
            unsafe { dma.move_bytes(ch, 0x2000_0000 as *const u8, 0x2000_1000 as *mut u8, 32) },
            Ok(())
        );
        let polls = Box::leak(Box::new(Cell::new(0)));
        crate::spin::sim::install(Box::new(move || {
            polls.set(polls.get() + 1);
            if polls.get() == 3 {
                unsafe { core::ptr::write_volatile(isr, (GLOBAL | TRANSFER_COMPLETE) << 20) };
            }
        }));

        assert_eq!(dma.wait_channel_free(ch), Ok(()));
        assert!(!dma.is_armed(ch));
        assert_eq!(fake.ifcr(0), 0xF << 20);
        crate::spin::sim::clear();
    }

    #[test]
    fn wait_channel_free_reports_transfer_errors_and_timeouts() {
        let (dma, fake) = dma();
        let ch = channel(4);
        let source = 0x2000_0000 as *const u8;
        let destination = 0x2000_1000 as *mut u8;
        crate::spin::sim::clear();

        assert_eq!(unsafe { dma.move_bytes(ch, source, destination, 32) }, Ok(()));
        assert_eq!(dma.wait_channel_free_bounded(ch, 8), Err(ErrorCode::BUSY));
        assert!(dma.is_armed(ch));

        fake.isr_set(0, TRANSFER_ERROR << 16);
        assert_eq!(dma.wait_channel_free_bounded(ch, 8), Err(ErrorCode::FAIL));
        assert!(!dma.is_armed(ch));
    }

    struct Recorder {
        done: Cell<Option<(usize, Result<(), ErrorCode>)>>,
    }

    impl DmaClient for Recorder {
        fn transfer_done(&self, channel: DmaChannel, result: Result<(), ErrorCode>) {
            self.done.set(Some((channel.index(), result)));
        }
    }

    #[test]
    fn interrupts_disarm_and_notify_the_client() {
        let (dma, fake) = dma();
        let recorder: &'static Recorder = Box::leak(Box::new(Recorder {
            done: Cell::new(None),
        }));
        let ch = channel(6);
        dma.set_client(ch, recorder);

        // A known line with nothing raised is still claimed
        assert!(dma.handle_irq(nvic::DMA1_Channel7));
        assert_eq!(recorder.done.get(), None);

        assert_eq!(
            unsafe { dma.move_bytes(ch, 0x2000_0000 as *const u8, 0x2000_1000 as *mut u8, 1) },
            Ok(())
        );
        fake.isr_set(0, TRANSFER_COMPLETE << 24);
        assert!(dma.handle_irq(nvic::DMA1_Channel7));
        assert_eq!(recorder.done.get(), Some((6, Ok(()))));
        assert!(!dma.is_armed(ch));

        assert!(!dma.handle_irq(nvic::EXTI0));
    }
}
