// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Independent watchdog.
//!
//! Clocked from the 40 kHz LSI. Once started it cannot be stopped; only a
//! reset does that. The prescaler is fixed at /32, so one reload count is
//! about 0.8 ms and the longest timeout (reload 0xFFF) is about 3.3 s.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{
    register_bitfields, register_structs, ReadOnly, ReadWrite, WriteOnly,
};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use crate::rcc::Rcc;

register_structs! {
    pub IwdgRegisters {
        /// Key register
        (0x00 => kr: WriteOnly<u32, KR::Register>),
        /// Prescaler register
        (0x04 => pr: ReadWrite<u32, PR::Register>),
        /// Reload register
        (0x08 => rlr: ReadWrite<u32, RLR::Register>),
        /// Status register
        (0x0C => sr: ReadOnly<u32, SR::Register>),
        (0x10 => @END),
    }
}

register_bitfields![u32,
    KR [
        KEY OFFSET(0) NUMBITS(16) [
            Reload = 0xAAAA,
            Unlock = 0x5555,
            Start = 0xCCCC
        ]
    ],
    PR [
        PR OFFSET(0) NUMBITS(3) [
            DivideBy4 = 0,
            DivideBy8 = 1,
            DivideBy16 = 2,
            DivideBy32 = 3,
            DivideBy64 = 4,
            DivideBy128 = 5,
            DivideBy256 = 6
        ]
    ],
    RLR [
        RL OFFSET(0) NUMBITS(12) []
    ],
    SR [
        /// Reload value update in progress
        RVU OFFSET(1) NUMBITS(1) [],
        /// Prescaler value update in progress
        PVU OFFSET(0) NUMBITS(1) []
    ]
];

pub const IWDG_BASE: StaticRef<IwdgRegisters> =
    unsafe { StaticRef::new(0x4000_3000 as *const IwdgRegisters) };

pub const MAX_RELOAD: u16 = 0xFFF;

pub struct Iwdg<'a> {
    registers: StaticRef<IwdgRegisters>,
    rcc: &'a Rcc,
}

impl<'a> Iwdg<'a> {
    pub const fn new(rcc: &'a Rcc) -> Self {
        Self::with_registers(IWDG_BASE, rcc)
    }

    pub(crate) const fn with_registers(
        registers: StaticRef<IwdgRegisters>,
        rcc: &'a Rcc,
    ) -> Self {
        Self { registers, rcc }
    }

    /// Start the watchdog with a timeout of `reload` counts of LSI/32.
    ///
    /// Waits for the prescaler and reload updates to land, using the RCC wait
    /// policy, then loads the counter.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): `reload` does not fit in 12 bits.
    /// + [Err]\([ErrorCode::BUSY]\): bounded wait policy and the update
    ///   never completed. The watchdog is running regardless.
    pub fn start(&self, reload: u16) -> Result<(), ErrorCode> {
        if reload > MAX_RELOAD {
            return Err(ErrorCode::INVAL);
        }
        self.registers.kr.write(KR::KEY::Start);
        self.registers.kr.write(KR::KEY::Unlock);
        self.registers.pr.write(PR::PR::DivideBy32);
        self.registers.rlr.write(RLR::RL.val(reload as u32));
        self.rcc.wait_until(|| self.registers.sr.get() == 0)?;
        self.kick();
        Ok(())
    }

    /// Reload the counter.
    pub fn kick(&self) {
        self.registers.kr.write(KR::KEY::Reload);
    }

    /// Whether the last reset came from this watchdog.
    pub fn caused_reset(&self) -> bool {
        self.rcc.is_independent_watchdog_reset()
    }

    /// Clear every RCC reset cause flag, not just the watchdog one.
    pub fn clear_reset_cause(&self) {
        self.rcc.clear_reset_flags();
    }
}
