// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! HSE (high-speed external) clock.
//!
//! The crystal (or external clock in bypass mode) is board specific. Its rated
//! frequency defaults to 8 MHz and can be changed with
//! [Hse::set_frequency_mhz] before any frequency-dependent configuration.
//!
//! A missing crystal never raises HSERDY. With the default unbounded wait
//! policy [Hse::enable] then hangs.

use crate::rcc::HseMode;
use crate::rcc::Rcc;

use core::cell::Cell;

use kernel::ErrorCode;

/// Rated frequency assumed until the board says otherwise
pub const DEFAULT_HSE_FREQUENCY_MHZ: usize = 8;

pub struct Hse<'a> {
    rcc: &'a Rcc,
    hse_frequency_mhz: Cell<usize>,
}

impl<'a> Hse<'a> {
    pub(in crate::clocks) fn new(rcc: &'a Rcc) -> Self {
        Self {
            rcc,
            hse_frequency_mhz: Cell::new(DEFAULT_HSE_FREQUENCY_MHZ),
        }
    }

    /// Start the HSE clock and wait until it is ready.
    pub fn enable(&self, source: HseMode) -> Result<(), ErrorCode> {
        if source == HseMode::BYPASS {
            self.rcc.enable_hse_clock_bypass();
        }

        self.rcc.enable_hse_clock();
        self.rcc.wait_until(|| self.rcc.is_ready_hse_clock())
    }

    /// Stop the HSE clock. Fails with FAIL while HSE is the system clock.
    pub fn disable(&self) -> Result<(), ErrorCode> {
        if self.rcc.is_hse_clock_system_clock() {
            return Err(ErrorCode::FAIL);
        }

        self.rcc.disable_hse_clock();
        self.rcc.wait_until(|| !self.rcc.is_ready_hse_clock())
    }

    pub fn is_enabled(&self) -> bool {
        self.rcc.is_enabled_hse_clock()
    }

    pub fn get_frequency_mhz(&self) -> Option<usize> {
        if self.is_enabled() {
            Some(self.hse_frequency_mhz.get())
        } else {
            None
        }
    }

    /// Frequency of the fitted crystal, whether or not it is running.
    pub fn get_rated_frequency_mhz(&self) -> usize {
        self.hse_frequency_mhz.get()
    }

    pub fn set_frequency_mhz(&self, frequency: usize) {
        self.hse_frequency_mhz.set(frequency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rcc::testing::{install_model, leak_registers, rcc};
    use crate::spin::WaitPolicy;

    #[test]
    fn rated_frequency_is_configurable() {
        let registers = leak_registers();
        install_model(registers);
        let rcc = rcc(registers);
        let hse = Hse::new(&rcc);

        assert_eq!(hse.get_rated_frequency_mhz(), DEFAULT_HSE_FREQUENCY_MHZ);
        hse.set_frequency_mhz(12);
        assert_eq!(hse.get_frequency_mhz(), None);

        assert_eq!(hse.enable(HseMode::CRYSTAL), Ok(()));
        assert_eq!(hse.get_frequency_mhz(), Some(12));

        assert_eq!(hse.disable(), Ok(()));
        assert!(!hse.is_enabled());
    }

    #[test]
    fn missing_crystal_times_out_under_a_bounded_policy() {
        crate::spin::sim::clear();
        let registers = leak_registers();
        let rcc = rcc(registers);
        rcc.set_wait_policy(WaitPolicy::Bounded(32));
        let hse = Hse::new(&rcc);

        assert_eq!(hse.enable(HseMode::CRYSTAL), Err(ErrorCode::BUSY));
    }
}
