// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! HSI (high-speed internal) clock.
//!
//! The 8 MHz RC oscillator is the reset clock source. It is also the fallback
//! the hardware switches to when the clock security system detects an HSE
//! failure.
//!
//! # Usage
//!
//! ```rust,ignore
//! let hsi = &clocks.hsi;
//! hsi.enable()?;
//! assert_eq!(Some(HSI_FREQUENCY_MHZ), hsi.get_frequency_mhz());
//! ```

use crate::rcc::Rcc;

use kernel::ErrorCode;

/// HSI frequency in MHz
pub const HSI_FREQUENCY_MHZ: usize = 8;

/// Main HSI clock structure
pub struct Hsi<'a> {
    rcc: &'a Rcc,
}

impl<'a> Hsi<'a> {
    pub(in crate::clocks) fn new(rcc: &'a Rcc) -> Self {
        Self { rcc }
    }

    /// Start the HSI clock and wait until it is ready.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::BUSY]\): the wait policy is bounded and HSIRDY
    ///   did not rise in time.
    pub fn enable(&self) -> Result<(), ErrorCode> {
        self.rcc.enable_hsi_clock();
        self.rcc.wait_until(|| self.rcc.is_ready_hsi_clock())
    }

    /// Stop the HSI clock.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::FAIL]\): HSI is the system clock.
    /// + [Err]\([ErrorCode::BUSY]\): HSIRDY did not fall in time.
    pub fn disable(&self) -> Result<(), ErrorCode> {
        if self.rcc.is_hsi_clock_system_clock() {
            return Err(ErrorCode::FAIL);
        }

        self.rcc.disable_hsi_clock();
        self.rcc.wait_until(|| !self.rcc.is_ready_hsi_clock())
    }

    pub fn is_enabled(&self) -> bool {
        self.rcc.is_enabled_hsi_clock()
    }

    /// Get the frequency in MHz of the HSI clock, or None when it is off.
    pub fn get_frequency_mhz(&self) -> Option<usize> {
        if self.is_enabled() {
            Some(HSI_FREQUENCY_MHZ)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rcc::testing::{install_model, leak_registers, rcc};

    #[test]
    fn hsi_reports_its_frequency_only_when_enabled() {
        let registers = leak_registers();
        install_model(registers);
        let rcc = rcc(registers);
        let hsi = Hsi::new(&rcc);

        assert_eq!(hsi.get_frequency_mhz(), None);
        assert_eq!(hsi.enable(), Ok(()));
        assert_eq!(hsi.get_frequency_mhz(), Some(HSI_FREQUENCY_MHZ));

        // Zeroed SWS means HSI drives SYSCLK
        assert_eq!(hsi.disable(), Err(ErrorCode::FAIL));
        assert!(hsi.is_enabled());
    }
}
