// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Main phase-locked loop (PLL) clock driver.
//!
//! The PLL multiplies its input by 2 to 16. The input is either HSI divided
//! by two (fixed by the hardware) or HSE, optionally divided by two
//! (PLLXTPRE). Only the five frequency tiers of [PllTier] are offered.
//!
//! The multiplier, predivider and source can only be changed while the PLL is
//! off; [Pll::configure] refuses otherwise.

use crate::clocks::hsi::HSI_FREQUENCY_MHZ;
use crate::rcc::{PllPredivider, PllSource, Rcc, SysClockSource};

use kernel::debug;
use kernel::ErrorCode;

/// Supported PLL output frequencies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PllTier {
    Mhz16,
    Mhz32,
    Mhz36,
    Mhz64,
    Mhz72,
}

impl PllTier {
    pub const ALL: [PllTier; 5] = [
        PllTier::Mhz16,
        PllTier::Mhz32,
        PllTier::Mhz36,
        PllTier::Mhz64,
        PllTier::Mhz72,
    ];

    pub fn frequency_mhz(self) -> usize {
        match self {
            PllTier::Mhz16 => 16,
            PllTier::Mhz32 => 32,
            PllTier::Mhz36 => 36,
            PllTier::Mhz64 => 64,
            PllTier::Mhz72 => 72,
        }
    }

    // HSE predivider that reaches the tier from an 8 MHz crystal
    fn preferred_predivider(self) -> PllPredivider {
        match self {
            PllTier::Mhz16 | PllTier::Mhz32 | PllTier::Mhz36 => PllPredivider::DivideBy2,
            PllTier::Mhz64 | PllTier::Mhz72 => PllPredivider::DivideBy1,
        }
    }
}

const MIN_MULTIPLIER: usize = 2;
const MAX_MULTIPLIER: usize = 16;

fn multiplier_for(input_mhz: usize, output_mhz: usize) -> Option<usize> {
    if input_mhz == 0 || output_mhz % input_mhz != 0 {
        return None;
    }
    let multiplier = output_mhz / input_mhz;
    (MIN_MULTIPLIER..=MAX_MULTIPLIER)
        .contains(&multiplier)
        .then_some(multiplier)
}

pub struct Pll<'a> {
    rcc: &'a Rcc,
}

impl<'a> Pll<'a> {
    pub(in crate::clocks) fn new(rcc: &'a Rcc) -> Self {
        Self { rcc }
    }

    /// Predivider and multiplier reaching `tier` from `source`.
    ///
    /// `source_frequency_mhz` is the oscillator frequency before any
    /// division. HSI always enters the PLL halved; for HSE the predivider the
    /// tier was designed for is tried first, then the other one.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): no predivider gives an integer
    ///   multiplier in 2..=16 (72 MHz from HSI, or an unusual crystal).
    pub fn compute_factors(
        source: PllSource,
        source_frequency_mhz: usize,
        tier: PllTier,
    ) -> Result<(PllPredivider, usize), ErrorCode> {
        let target = tier.frequency_mhz();
        match source {
            PllSource::HSI => multiplier_for(source_frequency_mhz / 2, target)
                .map(|multiplier| (PllPredivider::DivideBy1, multiplier))
                .ok_or(ErrorCode::INVAL),
            PllSource::HSE => {
                let preferred = tier.preferred_predivider();
                let other = match preferred {
                    PllPredivider::DivideBy1 => PllPredivider::DivideBy2,
                    PllPredivider::DivideBy2 => PllPredivider::DivideBy1,
                };
                [preferred, other]
                    .into_iter()
                    .find_map(|predivider| {
                        let divider: usize = predivider.into();
                        if source_frequency_mhz % divider != 0 {
                            return None;
                        }
                        multiplier_for(source_frequency_mhz / divider, target)
                            .map(|multiplier| (predivider, multiplier))
                    })
                    .ok_or(ErrorCode::INVAL)
            }
        }
    }

    /// Program source, predivider and multiplier.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::FAIL]\): the PLL is running.
    /// + [Err]\([ErrorCode::INVAL]\): multiplier outside 2..=16.
    pub fn configure(
        &self,
        source: PllSource,
        predivider: PllPredivider,
        multiplier: usize,
    ) -> Result<(), ErrorCode> {
        if self.is_enabled() {
            return Err(ErrorCode::FAIL);
        }
        if !(MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&multiplier) {
            return Err(ErrorCode::INVAL);
        }

        self.rcc.set_pll_clocks_source(source);
        self.rcc.set_pll_predivider(predivider);
        self.rcc.set_pll_multiplier(multiplier);

        Ok(())
    }

    /// Start the PLL and wait for lock.
    pub fn enable(&self) -> Result<(), ErrorCode> {
        self.rcc.enable_pll_clock();
        self.rcc.wait_until(|| self.rcc.is_locked_pll_clock())
    }

    /// Stop the PLL and wait until it reports unlocked.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::FAIL]\): the PLL drives the system clock.
    pub fn disable(&self) -> Result<(), ErrorCode> {
        if self.rcc.get_sys_clock_source() == SysClockSource::PLL {
            return Err(ErrorCode::FAIL);
        }

        self.rcc.disable_pll_clock();
        self.rcc.wait_until(|| !self.rcc.is_locked_pll_clock())
    }

    pub fn is_enabled(&self) -> bool {
        self.rcc.is_enabled_pll_clock()
    }

    pub fn get_source(&self) -> PllSource {
        self.rcc.get_pll_clocks_source()
    }

    /// Output frequency computed from the programmed factors, or None when
    /// the PLL is off. `hse_frequency_mhz` is only used for an HSE input.
    pub fn get_frequency_mhz_no_cache(&self, hse_frequency_mhz: usize) -> Option<usize> {
        if !self.is_enabled() {
            return None;
        }
        let input = match self.rcc.get_pll_clocks_source() {
            PllSource::HSI => HSI_FREQUENCY_MHZ / 2,
            PllSource::HSE => {
                let divider: usize = self.rcc.get_pll_predivider().into();
                hse_frequency_mhz / divider
            }
        };
        Some(input * self.rcc.get_pll_multiplier())
    }
}

/// On-target checks. Must be run while the PLL is not the system clock.
pub mod tests {
    use super::*;

    pub fn run(pll: &Pll) {
        debug!("");
        debug!("===============================================");
        debug!("Testing PLL...");

        assert_eq!(Ok(()), pll.disable());
        assert!(!pll.is_enabled());
        assert_eq!(None, pll.get_frequency_mhz_no_cache(8));

        let (predivider, multiplier) =
            Pll::compute_factors(PllSource::HSI, HSI_FREQUENCY_MHZ, PllTier::Mhz36)
                .unwrap_or((PllPredivider::DivideBy1, 9));
        assert_eq!(Ok(()), pll.configure(PllSource::HSI, predivider, multiplier));
        assert_eq!(Ok(()), pll.enable());
        assert_eq!(Some(36), pll.get_frequency_mhz_no_cache(8));

        // Factors are locked while running
        assert_eq!(
            Err(ErrorCode::FAIL),
            pll.configure(PllSource::HSI, predivider, multiplier)
        );

        assert_eq!(Ok(()), pll.disable());

        debug!("Finished testing PLL. Everything is alright!");
        debug!("===============================================");
        debug!("");
    }
}
