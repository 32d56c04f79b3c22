// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! STM32F1 clock tree.
//!
//! `Clocks` owns the three clock sources and sequences every system clock
//! switch so that:
//!
//! + the source being switched to is ready before SW is written,
//! + SWS is observed before the switch is considered done,
//! + flash wait states are raised before a frequency increase and lowered only
//!   after a decrease.
//!
//! Frequencies are always recomputed from the RCC registers, so they stay
//! right even when another party reprogrammed the tree.
//!
//! # Usage
//!
//! ```rust,ignore
//! let clocks = Clocks::new(&rcc, &flash);
//! clocks.start_pll(PllSource::HSE, PllTier::Mhz72)?;
//! assert_eq!(72_000_000, clocks.get_system_frequency_hz());
//! assert_eq!(36_000_000, clocks.get_bus_frequency_hz(Bus::Apb1));
//! assert_eq!(72_000_000, clocks.get_timer_frequency_hz(Bus::Apb1));
//! ```
//!
//! # Hazard
//!
//! With the default [WaitPolicy::Unbounded], a board without a crystal hangs
//! in [Clocks::start_external_oscillator]. Choose a bounded policy with
//! [Clocks::set_wait_policy] to get `Err(ErrorCode::BUSY)` instead.

use crate::clocks::hse::Hse;
use crate::clocks::hsi::Hsi;
use crate::clocks::hsi::HSI_FREQUENCY_MHZ;
use crate::clocks::pll::{Pll, PllTier};
use crate::flash::Flash;
use crate::rcc::{ADCPrescaler, AHBPrescaler, APBPrescaler, HseMode, PllSource, Rcc, SysClockSource};
use crate::spin::WaitPolicy;

use kernel::config;
use kernel::debug;
use kernel::ErrorCode;

const HZ_PER_MHZ: u32 = 1_000_000;

/// Peripheral buses behind the AHB
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bus {
    /// Low-speed bus (at most 36 MHz)
    Apb1,
    /// High-speed bus
    Apb2,
}

/// Main struct for configuring on-board clocks.
pub struct Clocks<'a> {
    rcc: &'a Rcc,
    flash: &'a Flash,
    /// High speed internal clock
    pub hsi: Hsi<'a>,
    /// High speed external clock
    pub hse: Hse<'a>,
    /// Main phase locked loop
    pub pll: Pll<'a>,
}

impl<'a> Clocks<'a> {
    pub fn new(rcc: &'a Rcc, flash: &'a Flash) -> Self {
        Self {
            rcc,
            flash,
            hsi: Hsi::new(rcc),
            hse: Hse::new(rcc),
            pll: Pll::new(rcc),
        }
    }

    /// Choose how long oscillator, PLL and clock switch waits may poll.
    pub fn set_wait_policy(&self, policy: WaitPolicy) {
        self.rcc.set_wait_policy(policy);
    }

    pub fn get_wait_policy(&self) -> WaitPolicy {
        self.rcc.get_wait_policy()
    }

    fn switch_sys_clock_source(&self, source: SysClockSource) -> Result<(), ErrorCode> {
        self.rcc.set_sys_clock_source(source);
        self.rcc
            .wait_until(|| self.rcc.get_sys_clock_source() == source)
    }

    /// Run the CPU from HSI.
    ///
    /// Starts HSI, switches SYSCLK to it if needed and lowers the flash
    /// latency for 8 MHz. The PLL and HSE keep running.
    pub fn start_internal_oscillator(&self) -> Result<(), ErrorCode> {
        self.hsi.enable()?;

        if !self.rcc.is_hsi_clock_system_clock() {
            self.switch_sys_clock_source(SysClockSource::HSI)?;
        }

        self.flash.set_latency(HSI_FREQUENCY_MHZ)?;

        if config::CONFIG.trace_clocks {
            debug!("[clocks] system clock: HSI {} MHz", HSI_FREQUENCY_MHZ);
        }

        Ok(())
    }

    /// Run the CPU from the external crystal.
    ///
    /// Turns the clock security system on, so an HSE failure falls back to
    /// HSI. Flash latency is first raised to cover both the current and the
    /// crystal frequency, then settled for the crystal once SWS reports HSE.
    pub fn start_external_oscillator(&self) -> Result<(), ErrorCode> {
        let hse_frequency_mhz = self.hse.get_rated_frequency_mhz();
        let current_frequency_mhz = self.get_sys_clock_frequency_mhz();

        self.rcc.enable_clock_security_system();
        self.flash
            .set_latency(current_frequency_mhz.max(hse_frequency_mhz))?;

        self.hse.enable(HseMode::CRYSTAL)?;
        self.switch_sys_clock_source(SysClockSource::HSE)?;

        self.flash.set_latency(hse_frequency_mhz)?;

        if config::CONFIG.trace_clocks {
            debug!("[clocks] system clock: HSE {} MHz", hse_frequency_mhz);
        }

        Ok(())
    }

    /// Run the CPU from the PLL at one of the supported tiers.
    ///
    /// The factors are checked first; nothing is touched for a tier the
    /// source cannot reach. The CPU then passes through HSI (and HSE when it
    /// feeds the PLL) while the PLL is reprogrammed. Bus prescalers are reset
    /// to AHB /1, APB2 /1, ADC /8 and APB1 /2 above 36 MHz, /1 otherwise.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): `tier` is unreachable from `source`.
    /// + [Err]\([ErrorCode::BUSY]\): a bounded wait ran out.
    pub fn start_pll(&self, source: PllSource, tier: PllTier) -> Result<(), ErrorCode> {
        let source_frequency_mhz = match source {
            PllSource::HSI => HSI_FREQUENCY_MHZ,
            PllSource::HSE => self.hse.get_rated_frequency_mhz(),
        };
        let (predivider, multiplier) = Pll::compute_factors(source, source_frequency_mhz, tier)?;

        self.start_internal_oscillator()?;
        if source == PllSource::HSE {
            self.start_external_oscillator()?;
        }

        self.pll.disable()?;
        self.pll.configure(source, predivider, multiplier)?;

        self.rcc.set_ahb_prescaler(AHBPrescaler::DivideBy1);
        self.rcc.set_apb2_prescaler(APBPrescaler::DivideBy1);
        self.rcc.set_adc_prescaler(ADCPrescaler::DivideBy8);
        self.rcc.set_apb1_prescaler(match tier {
            PllTier::Mhz64 | PllTier::Mhz72 => APBPrescaler::DivideBy2,
            _ => APBPrescaler::DivideBy1,
        });

        self.flash.set_latency(tier.frequency_mhz())?;

        self.pll.enable()?;
        self.switch_sys_clock_source(SysClockSource::PLL)?;

        if config::CONFIG.trace_clocks {
            debug!(
                "[clocks] system clock: PLL {} MHz from {:?} (/{} x{})",
                tier.frequency_mhz(),
                source,
                Into::<usize>::into(predivider),
                multiplier
            );
        }

        Ok(())
    }

    pub fn get_sys_clock_source(&self) -> SysClockSource {
        self.rcc.get_sys_clock_source()
    }

    /// SYSCLK frequency as observed through SWS and the PLL factors.
    pub fn get_sys_clock_frequency_mhz(&self) -> usize {
        match self.get_sys_clock_source() {
            SysClockSource::HSI => HSI_FREQUENCY_MHZ,
            SysClockSource::HSE => self.hse.get_rated_frequency_mhz(),
            SysClockSource::PLL => self
                .pll
                .get_frequency_mhz_no_cache(self.hse.get_rated_frequency_mhz())
                .unwrap_or(0),
        }
    }

    pub fn set_ahb_prescaler(&self, prescaler: AHBPrescaler) -> Result<(), ErrorCode> {
        self.rcc.set_ahb_prescaler(prescaler);
        Ok(())
    }

    pub fn get_ahb_prescaler(&self) -> AHBPrescaler {
        self.rcc.get_ahb_prescaler()
    }

    /// Set the divider between HCLK and `bus`. Not checked against the bus
    /// frequency limit.
    pub fn set_bus_prescaler(&self, bus: Bus, prescaler: APBPrescaler) -> Result<(), ErrorCode> {
        match bus {
            Bus::Apb1 => self.rcc.set_apb1_prescaler(prescaler),
            Bus::Apb2 => self.rcc.set_apb2_prescaler(prescaler),
        }
        Ok(())
    }

    pub fn get_bus_prescaler(&self, bus: Bus) -> APBPrescaler {
        match bus {
            Bus::Apb1 => self.rcc.get_apb1_prescaler(),
            Bus::Apb2 => self.rcc.get_apb2_prescaler(),
        }
    }

    pub fn set_adc_prescaler(&self, prescaler: ADCPrescaler) {
        self.rcc.set_adc_prescaler(prescaler);
    }

    pub fn get_adc_prescaler(&self) -> ADCPrescaler {
        self.rcc.get_adc_prescaler()
    }

    /// HCLK, the core and AHB frequency.
    pub fn get_system_frequency_hz(&self) -> u32 {
        let divider: usize = self.get_ahb_prescaler().into();
        self.get_sys_clock_frequency_mhz() as u32 * HZ_PER_MHZ / divider as u32
    }

    /// PCLK1 or PCLK2.
    pub fn get_bus_frequency_hz(&self, bus: Bus) -> u32 {
        let divider: usize = self.get_bus_prescaler(bus).into();
        self.get_system_frequency_hz() / divider as u32
    }

    /// Clock of the timers on `bus`: the hardware doubles it whenever the bus
    /// is divided.
    pub fn get_timer_frequency_hz(&self, bus: Bus) -> u32 {
        let bus_frequency = self.get_bus_frequency_hz(bus);
        match self.get_bus_prescaler(bus) {
            APBPrescaler::DivideBy1 => bus_frequency,
            _ => 2 * bus_frequency,
        }
    }

    /// ADC clock, derived from PCLK2.
    pub fn get_adc_frequency_hz(&self) -> u32 {
        let divider = match self.get_adc_prescaler() {
            ADCPrescaler::DivideBy2 => 2,
            ADCPrescaler::DivideBy4 => 4,
            ADCPrescaler::DivideBy6 => 6,
            ADCPrescaler::DivideBy8 => 8,
        };
        self.get_bus_frequency_hz(Bus::Apb2) / divider
    }
}

/// On-target smoke test for the whole clock tree.
///
/// Needs an 8 MHz crystal. Leaves the system running from HSI.
pub mod tests {
    use super::*;

    pub fn run(clocks: &Clocks) {
        debug!("");
        debug!("===============================================");
        debug!("Testing clocks...");

        // Reset state: running from HSI, HSE off
        assert_eq!(Some(HSI_FREQUENCY_MHZ), clocks.hsi.get_frequency_mhz());
        assert_eq!(Err(ErrorCode::FAIL), clocks.hsi.disable());
        assert_eq!(None, clocks.hse.get_frequency_mhz());

        crate::clocks::pll::tests::run(&clocks.pll);

        for tier in PllTier::ALL {
            assert_eq!(Ok(()), clocks.start_pll(PllSource::HSE, tier));
            assert_eq!(
                tier.frequency_mhz() as u32 * HZ_PER_MHZ,
                clocks.get_system_frequency_hz()
            );
            debug!("PLL tier {} MHz reached", tier.frequency_mhz());
        }

        assert_eq!(
            Err(ErrorCode::INVAL),
            clocks.start_pll(PllSource::HSI, PllTier::Mhz72)
        );

        assert_eq!(Ok(()), clocks.start_internal_oscillator());
        assert_eq!(SysClockSource::HSI, clocks.get_sys_clock_source());

        debug!("Finished testing clocks. Everything is alright!");
        debug!("===============================================");
        debug!("");
    }
}
