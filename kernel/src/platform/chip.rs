// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces for individual MCUs.

/// Generic operations that clock-like things are expected to support.
pub trait ClockInterface {
    fn is_enabled(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
}

/// Helper struct for interfaces that expect clocks, but have no clock control.
pub struct NoClockControl {}
impl ClockInterface for NoClockControl {
    fn is_enabled(&self) -> bool {
        true
    }
    fn enable(&self) {}
    fn disable(&self) {}
}

/// Interface for handling interrupts on a hardware chip.
///
/// Each chip implements this with the set of peripherals it owns, so the
/// board's interrupt loop can forward pending IRQ numbers without knowing which
/// driver services them.
pub trait InterruptService {
    /// Service an interrupt, if supported by this chip. If this interrupt
    /// number is not supported, return false.
    ///
    /// # Safety
    ///
    /// Must be called with the interrupt's source still pending and from the
    /// context that owns the peripherals.
    unsafe fn service_interrupt(&self, interrupt: u32) -> bool;
}
