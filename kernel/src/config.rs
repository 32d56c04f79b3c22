// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration is a typed `const` object rather than scattered `#[cfg]`
//! blocks. Every code path stays type-checked even when an option is off, and
//! the compiler folds the constant so a disabled option costs nothing in the
//! resulting binary.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching Cargo feature of the
/// kernel crate from the board crate.
pub struct Config {
    /// Whether every supervisor call issued through
    /// [`KernelServices`](crate::platform::trap::KernelServices) is printed to
    /// the debug output with its opcode and arguments.
    pub trace_traps: bool,

    /// Whether system clock switches (oscillator start, PLL lock, source
    /// change, flash latency change) are printed to the debug output.
    pub trace_clocks: bool,
}

/// The unique instance of `Config`. This is the only location where
/// `#[cfg(x)]` is used to configure code based on Cargo features.
pub const CONFIG: Config = Config {
    trace_traps: cfg!(feature = "trace_traps"),
    trace_clocks: cfg!(feature = "trace_clocks"),
};
