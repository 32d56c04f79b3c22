// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the STM32F1xx family of MCUs.
//!
//! The device variant (pin-out and peripheral set) is chosen with one of the
//! `stm32f103xb`, `stm32f103xe` or `stm32f107xc` Cargo features.

#![crate_name = "stm32f1xx"]
#![crate_type = "rlib"]
#![no_std]

pub mod chip;
pub mod clocks;
pub mod crc;
pub mod dma;
pub mod exti;
pub mod flash;
pub mod gate;
pub mod gpio;
pub mod iwdg;
pub mod nvic;
pub mod rcc;
pub mod spin;

