// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core kernel support for the STM32F1 resource layer.
//!
//! The kernel crate holds the architecture independent pieces shared by the
//! arch and chip crates: the [`ErrorCode`] type, the register and cell
//! re-exports under [`utilities`], the [`debug!`] macro, compile-time
//! configuration, and the platform traits (clock control, interrupt service
//! and the supervisor-call gateway).

#![warn(unreachable_pub)]
#![no_std]

pub mod config;
#[macro_use]
pub mod debug;
pub mod errorcode;
pub mod platform;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
