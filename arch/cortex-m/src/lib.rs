// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Generic support for Cortex-M platforms.
//!
//! Interrupt controller, system control block, barrier and interrupt-mask
//! instructions, the supervisor-call trap primitive, and vector table
//! relocation.

#![crate_name = "cortexm"]
#![crate_type = "rlib"]
#![no_std]

pub mod nvic;
pub mod scb;
pub mod support;
pub mod svc;
pub mod vector_table;
