// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Supervisor-call gateway into the privileged kernel.
//!
//! Unprivileged code reaches kernel services through a software trap carrying
//! a one byte [`Opcode`]. The arch crate implements [`SupervisorCall`] with a
//! single parameterised trap primitive; [`KernelServices`] wraps it with one
//! typed function per service.
//!
//! The contract of this layer: trap code `N` reaches the handler with the
//! argument registers unmodified, and whatever the handler leaves in the
//! return register comes back unmodified. The handler itself lives outside
//! this crate.
//!
//! ```rust,ignore
//! let services = KernelServices::new(&cortexm::svc::SVC_GATEWAY);
//! let now = services.get_system_time();
//! services.delay(10);
//! ```

use crate::config;
use crate::debug;

/// Trap operation codes.
///
/// This is the wire contract between unprivileged and privileged code. The
/// numeric values must stay stable across builds that link the two sides
/// separately. Codes 0x0A to 0x0F are unassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    RelocateVectors = 0x00,
    IncludeComponent = 0x01,
    ExcludeComponent = 0x02,
    InstallCallback = 0x03,
    FindComponent = 0x04,
    GetCallback = 0x05,
    GetSystemTime = 0x06,
    InstallTimeout = 0x07,
    GetKernelCode = 0x08,
    GetCallbackVector = 0x09,
    ThrowMessage = 0x10,
    ThrowException = 0x11,
    Microseconds = 0x12,
    Delay = 0x13,
    MicroDelay = 0x14,
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(Opcode::RelocateVectors),
            0x01 => Ok(Opcode::IncludeComponent),
            0x02 => Ok(Opcode::ExcludeComponent),
            0x03 => Ok(Opcode::InstallCallback),
            0x04 => Ok(Opcode::FindComponent),
            0x05 => Ok(Opcode::GetCallback),
            0x06 => Ok(Opcode::GetSystemTime),
            0x07 => Ok(Opcode::InstallTimeout),
            0x08 => Ok(Opcode::GetKernelCode),
            0x09 => Ok(Opcode::GetCallbackVector),
            0x10 => Ok(Opcode::ThrowMessage),
            0x11 => Ok(Opcode::ThrowException),
            0x12 => Ok(Opcode::Microseconds),
            0x13 => Ok(Opcode::Delay),
            0x14 => Ok(Opcode::MicroDelay),
            _ => Err(()),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

/// A mechanism for crossing into privileged mode.
///
/// `args` are placed in the first four argument registers; the value the
/// handler leaves in the first return register is returned untouched.
pub trait SupervisorCall {
    fn invoke(&self, op: Opcode, args: [u32; 4]) -> u32;
}

/// Typed front-end over a [`SupervisorCall`] implementation.
pub struct KernelServices<'a, S: SupervisorCall> {
    gateway: &'a S,
}

impl<'a, S: SupervisorCall> KernelServices<'a, S> {
    pub const fn new(gateway: &'a S) -> Self {
        Self { gateway }
    }

    #[inline(always)]
    fn call(&self, op: Opcode, args: [u32; 4]) -> u32 {
        if config::CONFIG.trace_traps {
            debug!(
                "[trap] {:?}({:#x}, {:#x}, {:#x}, {:#x})",
                op,
                args[0],
                args[1],
                args[2],
                args[3]
            );
        }
        self.gateway.invoke(op, args)
    }

    /// Ask the privileged side to relocate `count` vectors.
    pub fn relocate_vectors(&self, count: u32) {
        self.call(Opcode::RelocateVectors, [count, 0, 0, 0]);
    }

    pub fn include_component(&self, component: u32) {
        self.call(Opcode::IncludeComponent, [component, 0, 0, 0]);
    }

    pub fn exclude_component(&self, component: u32) {
        self.call(Opcode::ExcludeComponent, [component, 0, 0, 0]);
    }

    /// Install `callback` for `component`, returning the handler's result.
    pub fn install_callback(&self, component: u32, callback: u32) -> u32 {
        self.call(Opcode::InstallCallback, [component, callback, 0, 0])
    }

    pub fn find_component(&self, component: u32) -> u32 {
        self.call(Opcode::FindComponent, [component, 0, 0, 0])
    }

    pub fn get_callback(&self, component: u32) -> u32 {
        self.call(Opcode::GetCallback, [component, 0, 0, 0])
    }

    pub fn get_system_time(&self) -> u32 {
        self.call(Opcode::GetSystemTime, [0; 4])
    }

    /// Returns whether the privileged side accepted the timeout.
    pub fn install_timeout(&self, timeout: u32, callback: u32) -> bool {
        self.call(Opcode::InstallTimeout, [timeout, callback, 0, 0]) != 0
    }

    pub fn get_kernel_code(&self) -> u32 {
        self.call(Opcode::GetKernelCode, [0; 4])
    }

    pub fn get_callback_vector(&self, component: u32) -> u32 {
        self.call(Opcode::GetCallbackVector, [component, 0, 0, 0])
    }

    pub fn throw_message(&self, destination: u32, message: u32, arg0: u32, arg1: u32) {
        self.call(Opcode::ThrowMessage, [destination, message, arg0, arg1]);
    }

    pub fn throw_exception(&self, exception: u32) {
        self.call(Opcode::ThrowException, [exception, 0, 0, 0]);
    }

    pub fn microseconds(&self) -> u32 {
        self.call(Opcode::Microseconds, [0; 4])
    }

    pub fn delay(&self, milliseconds: u32) -> u32 {
        self.call(Opcode::Delay, [milliseconds, 0, 0, 0])
    }

    pub fn microdelay(&self, microseconds: u32) -> u32 {
        self.call(Opcode::MicroDelay, [microseconds, 0, 0, 0])
    }
}
