// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Supervisor call primitive for ARMv7-M.
//!
//! The `svc` immediate is encoded in the instruction, so each opcode expands
//! to its own instruction. Arguments travel in r0-r3 and the handler's result
//! comes back in r0.

use kernel::platform::trap::{Opcode, SupervisorCall};

#[cfg(all(target_arch = "arm", target_os = "none"))]
macro_rules! trap {
    ($code:literal, $args:expr) => {{
        let ret: u32;
        core::arch::asm!(
            "svc {code}",
            code = const $code,
            inout("r0") $args[0] => ret,
            inout("r1") $args[1] => _,
            inout("r2") $args[2] => _,
            inout("r3") $args[3] => _,
            options(nostack),
        );
        ret
    }};
}

/// Raise the supervisor call for `op` with `args` in r0-r3.
///
/// # Safety
///
/// Control transfers to the installed SVCall handler, which may act on the
/// arguments as addresses.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline(always)]
pub unsafe fn svc(op: Opcode, args: [u32; 4]) -> u32 {
    match op {
        Opcode::RelocateVectors => trap!(0x00, args),
        Opcode::IncludeComponent => trap!(0x01, args),
        Opcode::ExcludeComponent => trap!(0x02, args),
        Opcode::InstallCallback => trap!(0x03, args),
        Opcode::FindComponent => trap!(0x04, args),
        Opcode::GetCallback => trap!(0x05, args),
        Opcode::GetSystemTime => trap!(0x06, args),
        Opcode::InstallTimeout => trap!(0x07, args),
        Opcode::GetKernelCode => trap!(0x08, args),
        Opcode::GetCallbackVector => trap!(0x09, args),
        Opcode::ThrowMessage => trap!(0x10, args),
        Opcode::ThrowException => trap!(0x11, args),
        Opcode::Microseconds => trap!(0x12, args),
        Opcode::Delay => trap!(0x13, args),
        Opcode::MicroDelay => trap!(0x14, args),
    }
}

/// Supervisor call (mock)
///
/// Behaves like a handler that leaves the frame alone: r0 comes back as it
/// went in.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub unsafe fn svc(_op: Opcode, args: [u32; 4]) -> u32 {
    args[0]
}

/// The core's trap instruction as a [`SupervisorCall`].
pub struct SvcGateway;

impl SupervisorCall for SvcGateway {
    fn invoke(&self, op: Opcode, args: [u32; 4]) -> u32 {
        unsafe { svc(op, args) }
    }
}

pub static SVC_GATEWAY: SvcGateway = SvcGateway;

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::platform::trap::KernelServices;

    const ALL: [Opcode; 15] = [
        Opcode::RelocateVectors,
        Opcode::IncludeComponent,
        Opcode::ExcludeComponent,
        Opcode::InstallCallback,
        Opcode::FindComponent,
        Opcode::GetCallback,
        Opcode::GetSystemTime,
        Opcode::InstallTimeout,
        Opcode::GetKernelCode,
        Opcode::GetCallbackVector,
        Opcode::ThrowMessage,
        Opcode::ThrowException,
        Opcode::Microseconds,
        Opcode::Delay,
        Opcode::MicroDelay,
    ];

    #[test]
    fn every_opcode_passes_r0_through_the_gateway() {
        for op in ALL {
            let code = u8::from(op) as u32;
            assert_eq!(SVC_GATEWAY.invoke(op, [0x100 | code, 1, 2, 3]), 0x100 | code);
        }
    }

    #[test]
    fn typed_services_run_over_the_core_gateway() {
        let services = KernelServices::new(&SVC_GATEWAY);
        assert_eq!(services.find_component(0x42), 0x42);
        assert_eq!(services.delay(250), 250);
        assert!(services.install_timeout(10, 0x0800_1001));
        assert!(!services.install_timeout(0, 0x0800_1001));
        assert_eq!(services.get_system_time(), 0);
    }
}
