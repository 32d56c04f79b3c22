// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for in-kernel debugging.
//!
//! Chip and arch code print through the [`debug!`](crate::debug!) macro. The
//! board registers an [`IoWrite`] sink (typically a polled UART) with
//! [`set_debug_writer`]. Until a sink is registered output is dropped, which
//! keeps early boot code and host unit tests quiet.
//!
//! ```rust,ignore
//! use kernel::debug;
//!
//! debug!("PLL locked at {} MHz", 72);
//! ```

use core::fmt::{self, Write};
use core::ptr::addr_of_mut;

/// A synchronous byte sink for debug output.
pub trait IoWrite {
    /// Write `buf` and return how many bytes were written.
    fn write(&mut self, buf: &[u8]) -> usize;
}

static mut DEBUG_WRITER: Option<&'static mut dyn IoWrite> = None;

/// Register the sink used by [`debug!`](crate::debug!).
///
/// # Safety
///
/// Must be called from the single kernel thread before any interrupt handler
/// that prints is enabled.
pub unsafe fn set_debug_writer(writer: &'static mut dyn IoWrite) {
    *addr_of_mut!(DEBUG_WRITER) = Some(writer);
}

unsafe fn try_get_debug_writer() -> Option<&'static mut (dyn IoWrite + 'static)> {
    (*addr_of_mut!(DEBUG_WRITER)).as_deref_mut()
}

struct WriterAdapter<'a> {
    inner: &'a mut dyn IoWrite,
}

impl Write for WriterAdapter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written = self.inner.write(bytes);
            if written == 0 {
                return Err(fmt::Error);
            }
            bytes = &bytes[written..];
        }
        Ok(())
    }
}

/// Write a debug line with its source location prefix.
pub fn debug_println(args: fmt::Arguments, file_line: &(&'static str, u32)) {
    // Single-threaded kernel: the writer is only touched from here.
    if let Some(writer) = unsafe { try_get_debug_writer() } {
        let mut adapter = WriterAdapter { inner: writer };
        let (file, line) = *file_line;
        let _ = adapter.write_fmt(format_args!("{}:{}: ", file, line));
        let _ = adapter.write_fmt(args);
        let _ = adapter.write_str("\r\n");
    }
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_println(format_args!("{}", $msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_println(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}
