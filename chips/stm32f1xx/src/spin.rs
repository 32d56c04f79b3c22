// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Busy-wait on hardware status flags.
//!
//! Oscillator, PLL and DMA completion are only observable by polling a flag.
//! By default the wait is unbounded: if the flag never changes (missing
//! crystal, interrupt source never firing) the caller hangs. Callers that must
//! not hang choose [`WaitPolicy::Bounded`] and get `Err(ErrorCode::BUSY)` once
//! the iteration budget is spent.

use kernel::ErrorCode;

/// How long a status flag is polled before giving up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Poll until the flag changes, however long that takes.
    #[default]
    Unbounded,
    /// Poll at most this many times.
    Bounded(usize),
}

/// Poll `ready` according to `policy`.
pub(crate) fn wait_for<F: FnMut() -> bool>(
    policy: WaitPolicy,
    mut ready: F,
) -> Result<(), ErrorCode> {
    match policy {
        WaitPolicy::Unbounded => {
            while !ready() {
                relax();
            }
            Ok(())
        }
        WaitPolicy::Bounded(limit) => {
            for _ in 0..limit {
                if ready() {
                    return Ok(());
                }
                relax();
            }
            if ready() {
                Ok(())
            } else {
                Err(ErrorCode::BUSY)
            }
        }
    }
}

#[cfg(not(test))]
#[inline(always)]
fn relax() {
    core::hint::spin_loop();
}

#[cfg(test)]
fn relax() {
    sim::step();
}


#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::Cell;
    use std::boxed::Box;
    use std::rc::Rc;

    #[test]
    fn unbounded_wait_returns_once_the_flag_is_raised() {
        let polls = Rc::new(Cell::new(0usize));
        let counter = polls.clone();
        sim::install(Box::new(move || counter.set(counter.get() + 1)));

        assert_eq!(wait_for(WaitPolicy::Unbounded, || polls.get() == 3), Ok(()));
        assert_eq!(polls.get(), 3);
        sim::clear();
    }

    #[test]
    fn bounded_wait_gives_up_with_busy() {
        sim::clear();
        let mut polls = 0;
        let result = wait_for(WaitPolicy::Bounded(10), || {
            polls += 1;
            false
        });
        assert_eq!(result, Err(ErrorCode::BUSY));
        assert_eq!(polls, 11);
    }

    #[test]
    fn bounded_wait_succeeds_on_an_already_ready_flag() {
        assert_eq!(wait_for(WaitPolicy::Bounded(0), || true), Ok(()));
    }
}
