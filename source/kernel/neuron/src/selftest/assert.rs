// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Selftest expectation macros.
//!
//! A failed check prints a `SELFTEST: fail:` line on the console and panics
//! with the same text, so the panic handler follows with the trap state.

use core::fmt::{Arguments, Write};

use crate::console::Console;

#[cold]
#[inline(never)]
pub fn report_failure(args: Arguments<'_>) -> ! {
    {
        let mut console = Console::lock();
        let _ = writeln!(console, "SELFTEST: fail: {args}");
    }
    panic!("SELFTEST: fail: {args}");
}

/// Fails with the given message unless the condition holds.
#[macro_export]
macro_rules! st_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::selftest::assert::report_failure(format_args!($($arg)+));
        }
    };
}

/// Fails unless both expressions compare equal; prints both values.
#[macro_export]
macro_rules! st_expect_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::st_expect_eq!($left, $right, "expected {} == {}", stringify!($left), stringify!($right))
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {{
        let left = &$left;
        let right = &$right;
        if *left != *right {
            $crate::selftest::assert::report_failure(format_args!(
                "{}: left={:?} right={:?}",
                format_args!($($arg)+),
                left,
                right
            ));
        }
    }};
}

/// Fails unless the expression is an `Err` matching the pattern.
#[macro_export]
macro_rules! st_expect_err {
    ($expr:expr, $pat:pat $(,)?) => {
        match $expr {
            Err($pat) => {}
            Err(other) => $crate::selftest::assert::report_failure(format_args!(
                "{}: unexpected error {:?}",
                stringify!($expr),
                other
            )),
            Ok(_) => $crate::selftest::assert::report_failure(format_args!(
                "{}: expected Err({}), got Ok",
                stringify!($expr),
                stringify!($pat)
            )),
        }
    };
}
