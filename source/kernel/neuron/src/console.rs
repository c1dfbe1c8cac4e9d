// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel console on the MSIM character printer.
//!
//! Host test builds forward output to stdout; other host builds discard it.

use core::fmt::{self, Write};
use spin::Mutex;

/// MSIM "dprinter" device, reached through KSEG0.
#[cfg_attr(not(all(target_arch = "mips", target_os = "none")), allow(dead_code))]
const MSIM_PRINTER_BASE: usize = 0x9000_0000;

/// Global console used for log lines.
static CONSOLE: Mutex<Console> = Mutex::new(Console::new(MSIM_PRINTER_BASE));

/// Console implementation capable of formatted writes.
#[derive(Clone, Copy)]
pub struct Console {
    #[cfg_attr(not(all(target_arch = "mips", target_os = "none")), allow(dead_code))]
    base: usize,
}

impl Console {
    /// Creates a console rooted at the printer register `base`.
    pub const fn new(base: usize) -> Self {
        Self { base }
    }

    /// Returns a guard for the console singleton.
    pub fn lock() -> spin::MutexGuard<'static, Console> {
        CONSOLE.lock()
    }

    fn put(&self, byte: u8) {
        #[cfg(all(target_arch = "mips", target_os = "none"))]
        unsafe {
            core::ptr::write_volatile(self.base as *mut u8, byte);
        }
        #[cfg(not(all(target_arch = "mips", target_os = "none")))]
        host_put(byte);
    }
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            self.put(byte);
        }
        Ok(())
    }
}

#[cfg(all(test, not(all(target_arch = "mips", target_os = "none"))))]
fn host_put(byte: u8) {
    use std::io::Write as _;
    let _ = std::io::stdout().write_all(&[byte]);
}

#[cfg(all(not(test), not(all(target_arch = "mips", target_os = "none"))))]
fn host_put(_byte: u8) {}

/// Lock-free console writer for trap/panic contexts where the mutex may already be held.
pub struct RawConsole;

impl Write for RawConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let console = Console::new(MSIM_PRINTER_BASE);
        for &byte in s.as_bytes() {
            console.put(byte);
        }
        Ok(())
    }
}

pub fn raw_writer() -> RawConsole {
    RawConsole
}

/// Writes a line terminated by `\n` to the console.
pub fn write_line(message: &str) {
    let mut console = Console::lock();
    let _ = console.write_str(message);
    let _ = console.write_str("\n");
}
