// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Unified panic handler emitting deterministic diagnostics on the console
//! OWNERS: @kernel-team
//! PUBLIC API: panic handler (no_std, bare-metal only)
//! DEPENDS_ON: trap::last_trap(), console::raw_writer()
//! INVARIANTS: No allocations; never takes the console lock; stable output fields

#[cfg(all(not(test), target_os = "none"))]
use core::{fmt::Write, panic::PanicInfo};

#[cfg(all(not(test), target_os = "none"))]
use crate::{console, trap};

/// Emits the panic message, its source location and the last trap frame,
/// then halts this processor.
#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // The console mutex may be held by the code that panicked.
    let mut w = console::raw_writer();

    let _ = w.write_str("\nPANIC: ");
    if let Some(location) = info.location() {
        let _ = write!(w, "{}:{}: ", location.file(), location.line());
    }
    let _ = writeln!(w, "{}", info.message());

    if let Some(frame) = trap::last_trap() {
        let _ = writeln!(
            w,
            "PANIC: last trap: epc=0x{:08x} cause=0x{:08x} ({}) badvaddr=0x{:08x}",
            frame.epc,
            frame.cause,
            trap::describe_cause(frame.cause),
            frame.badvaddr
        );
        let _ = trap::fmt_trap(&frame, &mut w);
    }

    loop {
        core::hint::spin_loop();
    }
}
