// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only TLB listing for debugging.

use core::fmt::{self, Write};

use crate::arch::mips32::cp0::Cp0;
use crate::arch::mips32::entry::{EntryHi, EntryLo, TlbIndex};
use crate::arch::mips32::TLB_ENTRY_COUNT;
use crate::sync::IrqGuard;

/// Snapshot of one TLB slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TlbSlot {
    pub hi: EntryHi,
    pub lo0: EntryLo,
    pub lo1: EntryLo,
}

impl TlbSlot {
    pub const NULL: Self = Self { hi: EntryHi::NULL, lo0: EntryLo::NULL, lo1: EntryLo::NULL };
}

/// Reads every slot back through `tlbr`.
pub fn slots<C: Cp0>(cp0: &mut C) -> [TlbSlot; TLB_ENTRY_COUNT] {
    let mut guard = IrqGuard::new(cp0);
    let saved = guard.entry_hi();
    let mut out = [TlbSlot::NULL; TLB_ENTRY_COUNT];
    for (i, slot) in out.iter_mut().enumerate() {
        guard.set_index(TlbIndex::new(i));
        guard.tlbr();
        *slot = TlbSlot { hi: guard.entry_hi(), lo0: guard.entry_lo0(), lo1: guard.entry_lo1() };
    }
    guard.set_entry_hi(saved);
    out
}

/// Writes one line per slot to `w`.
pub fn dump<C: Cp0, W: Write>(cp0: &mut C, w: &mut W) -> fmt::Result {
    writeln!(w, "TLB:")?;
    for (i, slot) in slots(cp0).iter().enumerate() {
        writeln!(w, "{:2}: {:?} | {:?} | {:?}", i, slot.hi, slot.lo0, slot.lo1)?;
    }
    Ok(())
}

/// Prints the TLB to the kernel console.
pub fn tlb_print<C: Cp0>(cp0: &mut C) {
    let mut console = crate::console::Console::lock();
    let _ = dump(cp0, &mut *console);
}
