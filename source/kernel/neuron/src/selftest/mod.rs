// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-kernel selftest harness for the TLB back end.
//!
//! Runs against the live TLB during boot, so it only touches a handful of
//! scratch slots at the top of the random region and scratch ASIDs nobody
//! has been handed yet.

extern crate alloc;

use crate::arch::mips32::cp0::{load_entry, Cp0};
use crate::arch::mips32::entry::{EntryHi, EntryLo, PageMask, TlbIndex};
use crate::arch::mips32::tlb::{self, TlbSlot};
use crate::arch::mips32::{wire_entry, WireError, TLB_ENTRY_COUNT, TLB_WIRED};
use crate::console;
use crate::mm::{Asid, CacheAttr, PAGE_SIZE};
use crate::sync::IrqGuard;

pub mod assert;

const SCRATCH_A: Asid = Asid::from_raw(254);
const SCRATCH_B: Asid = Asid::from_raw(253);
const SCRATCH_VA: usize = 0x7ff0_0000;

/// Entrypoint invoked by the kernel once the TLB has been initialised.
pub fn run<C: Cp0>(cp0: &mut C) {
    console::write_line("SELFTEST: begin");
    test_wire(cp0);
    console::write_line("SELFTEST: wire ok");
    test_invalidate(cp0);
    console::write_line("SELFTEST: invalidate ok");
    test_trap_helpers();
    console::write_line("SELFTEST: trap ok");
    console::write_line("SELFTEST: end");
}

fn test_wire<C: Cp0>(cp0: &mut C) {
    use crate::st_expect_err;

    console::write_line("SELFTEST: wire step0: expect NotWired past the wired region");
    st_expect_err!(
        wire_entry(cp0, TLB_WIRED, EntryHi::NULL, EntryLo::NULL, EntryLo::NULL),
        WireError::NotWired
    );
}

fn test_invalidate<C: Cp0>(cp0: &mut C) {
    use crate::{st_assert, st_expect_eq};

    let top = TLB_ENTRY_COUNT - 1;
    let pair = 2 * PAGE_SIZE;
    let entry_hi = cp0.entry_hi();

    console::write_line("SELFTEST: invalidate step0: load scratch slots");
    let a0 = scratch(SCRATCH_A, SCRATCH_VA, false);
    let a1 = scratch(SCRATCH_A, SCRATCH_VA + pair, false);
    let b0 = scratch(SCRATCH_B, SCRATCH_VA, false);
    let global = scratch(SCRATCH_A, SCRATCH_VA + 2 * pair, true);
    write_slot(cp0, top, a0);
    write_slot(cp0, top - 1, a1);
    write_slot(cp0, top - 2, b0);
    write_slot(cp0, top - 3, global);

    console::write_line("SELFTEST: invalidate step1: by ASID");
    tlb::invalidate_asid(cp0, SCRATCH_A);
    let after = tlb::slots(cp0);
    st_expect_eq!(after[top], TlbSlot::NULL);
    st_expect_eq!(after[top - 1], TlbSlot::NULL);
    st_expect_eq!(after[top - 2], b0, "foreign ASID kept");
    st_expect_eq!(after[top - 3], global, "global entry kept");

    console::write_line("SELFTEST: invalidate step2: single page");
    {
        let mut guard = IrqGuard::new(&mut *cp0);
        st_assert!(tlb::invalidate_page(&mut guard, SCRATCH_B, SCRATCH_VA + PAGE_SIZE), "partner page hits pair");
        st_assert!(!tlb::invalidate_page(&mut guard, SCRATCH_B, SCRATCH_VA), "second probe misses");
        st_assert!(!tlb::invalidate_page(&mut guard, SCRATCH_B, SCRATCH_VA + 2 * pair), "global page skipped");
    }
    st_expect_eq!(tlb::slots(cp0)[top - 2], TlbSlot::NULL);

    console::write_line("SELFTEST: invalidate step3: EntryHi preserved");
    st_expect_eq!(cp0.entry_hi(), entry_hi);

    write_slot(cp0, top - 3, TlbSlot::NULL);
}

fn test_trap_helpers() {
    use crate::{st_assert, st_expect_eq};
    use crate::trap::{self, ExcCode, TrapFrame};

    // Not recorded: the panic handler prints the last recorded frame.
    let frame = TrapFrame {
        epc: 0x8000_1000,
        cause: ExcCode::TlbStore.to_cause(),
        badvaddr: SCRATCH_VA as u32,
        ..Default::default()
    };
    st_expect_eq!(ExcCode::from_cause(frame.cause), Some(ExcCode::TlbStore));
    st_expect_eq!(trap::describe_cause(frame.cause), "TLBStore");
    let mut buffer = alloc::string::String::new();
    st_assert!(trap::fmt_trap(&frame, &mut buffer).is_ok(), "trap formatting failed");
    st_assert!(buffer.contains("badvaddr=0x7ff00000"), "trap formatting lost BadVAddr");
}

fn scratch(asid: Asid, va: usize, global: bool) -> TlbSlot {
    let lo = EntryLo::new(global, true, false, CacheAttr::UNCACHED, 0);
    TlbSlot { hi: EntryHi::new(asid, va), lo0: lo, lo1: lo }
}

fn write_slot<C: Cp0>(cp0: &mut C, index: usize, slot: TlbSlot) {
    let mut guard = IrqGuard::new(cp0);
    let saved = guard.entry_hi();
    guard.set_page_mask(PageMask::PAGE_4K);
    load_entry(&mut *guard, slot.hi, slot.lo0, slot.lo1);
    guard.set_index(TlbIndex::new(index));
    guard.tlbwi();
    guard.set_entry_hi(saved);
}
