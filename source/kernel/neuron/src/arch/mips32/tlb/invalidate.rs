// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! TLB invalidation by slot scan or probe.
//!
//! Every sequence repositions Index and EntryHi, so it runs with local
//! interrupts masked and puts the caller's EntryHi (the current ASID) back
//! when done. Cleared slots are rewritten whole: null tag, both halves null.
//! Only this processor's TLB is touched.

use crate::arch::mips32::cp0::{load_entry, Cp0};
use crate::arch::mips32::entry::{EntryHi, EntryLo, PageMask, TlbIndex, PAIR_SIZE};
use crate::arch::mips32::TLB_ENTRY_COUNT;
use crate::hal::TranslationCache;
use crate::mm::{page_align_down, Asid, ASID_INVALID};
use crate::sync::IrqGuard;

/// Clears every slot, wired ones included.
pub fn invalidate_all<C: Cp0>(cp0: &mut C) {
    let mut guard = IrqGuard::new(cp0);
    let saved = guard.entry_hi();
    guard.set_page_mask(PageMask::PAGE_4K);
    load_entry(&mut *guard, EntryHi::NULL, EntryLo::NULL, EntryLo::NULL);
    for i in 0..TLB_ENTRY_COUNT {
        guard.set_index(TlbIndex::new(i));
        guard.tlbwi();
    }
    guard.set_entry_hi(saved);
}

/// Clears every non-global slot tagged with `asid`, masking interrupts for
/// the duration of the scan.
///
/// # Panics
/// If `asid` is [`ASID_INVALID`].
pub fn invalidate_asid<C: Cp0>(cp0: &mut C, asid: Asid) {
    assert!(asid != ASID_INVALID, "invalidate_asid: ASID_INVALID");
    let mut guard = IrqGuard::new(cp0);
    let cleared = invalidate_asid_masked(&mut guard, asid);
    log_debug!(target: "tlb", "asid {}: {} entries cleared", asid, cleared);
}

/// Clears every non-global slot tagged with `asid`; returns the number of
/// slots cleared.
pub fn invalidate_asid_masked<C: Cp0>(guard: &mut IrqGuard<'_, C>, asid: Asid) -> usize {
    let saved = guard.entry_hi();
    let mut cleared = 0;
    for i in 0..TLB_ENTRY_COUNT {
        let index = TlbIndex::new(i);
        guard.set_index(index);
        guard.tlbr();
        if guard.entry_hi().asid() == asid && !loaded_global(&**guard) {
            clear_slot(&mut **guard, index);
            cleared += 1;
        }
    }
    guard.set_entry_hi(saved);
    cleared
}

/// Clears the slot mapping `page` under `asid`, if any. Global slots are left
/// alone. Returns whether a slot was cleared.
pub fn invalidate_page<C: Cp0>(guard: &mut IrqGuard<'_, C>, asid: Asid, page: usize) -> bool {
    let saved = guard.entry_hi();
    guard.set_entry_hi(EntryHi::new(asid, page));
    guard.tlbp();
    let index = guard.index();
    let mut cleared = false;
    if !index.probe_failed() {
        guard.tlbr();
        if !loaded_global(&**guard) {
            clear_slot(&mut **guard, index);
            cleared = true;
        }
    }
    guard.set_entry_hi(saved);
    cleared
}

/// Clears `count` pages starting at `page` under `asid`. Ranges spanning more
/// page pairs than the TLB has slots fall back to a full ASID scan.
pub fn invalidate_pages<C: Cp0>(cp0: &mut C, asid: Asid, page: usize, count: usize) {
    if count == 0 {
        return;
    }
    let mut guard = IrqGuard::new(cp0);
    let first = page & !(PAIR_SIZE - 1);
    let end = page_align_down(page).saturating_add(count.saturating_mul(crate::mm::PAGE_SIZE));
    let pairs = (end - first).div_ceil(PAIR_SIZE);
    if pairs > TLB_ENTRY_COUNT {
        invalidate_asid_masked(&mut guard, asid);
        return;
    }
    for pair in 0..pairs {
        invalidate_page(&mut guard, asid, first + pair * PAIR_SIZE);
    }
}

impl<C: Cp0> TranslationCache for C {
    fn invalidate_all(&mut self) {
        invalidate_all(self);
    }

    fn invalidate_asid(&mut self, asid: Asid) {
        invalidate_asid(self, asid);
    }

    fn invalidate_pages(&mut self, asid: Asid, page: usize, count: usize) {
        invalidate_pages(self, asid, page, count);
    }
}

fn loaded_global<C: Cp0>(cp0: &C) -> bool {
    cp0.entry_lo0().global() && cp0.entry_lo1().global()
}

fn clear_slot<C: Cp0>(cp0: &mut C, index: TlbIndex) {
    cp0.set_page_mask(PageMask::PAGE_4K);
    load_entry(cp0, EntryHi::NULL, EntryLo::NULL, EntryLo::NULL);
    cp0.set_index(index);
    cp0.tlbwi();
}
