// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Refill, invalid and modified exception handlers.
//!
//! Each handler has a fallible core (`try_*`) that releases the address-space
//! lock before returning, and a trap entry that diverges into
//! [`fatal::report`] when the core fails.

use super::{fatal, find_mapping_and_check, FailureTag, TlbFault};
use crate::arch::mips32::cp0::{load_entry, Cp0};
use crate::arch::mips32::entry::{is_even_page, EntryHi, EntryLo, PageMask, TlbIndex};
use crate::mm::AddressSpace;
use crate::trap::TrapFrame;

/// Installs the mapping of BadVAddr into a random slot.
pub fn try_refill<C: Cp0>(cp0: &mut C, vm: &AddressSpace) -> Result<(), TlbFault> {
    let badvaddr = cp0.bad_vaddr();
    let mut table = vm.lock();
    let pte = find_mapping_and_check(&*cp0, vm.asid(), &mut table, badvaddr)?;

    pte.mark_accessed();

    let hi = EntryHi::new(vm.asid(), badvaddr);
    let lo = EntryLo::from_pte(pte, pte.is_dirty());
    let (lo0, lo1) = if is_even_page(badvaddr) { (lo, EntryLo::NULL) } else { (EntryLo::NULL, lo) };
    cp0.set_page_mask(PageMask::PAGE_4K);
    load_entry(cp0, hi, lo0, lo1);
    cp0.tlbwr();
    trace_install("refill", badvaddr, hi, lo);
    Ok(())
}

/// Revalidates the half of an existing slot that BadVAddr falls into.
pub fn try_invalid<C: Cp0>(cp0: &mut C, vm: &AddressSpace) -> Result<(), TlbFault> {
    let badvaddr = cp0.bad_vaddr();
    let (hi, index) = probe(cp0, badvaddr)?;

    let mut table = vm.lock();
    let pte = find_mapping_and_check(&*cp0, vm.asid(), &mut table, badvaddr)?;

    cp0.tlbr();
    pte.mark_accessed();

    let lo = EntryLo::from_pte(pte, pte.is_dirty());
    rewrite_half(cp0, hi, index, badvaddr, lo);
    trace_install("invalid", badvaddr, hi, lo);
    Ok(())
}

/// Grants write access to the half of an existing slot that BadVAddr falls into.
pub fn try_modified<C: Cp0>(cp0: &mut C, vm: &AddressSpace) -> Result<(), TlbFault> {
    let badvaddr = cp0.bad_vaddr();
    let (hi, index) = probe(cp0, badvaddr)?;

    let mut table = vm.lock();
    let pte = find_mapping_and_check(&*cp0, vm.asid(), &mut table, badvaddr)?;
    if !pte.is_writable() {
        log_warn!(target: "tlb", "write to read-only page: va={:#x}", badvaddr);
        return Err(TlbFault::PermissionDenied);
    }

    cp0.tlbr();
    pte.mark_accessed();
    pte.mark_dirty();

    let lo = EntryLo::from_pte(pte, pte.is_writable());
    rewrite_half(cp0, hi, index, badvaddr, lo);
    trace_install("modified", badvaddr, hi, lo);
    Ok(())
}

/// Trap entry for the refill vector.
pub fn tlb_refill<C: Cp0>(cp0: &mut C, vm: &AddressSpace, frame: &TrapFrame) {
    if let Err(fault) = try_refill(cp0, vm) {
        fatal::report(frame, cp0.bad_vaddr(), FailureTag::RefillFailure, fault);
    }
}

/// Trap entry for TLBL/TLBS on the general vector.
pub fn tlb_invalid<C: Cp0>(cp0: &mut C, vm: &AddressSpace, frame: &TrapFrame) {
    if let Err(fault) = try_invalid(cp0, vm) {
        fatal::report(frame, cp0.bad_vaddr(), FailureTag::InvalidFailure, fault);
    }
}

/// Trap entry for Mod on the general vector.
pub fn tlb_modified<C: Cp0>(cp0: &mut C, vm: &AddressSpace, frame: &TrapFrame) {
    if let Err(fault) = try_modified(cp0, vm) {
        fatal::report(frame, cp0.bad_vaddr(), FailureTag::ModifiedFailure, fault);
    }
}

// Runs before the address-space lock is taken.
fn probe<C: Cp0>(cp0: &mut C, badvaddr: usize) -> Result<(EntryHi, TlbIndex), TlbFault> {
    let hi = EntryHi::new(cp0.entry_hi().asid(), badvaddr);
    cp0.set_entry_hi(hi);
    cp0.tlbp();
    let index = cp0.index();
    if index.probe_failed() {
        log_warn!(target: "tlb", "TLB entry not found: va={:#x}", badvaddr);
        return Err(TlbFault::NoEntryFound);
    }
    Ok((hi, index))
}

// Expects the slot at `index` loaded by `tlbr`. EntryHi is reset to the probe
// key because `tlbr` replaced it with the slot's tag.
fn rewrite_half<C: Cp0>(cp0: &mut C, hi: EntryHi, index: TlbIndex, badvaddr: usize, lo: EntryLo) {
    cp0.set_entry_hi(hi);
    if is_even_page(badvaddr) {
        cp0.set_entry_lo0(lo);
    } else {
        cp0.set_entry_lo1(lo);
    }
    cp0.set_index(index);
    cp0.tlbwi();
}

#[inline]
fn trace_install(_kind: &str, _badvaddr: usize, _hi: EntryHi, _lo: EntryLo) {
    #[cfg(feature = "debug_tlb")]
    log_trace!(target: "tlb", "{}: va={:#x} hi=[{:?}] lo=[{:?}]", _kind, _badvaddr, _hi, _lo);
}
