// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Software model of the MIPS32 CP0 register file and TLB.
//!
//! Used by host builds in place of the real coprocessor. Besides the register
//! moves and `tlb*` instructions of [`Cp0`], [`SimCp0::translate`] performs an
//! address translation the way the MMU does and raises the same refill,
//! invalid and modified exceptions, so handlers can be driven end to end.

use crate::arch::mips32::cp0::{Cp0, Ipl};
use crate::arch::mips32::entry::{is_even_page, EntryHi, EntryLo, PageMask, TlbIndex};
use crate::arch::mips32::tlb::TlbSlot;
use crate::arch::mips32::TLB_ENTRY_COUNT;
use crate::mm::{Asid, PAGE_SIZE, PAGE_WIDTH};
use crate::trap::{ExcCode, TrapFrame, Vector};

/// Kind of memory access presented to [`SimCp0::translate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Simulated CP0 with a `TLB_ENTRY_COUNT`-slot joint TLB.
pub struct SimCp0 {
    slots: [TlbSlot; TLB_ENTRY_COUNT],
    masks: [PageMask; TLB_ENTRY_COUNT],
    entry_hi: EntryHi,
    entry_lo0: EntryLo,
    entry_lo1: EntryLo,
    index: TlbIndex,
    page_mask: PageMask,
    wired: usize,
    random: usize,
    bad_vaddr: usize,
    cause: u32,
    interrupts_enabled: bool,
}

impl SimCp0 {
    /// Power-on state: every slot null, nothing wired, interrupts enabled.
    pub const fn new() -> Self {
        Self {
            slots: [TlbSlot::NULL; TLB_ENTRY_COUNT],
            masks: [PageMask::PAGE_4K; TLB_ENTRY_COUNT],
            entry_hi: EntryHi::NULL,
            entry_lo0: EntryLo::NULL,
            entry_lo1: EntryLo::NULL,
            index: TlbIndex::new(0),
            page_mask: PageMask::PAGE_4K,
            wired: 0,
            random: TLB_ENTRY_COUNT - 1,
            bad_vaddr: 0,
            cause: 0,
            interrupts_enabled: true,
        }
    }

    pub fn slot(&self, index: usize) -> TlbSlot {
        self.slots[index]
    }

    pub fn slots(&self) -> &[TlbSlot] {
        &self.slots
    }

    /// Writes a slot directly, bypassing the CP0 registers.
    pub fn set_slot(&mut self, index: usize, hi: EntryHi, lo0: EntryLo, lo1: EntryLo) {
        self.slots[index] = TlbSlot { hi, lo0, lo1 };
        self.masks[index] = PageMask::PAGE_4K;
    }

    /// Loads `asid` as the current ASID, as a context switch would.
    pub fn switch_asid(&mut self, asid: Asid) {
        self.entry_hi = self.entry_hi.with_asid(asid);
    }

    /// Cause register after the most recent exception.
    pub fn cause(&self) -> u32 {
        self.cause
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Translates `va` for the current ASID.
    ///
    /// On a TLB exception the model latches BadVAddr, EntryHi.VPN2 and
    /// Cause.ExcCode like the hardware does and returns the vector taken.
    pub fn translate(&mut self, va: usize, access: Access) -> Result<usize, Vector> {
        let miss_code = match access {
            Access::Read => ExcCode::TlbLoad,
            Access::Write => ExcCode::TlbStore,
        };
        let key = EntryHi::new(self.entry_hi.asid(), va);
        let Some(index) = self.matching_slot(key) else {
            return Err(self.raise(va, miss_code, Vector::TlbRefill));
        };
        let slot = self.slots[index];
        let lo = if is_even_page(va) { slot.lo0 } else { slot.lo1 };
        if !lo.valid() {
            return Err(self.raise(va, miss_code, Vector::General));
        }
        if access == Access::Write && !lo.dirty() {
            return Err(self.raise(va, ExcCode::Mod, Vector::General));
        }
        Ok(((lo.pfn() as usize) << PAGE_WIDTH) | (va & (PAGE_SIZE - 1)))
    }

    /// Builds the frame the exception prologue would save for the last fault.
    pub fn fault_frame(&self, epc: u32, ra: u32) -> TrapFrame {
        let mut frame = TrapFrame::default();
        frame.epc = epc;
        frame.x[31] = ra;
        frame.cause = self.cause;
        frame.badvaddr = self.bad_vaddr as u32;
        frame
    }

    fn raise(&mut self, va: usize, code: ExcCode, vector: Vector) -> Vector {
        self.bad_vaddr = va;
        self.entry_hi = EntryHi::new(self.entry_hi.asid(), va);
        self.cause = code.to_cause();
        vector
    }

    fn matching_slot(&self, key: EntryHi) -> Option<usize> {
        self.slots.iter().zip(self.masks.iter()).position(|(slot, mask)| {
            let ignored = mask.vpn2_ignored();
            let global = slot.lo0.global() && slot.lo1.global();
            slot.hi.vpn2() & !ignored == key.vpn2() & !ignored
                && (global || slot.hi.asid() == key.asid())
        })
    }

    fn write_slot(&mut self, index: usize) {
        self.slots[index] = TlbSlot { hi: self.entry_hi, lo0: self.entry_lo0, lo1: self.entry_lo1 };
        self.masks[index] = self.page_mask;
    }
}

impl Default for SimCp0 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cp0 for SimCp0 {
    fn bad_vaddr(&self) -> usize {
        self.bad_vaddr
    }

    fn entry_hi(&self) -> EntryHi {
        self.entry_hi
    }

    fn set_entry_hi(&mut self, hi: EntryHi) {
        self.entry_hi = hi;
    }

    fn entry_lo0(&self) -> EntryLo {
        self.entry_lo0
    }

    fn set_entry_lo0(&mut self, lo: EntryLo) {
        self.entry_lo0 = lo;
    }

    fn entry_lo1(&self) -> EntryLo {
        self.entry_lo1
    }

    fn set_entry_lo1(&mut self, lo: EntryLo) {
        self.entry_lo1 = lo;
    }

    fn index(&self) -> TlbIndex {
        self.index
    }

    fn set_index(&mut self, index: TlbIndex) {
        self.index = index;
    }

    fn page_mask(&self) -> PageMask {
        self.page_mask
    }

    fn set_page_mask(&mut self, mask: PageMask) {
        self.page_mask = mask;
    }

    fn wired(&self) -> usize {
        self.wired
    }

    fn set_wired(&mut self, wired: usize) {
        self.wired = wired;
        self.random = TLB_ENTRY_COUNT - 1;
    }

    fn tlbp(&mut self) {
        self.index = match self.matching_slot(self.entry_hi) {
            Some(index) => TlbIndex::new(index),
            None => TlbIndex::PROBE_FAILED,
        };
    }

    fn tlbr(&mut self) {
        let index = self.index.index() % TLB_ENTRY_COUNT;
        let slot = self.slots[index];
        self.entry_hi = slot.hi;
        self.entry_lo0 = slot.lo0;
        self.entry_lo1 = slot.lo1;
        self.page_mask = self.masks[index];
    }

    fn tlbwi(&mut self) {
        self.write_slot(self.index.index() % TLB_ENTRY_COUNT);
    }

    fn tlbwr(&mut self) {
        let index = self.random;
        self.write_slot(index);
        // Random counts down through the unwired slots and wraps.
        self.random = if self.random <= self.wired { TLB_ENTRY_COUNT - 1 } else { self.random - 1 };
    }

    fn interrupts_disable(&mut self) -> Ipl {
        let previous = Ipl::from_bits(self.interrupts_enabled as u32);
        self.interrupts_enabled = false;
        previous
    }

    fn interrupts_restore(&mut self, ipl: Ipl) {
        self.interrupts_enabled = ipl.bits() & 1 != 0;
    }
}
