// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Coprocessor 0 access for the TLB core
//! OWNERS: @kernel-arch-team
//! PUBLIC API: Cp0 trait, Ipl, Hardware (bare-metal only)
//! DEPENDS_ON: arch::mips32::entry
//! INVARIANTS: One Cp0 value per processor; never shared across processors
//!
//! The trait carries exactly the register moves and TLB instructions used by
//! the handlers, invalidation and dump. On `mips`/`none` builds [`Hardware`]
//! issues `mfc0`/`mtc0`/`tlb*`; host builds use `hal::sim::SimCp0`.

use super::entry::{EntryHi, EntryLo, PageMask, TlbIndex};

/// Saved interrupt level returned by [`Cp0::interrupts_disable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct Ipl(u32);

impl Ipl {
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Processor-local CP0 register file and TLB.
pub trait Cp0 {
    /// Address that caused the most recent TLB exception.
    fn bad_vaddr(&self) -> usize;

    fn entry_hi(&self) -> EntryHi;
    fn set_entry_hi(&mut self, hi: EntryHi);
    fn entry_lo0(&self) -> EntryLo;
    fn set_entry_lo0(&mut self, lo: EntryLo);
    fn entry_lo1(&self) -> EntryLo;
    fn set_entry_lo1(&mut self, lo: EntryLo);
    fn index(&self) -> TlbIndex;
    fn set_index(&mut self, index: TlbIndex);
    fn page_mask(&self) -> PageMask;
    fn set_page_mask(&mut self, mask: PageMask);
    /// Number of slots excluded from `tlbwr`.
    fn wired(&self) -> usize;
    fn set_wired(&mut self, wired: usize);

    /// Searches the TLB for EntryHi; result lands in Index.
    fn tlbp(&mut self);
    /// Loads the slot selected by Index into EntryHi/EntryLo0/EntryLo1/PageMask.
    fn tlbr(&mut self);
    /// Writes EntryHi/EntryLo0/EntryLo1/PageMask into the slot selected by Index.
    fn tlbwi(&mut self);
    /// Writes EntryHi/EntryLo0/EntryLo1/PageMask into a random non-wired slot.
    fn tlbwr(&mut self);

    /// Masks interrupts on the local processor and returns the previous level.
    fn interrupts_disable(&mut self) -> Ipl;
    /// Restores a level returned by [`Cp0::interrupts_disable`].
    fn interrupts_restore(&mut self, ipl: Ipl);
}

/// Loads the EntryHi/EntryLo pair into CP0 without touching Index.
#[inline]
pub fn load_entry<C: Cp0 + ?Sized>(cp0: &mut C, hi: EntryHi, lo0: EntryLo, lo1: EntryLo) {
    cp0.set_entry_hi(hi);
    cp0.set_entry_lo0(lo0);
    cp0.set_entry_lo1(lo1);
}

#[cfg(all(target_arch = "mips", target_os = "none"))]
pub use hw::Hardware;

#[cfg(all(target_arch = "mips", target_os = "none"))]
mod hw {
    use core::arch::asm;
    use core::marker::PhantomData;

    use super::{Cp0, EntryHi, EntryLo, Ipl, PageMask, TlbIndex};

    const INDEX: u32 = 0;
    const ENTRY_LO0: u32 = 2;
    const ENTRY_LO1: u32 = 3;
    const PAGE_MASK: u32 = 5;
    const WIRED: u32 = 6;
    const BAD_VADDR: u32 = 8;
    const ENTRY_HI: u32 = 10;
    const STATUS: u32 = 12;

    const STATUS_IE: u32 = 1 << 0;

    macro_rules! mfc0 {
        ($reg:expr) => {{
            let value: u32;
            // SAFETY: CP0 reads have no side effects.
            unsafe { asm!("mfc0 {0}, ${1}", out(reg) value, const $reg, options(nomem, nostack)) };
            value
        }};
    }

    macro_rules! mtc0 {
        ($reg:expr, $value:expr) => {{
            let value: u32 = $value;
            // SAFETY: callers hold the processor-local `Hardware` handle.
            unsafe { asm!("mtc0 {0}, ${1}", "ehb", in(reg) value, const $reg, options(nostack)) };
        }};
    }

    macro_rules! tlb_op {
        ($op:literal) => {{
            // SAFETY: the TLB is only driven through the processor-local handle.
            unsafe { asm!($op, "ehb", options(nostack)) };
        }};
    }

    /// The local processor's CP0.
    pub struct Hardware {
        _local: PhantomData<*mut ()>,
    }

    impl Hardware {
        /// # Safety
        /// At most one handle may be live per processor at a time, and it must
        /// not leave the processor it was created on.
        pub unsafe fn local() -> Self {
            Self { _local: PhantomData }
        }
    }

    impl Cp0 for Hardware {
        fn bad_vaddr(&self) -> usize {
            mfc0!(BAD_VADDR) as usize
        }

        fn entry_hi(&self) -> EntryHi {
            EntryHi::from_bits(mfc0!(ENTRY_HI))
        }

        fn set_entry_hi(&mut self, hi: EntryHi) {
            mtc0!(ENTRY_HI, hi.bits());
        }

        fn entry_lo0(&self) -> EntryLo {
            EntryLo::from_bits(mfc0!(ENTRY_LO0))
        }

        fn set_entry_lo0(&mut self, lo: EntryLo) {
            mtc0!(ENTRY_LO0, lo.bits());
        }

        fn entry_lo1(&self) -> EntryLo {
            EntryLo::from_bits(mfc0!(ENTRY_LO1))
        }

        fn set_entry_lo1(&mut self, lo: EntryLo) {
            mtc0!(ENTRY_LO1, lo.bits());
        }

        fn index(&self) -> TlbIndex {
            TlbIndex::from_bits(mfc0!(INDEX))
        }

        fn set_index(&mut self, index: TlbIndex) {
            mtc0!(INDEX, index.bits());
        }

        fn page_mask(&self) -> PageMask {
            PageMask::from_bits(mfc0!(PAGE_MASK))
        }

        fn set_page_mask(&mut self, mask: PageMask) {
            mtc0!(PAGE_MASK, mask.bits());
        }

        fn wired(&self) -> usize {
            mfc0!(WIRED) as usize
        }

        fn set_wired(&mut self, wired: usize) {
            mtc0!(WIRED, wired as u32);
        }

        fn tlbp(&mut self) {
            tlb_op!("tlbp");
        }

        fn tlbr(&mut self) {
            tlb_op!("tlbr");
        }

        fn tlbwi(&mut self) {
            tlb_op!("tlbwi");
        }

        fn tlbwr(&mut self) {
            tlb_op!("tlbwr");
        }

        fn interrupts_disable(&mut self) -> Ipl {
            let status = mfc0!(STATUS);
            mtc0!(STATUS, status & !STATUS_IE);
            Ipl::from_bits(status & STATUS_IE)
        }

        fn interrupts_restore(&mut self, ipl: Ipl) {
            let status = mfc0!(STATUS);
            mtc0!(STATUS, (status & !STATUS_IE) | (ipl.bits() & STATUS_IE));
        }
    }
}
