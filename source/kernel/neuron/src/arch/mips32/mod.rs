// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! MIPS32 (R4000-style CP0) support for NEURON.
//!
//! The TLB is software managed: hardware only raises refill, invalid and
//! modified exceptions and the kernel installs entries itself (see [`tlb`]).
//! Host builds exercise everything here against `hal::sim::SimCp0`.

use static_assertions::const_assert;

use crate::mm::{self, AddressSpace};

pub mod cp0;
pub mod entry;
pub mod tlb;

use cp0::{load_entry, Cp0};
use entry::{EntryHi, EntryLo, PageMask, TlbIndex};

/// Number of slots in the hardware TLB.
pub const TLB_ENTRY_COUNT: usize = 48;
/// Slots reserved for wired (never replaced) mappings.
pub const TLB_WIRED: usize = 1;
/// Wired slot holding the current kernel stack mapping.
pub const TLB_KSTACK_WIRED_INDEX: usize = 0;

const_assert!(TLB_WIRED < TLB_ENTRY_COUNT);
const_assert!(TLB_KSTACK_WIRED_INDEX < TLB_WIRED);
const_assert!(TLB_ENTRY_COUNT <= 64);

/// Errors reported by [`wire_entry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Index lies outside the wired region.
    NotWired,
}

/// Brings the TLB into a known state: 4 KiB page mask, every slot cleared,
/// wired region reserved.
pub fn tlb_arch_init<C: Cp0>(cp0: &mut C) {
    cp0.set_page_mask(PageMask::PAGE_4K);
    tlb::invalidate_all(cp0);
    cp0.set_wired(TLB_WIRED);
    log_info!(target: "tlb", "init: {} entries, {} wired", TLB_ENTRY_COUNT, TLB_WIRED);
}

/// Installs a pinned mapping into wired slot `index`.
pub fn wire_entry<C: Cp0>(
    cp0: &mut C,
    index: usize,
    hi: EntryHi,
    lo0: EntryLo,
    lo1: EntryLo,
) -> Result<(), WireError> {
    if index >= TLB_WIRED {
        return Err(WireError::NotWired);
    }
    let mut guard = crate::sync::IrqGuard::new(cp0);
    let saved = guard.entry_hi();
    guard.set_page_mask(PageMask::PAGE_4K);
    load_entry(&mut *guard, hi, lo0, lo1);
    guard.set_index(TlbIndex::new(index));
    guard.tlbwi();
    guard.set_entry_hi(saved);
    log_debug!(target: "tlb", "wired[{}] {:?}", index, hi);
    Ok(())
}

/// Makes `space` the current address space and loads its ASID into EntryHi.
pub fn install_address_space<C: Cp0>(cp0: &mut C, space: &'static AddressSpace) {
    let mut guard = crate::sync::IrqGuard::new(cp0);
    mm::set_current(space);
    let hi = guard.entry_hi().with_asid(space.asid());
    guard.set_entry_hi(hi);
    log_debug!(target: "as", "install asid {}", space.asid());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimCp0;
    use crate::mm::{Asid, CacheAttr};

    #[test]
    fn init_clears_and_wires() {
        let mut cp0 = SimCp0::new();
        let junk = EntryLo::new(false, true, true, CacheAttr::UNCACHED, 3);
        for i in 0..TLB_ENTRY_COUNT {
            cp0.set_slot(i, EntryHi::new(Asid::from_raw(4), i * 0x2000), junk, junk);
        }
        tlb_arch_init(&mut cp0);
        assert_eq!(cp0.wired(), TLB_WIRED);
        assert!(cp0.slots().iter().all(|s| !s.lo0.valid() && !s.lo1.valid()));
        assert!(cp0.interrupts_enabled());
    }

    #[test]
    fn wire_entry_rejects_unwired_index() {
        let mut cp0 = SimCp0::new();
        let lo = EntryLo::new(true, true, true, CacheAttr::CACHEABLE_NONCOHERENT, 0x40);
        assert_eq!(
            wire_entry(&mut cp0, TLB_WIRED, EntryHi::NULL, lo, lo),
            Err(WireError::NotWired)
        );
        assert!(cp0.slots().iter().all(|s| !s.lo0.valid()));
    }

    #[test]
    fn wire_entry_writes_slot_and_keeps_asid() {
        let mut cp0 = SimCp0::new();
        tlb_arch_init(&mut cp0);
        cp0.switch_asid(Asid::from_raw(6));
        let hi = EntryHi::new(Asid::from_raw(0), 0x8000_0000);
        let lo = EntryLo::new(true, true, true, CacheAttr::CACHEABLE_NONCOHERENT, 0x40);
        wire_entry(&mut cp0, TLB_KSTACK_WIRED_INDEX, hi, lo, lo).expect("wired slot");
        let slot = cp0.slot(TLB_KSTACK_WIRED_INDEX);
        assert_eq!((slot.hi, slot.lo0, slot.lo1), (hi, lo, lo));
        assert_eq!(cp0.entry_hi().asid(), Asid::from_raw(6));
    }

    #[test]
    fn install_publishes_space_and_asid() {
        let space: &'static AddressSpace = Box::leak(Box::new(AddressSpace::new(Asid::from_raw(12))));
        let mut cp0 = SimCp0::new();
        install_address_space(&mut cp0, space);
        assert_eq!(cp0.entry_hi().asid(), Asid::from_raw(12));
        let current = mm::current_address_space().expect("current space");
        assert!(core::ptr::eq(current, space));
        assert!(cp0.interrupts_enabled());
    }
}

#[cfg(test)]
mod tests_prop;
