// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for TLB invalidation and fault resolution
//! OWNERS: @kernel-mm-team
//! NOTE: Tests only; no kernel logic. Drives SimCp0 through trap::dispatch.
//!
//! TEST_SCOPE:
//!   - By-ASID invalidation over random TLB populations spanning several ASIDs
//!   - Refill followed by a write converges for any valid writable mapping
//!
//! TEST_SCENARIOS:
//!   - invalidate_asid_is_exact(): only non-global slots of the target ASID are cleared
//!   - refill_then_write_converges(): translations resolve; PTEs end accessed + dirty

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use super::{invalidate_asid, TlbSlot};
use crate::arch::mips32::cp0::Cp0;
use crate::arch::mips32::entry::{EntryHi, EntryLo};
use crate::arch::mips32::{tlb_arch_init, TLB_ENTRY_COUNT};
use crate::hal::sim::{Access, SimCp0};
use crate::mm::{AddressSpace, Asid, CacheAttr, Pte, PteFlags, PAGE_SIZE};
use crate::trap;
use proptest::prelude::*;

#[derive(Clone, Debug)]
struct Seed {
    index: usize,
    asid: u8,
    pair: usize,
    global: bool,
    pfn: u32,
}

fn arb_seed() -> impl Strategy<Value = Seed> {
    (0..TLB_ENTRY_COUNT, 2u8..6, 0usize..0x1000, any::<bool>(), 1u32..0x1000)
        .prop_map(|(index, asid, pair, global, pfn)| Seed { index, asid, pair, global, pfn })
}

fn resolve(cp0: &mut SimCp0, vm: &AddressSpace, va: usize, kind: Access) -> Option<usize> {
    for _ in 0..3 {
        match cp0.translate(va, kind) {
            Ok(pa) => return Some(pa),
            Err(vector) => {
                let mut frame = cp0.fault_frame(0x8000_0000, 0);
                trap::dispatch(cp0, vm, vector, &mut frame);
            }
        }
    }
    None
}

proptest! {
    #[test]
    fn invalidate_asid_is_exact(seeds in prop::collection::vec(arb_seed(), 2..64), target in 2u8..6) {
        let distinct: BTreeSet<u8> = seeds.iter().map(|s| s.asid).collect();
        prop_assume!(distinct.len() >= 2);

        let mut cp0 = SimCp0::new();
        tlb_arch_init(&mut cp0);
        cp0.switch_asid(Asid::from_raw(9));
        for seed in &seeds {
            let lo = EntryLo::new(seed.global, true, false, CacheAttr::CACHEABLE_NONCOHERENT, seed.pfn);
            cp0.set_slot(seed.index, EntryHi::new(Asid::from_raw(seed.asid), seed.pair * 2 * PAGE_SIZE), lo, lo);
        }
        let before: Vec<TlbSlot> = cp0.slots().to_vec();

        invalidate_asid(&mut cp0, Asid::from_raw(target));

        for (i, (old, new)) in before.iter().zip(cp0.slots()).enumerate() {
            let global = old.lo0.global() && old.lo1.global();
            if old.hi.asid() == Asid::from_raw(target) && !global {
                prop_assert_eq!(*new, TlbSlot::NULL, "slot {} kept", i);
            } else {
                prop_assert_eq!(new, old, "slot {} changed", i);
            }
        }
        prop_assert_eq!(cp0.entry_hi().asid(), Asid::from_raw(9));
        prop_assert!(cp0.interrupts_enabled());
    }

    #[test]
    fn refill_then_write_converges(
        asid in 2u8..=255,
        pages in prop::collection::btree_set(0usize..0x8_0000, 1..24),
    ) {
        let vm = AddressSpace::new(Asid::from_raw(asid));
        let flags = PteFlags::VALID | PteFlags::WRITABLE;
        for (n, &page) in pages.iter().enumerate() {
            let pte = Pte::new(n as u32 + 1, flags, CacheAttr::CACHEABLE_NONCOHERENT);
            vm.map_page(page * PAGE_SIZE, pte).expect("map");
        }
        let mut cp0 = SimCp0::new();
        tlb_arch_init(&mut cp0);
        cp0.switch_asid(Asid::from_raw(asid));

        for (n, &page) in pages.iter().enumerate() {
            let va = page * PAGE_SIZE + 8;
            prop_assert_eq!(resolve(&mut cp0, &vm, va, Access::Read), Some((n + 1) * PAGE_SIZE + 8));
            prop_assert_eq!(resolve(&mut cp0, &vm, va, Access::Write), Some((n + 1) * PAGE_SIZE + 8));
        }
        let table = vm.lock();
        for &page in &pages {
            let pte = table.lookup(page * PAGE_SIZE).expect("mapped");
            prop_assert!(pte.is_accessed() && pte.is_dirty());
        }
    }
}
