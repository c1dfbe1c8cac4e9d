// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the TLB register codec
//! OWNERS: @kernel-arch-team
//! NOTE: Tests only; no kernel logic.
//!
//! TEST_SCOPE:
//!   - EntryLo packs and unpacks every representable field combination
//!   - EntryHi tags both pages of a pair identically
//!
//! TEST_SCENARIOS:
//!   - entry_lo_fields_survive_packing(): decode(encode(g, v, d, c, pfn)) == (g, v, d, c, pfn)
//!   - pair_partners_share_tag(): EntryHi for V and V + PAGE_SIZE are equal; parity differs

use super::entry::{is_even_page, EntryHi, EntryLo, PAIR_SIZE};
use crate::mm::{Asid, CacheAttr, PAGE_SIZE};
use proptest::prelude::*;

proptest! {
    #[test]
    fn entry_lo_fields_survive_packing(
        global in any::<bool>(),
        valid in any::<bool>(),
        dirty in any::<bool>(),
        cache in 0u8..8,
        pfn in 0u32..=EntryLo::PFN_MAX,
    ) {
        let cache = CacheAttr::from_bits_truncate(cache);
        let lo = EntryLo::new(global, valid, dirty, cache, pfn);
        prop_assert_eq!(
            (lo.global(), lo.valid(), lo.dirty(), lo.cache(), lo.pfn()),
            (global, valid, dirty, cache, pfn)
        );
        prop_assert_eq!(EntryLo::from_bits(lo.bits()), lo);
    }

    #[test]
    fn pair_partners_share_tag(asid in any::<u8>(), pair in 0u32..(1 << 19), offset in 0usize..PAGE_SIZE) {
        let asid = Asid::from_raw(asid);
        let even = pair as usize * PAIR_SIZE + offset;
        let odd = even + PAGE_SIZE;
        prop_assert_eq!(EntryHi::new(asid, even), EntryHi::new(asid, odd));
        prop_assert!(is_even_page(even));
        prop_assert!(!is_even_page(odd));
        prop_assert_eq!(EntryHi::new(asid, even).asid(), asid);
    }
}
