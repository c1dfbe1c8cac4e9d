// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use super::TlbFault;
use crate::arch::mips32::cp0::Cp0;
use crate::mm::{Asid, PageTable, Pte};

/// Looks up a usable entry for `badvaddr` in `table`.
///
/// `table` must be the locked page table of the address space whose ASID is
/// `active`; the caller owns the lock so the handlers can choose their own
/// critical sections.
pub fn find_mapping_and_check<'t, C: Cp0>(
    cp0: &C,
    active: Asid,
    table: &'t mut PageTable,
    badvaddr: usize,
) -> Result<&'t mut Pte, TlbFault> {
    let hardware = cp0.entry_hi().asid();
    if hardware != active {
        log_warn!(target: "tlb", "asid mismatch: EntryHi.asid={} active={}", hardware, active);
        return Err(TlbFault::AsidMismatch { hardware, active });
    }

    let Some(pte) = table.lookup_mut(badvaddr) else {
        log_warn!(target: "tlb", "no such mapping: va={:#x}", badvaddr);
        return Err(TlbFault::NoMapping);
    };

    if !pte.is_valid() {
        log_warn!(target: "tlb", "invalid mapping: va={:#x}", badvaddr);
        return Err(TlbFault::MappingInvalid);
    }

    Ok(pte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::mips32::entry::EntryHi;
    use crate::hal::sim::SimCp0;
    use crate::mm::{CacheAttr, PteFlags};

    fn table() -> PageTable {
        let mut table = PageTable::new();
        let valid = Pte::new(7, PteFlags::VALID, CacheAttr::CACHEABLE_NONCOHERENT);
        let invalid = Pte::new(8, PteFlags::empty(), CacheAttr::CACHEABLE_NONCOHERENT);
        table.map(0x1000, valid).expect("map valid");
        table.map(0x3000, invalid).expect("map invalid");
        table
    }

    fn cp0_with_asid(asid: u8) -> SimCp0 {
        let mut cp0 = SimCp0::new();
        cp0.set_entry_hi(EntryHi::new(Asid::from_raw(asid), 0));
        cp0
    }

    #[test]
    fn resolves_valid_mapping() {
        let mut table = table();
        let cp0 = cp0_with_asid(3);
        let pte = find_mapping_and_check(&cp0, Asid::from_raw(3), &mut table, 0x1abc).expect("resolved");
        assert_eq!(pte.pfn(), 7);
    }

    #[test]
    fn asid_checked_before_lookup() {
        let mut table = table();
        let cp0 = cp0_with_asid(4);
        assert_eq!(
            find_mapping_and_check(&cp0, Asid::from_raw(3), &mut table, 0x9000).map(|p| *p),
            Err(TlbFault::AsidMismatch { hardware: Asid::from_raw(4), active: Asid::from_raw(3) })
        );
    }

    #[test]
    fn rejects_missing_and_invalid() {
        let mut table = table();
        let cp0 = cp0_with_asid(3);
        let asid = Asid::from_raw(3);
        assert_eq!(
            find_mapping_and_check(&cp0, asid, &mut table, 0x2000).map(|p| *p),
            Err(TlbFault::NoMapping)
        );
        assert_eq!(
            find_mapping_and_check(&cp0, asid, &mut table, 0x3000).map(|p| *p),
            Err(TlbFault::MappingInvalid)
        );
    }
}
