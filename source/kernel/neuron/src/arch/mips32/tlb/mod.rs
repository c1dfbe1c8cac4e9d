// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Software-managed TLB: exception handlers, invalidation, dump
//! OWNERS: @kernel-mm-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Host scenario tests against SimCp0 + proptest (invalidation, refill convergence)
//! PUBLIC API: tlb_refill/tlb_invalid/tlb_modified, try_* cores, invalidate_*, tlb_print, TlbFault
//! DEPENDS_ON: arch::mips32::{cp0, entry}, mm::AddressSpace, sync::IrqGuard, trap
//! INVARIANTS:
//!   - Handlers never allocate and never block; the address-space lock is a spin lock
//!   - Invalid/modified handlers probe before taking the lock
//!   - PTE accessed/dirty bits are only ever set
//!   - Invalidation and dump restore EntryHi (the current ASID) when done
//!   - Invalidation is local to this processor; no cross-processor shootdown

use core::fmt;

use crate::mm::Asid;

mod dump;
pub mod fatal;
mod handlers;
mod invalidate;
mod resolve;

pub use dump::{dump, slots, tlb_print, TlbSlot};
pub use handlers::{tlb_invalid, tlb_modified, tlb_refill, try_invalid, try_modified, try_refill};
pub use invalidate::{
    invalidate_all, invalidate_asid, invalidate_asid_masked, invalidate_page, invalidate_pages,
};
pub use resolve::find_mapping_and_check;

/// Reasons a TLB exception cannot be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlbFault {
    /// EntryHi carries a different ASID than the active address space.
    AsidMismatch {
        /// ASID loaded in EntryHi.
        hardware: Asid,
        /// ASID of the active address space.
        active: Asid,
    },
    /// The page table has no entry for the address.
    NoMapping,
    /// The page-table entry exists but is not valid.
    MappingInvalid,
    /// A probe found no TLB slot for the address.
    NoEntryFound,
    /// Write to a page that is not writable.
    PermissionDenied,
}

impl fmt::Display for TlbFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AsidMismatch { hardware, active } => {
                write!(f, "ASID mismatch (EntryHi.asid={hardware}, active asid={active})")
            }
            Self::NoMapping => f.write_str("no such mapping"),
            Self::MappingInvalid => f.write_str("invalid mapping"),
            Self::NoEntryFound => f.write_str("TLB entry not found"),
            Self::PermissionDenied => f.write_str("page not writable"),
        }
    }
}

/// Exception class named in a fatal report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureTag {
    RefillFailure,
    InvalidFailure,
    ModifiedFailure,
}

impl fmt::Display for FailureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RefillFailure => "TLB Refill Exception",
            Self::InvalidFailure => "TLB Invalid Exception",
            Self::ModifiedFailure => "TLB Modified Exception",
        })
    }
}

#[cfg(test)]
mod tests_prop;
