// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Architecture-independent memory-management collaborators of the TLB core:
//! page-table entries, the page table, address spaces and ASID allocation.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

pub mod address_space;
pub mod page_table;
pub mod pte;

pub use address_space::{AddressSpace, AsidAllocator, AsidError};
pub use page_table::{MapError, PageTable};
pub use pte::{CacheAttr, Pte, PteFlags};

/// log2 of [`PAGE_SIZE`].
pub const PAGE_WIDTH: u32 = 12;
/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 1 << PAGE_WIDTH;

/// Address-space identifier tagging non-global TLB entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asid(u8);

impl Asid {
    /// Creates an ASID from its raw hardware value.
    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw ASID value.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for Asid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ASID owned by the kernel address space.
pub const ASID_KERNEL: Asid = Asid(0);
/// Marker for "no ASID assigned"; never loaded into EntryHi for a user space.
pub const ASID_INVALID: Asid = Asid(1);
/// First ASID handed out to user address spaces.
pub const ASID_START: Asid = Asid(2);
/// Largest ASID the hardware can encode.
pub const ASID_MAX: Asid = Asid(u8::MAX);

/// Aligns `addr` down to its page boundary.
#[inline]
pub const fn page_align_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

// Single current address space; the MIPS32 port runs one processor.
static CURRENT: AtomicPtr<AddressSpace> = AtomicPtr::new(ptr::null_mut());

/// Records `space` as the processor's active address space.
///
/// Only the pointer is published here; loading the ASID into hardware is the
/// architecture's job (see `arch::mips32::install_address_space`).
pub fn set_current(space: &'static AddressSpace) {
    CURRENT.store(space as *const AddressSpace as *mut AddressSpace, Ordering::Release);
}

/// Returns the active address space, if one has been installed.
pub fn current_address_space() -> Option<&'static AddressSpace> {
    let space = CURRENT.load(Ordering::Acquire);
    // SAFETY: only `set_current` stores into CURRENT and it requires a `'static` reference.
    unsafe { space.as_ref() }
}
