// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Software page-table entries.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    /// Status and permission bits of a [`Pte`].
    pub struct PteFlags: u8 {
        /// Mapping may be installed into the TLB.
        const VALID = 1 << 0;
        /// Page may be written.
        const WRITABLE = 1 << 1;
        /// Page has been written since it was mapped.
        const DIRTY = 1 << 2;
        /// Mapping is shared by every address space.
        const GLOBAL = 1 << 3;
        /// Page has been referenced since it was mapped.
        const ACCESSED = 1 << 4;
    }
}

/// Three-bit cacheability policy forwarded verbatim to the hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheAttr(u8);

impl CacheAttr {
    /// Uncached access.
    pub const UNCACHED: Self = Self(2);
    /// Cacheable, non-coherent (write-back).
    pub const CACHEABLE_NONCOHERENT: Self = Self(3);
    /// Cacheable, exclusive on write.
    pub const CACHEABLE_EXCLUSIVE_WRITE: Self = Self(5);

    const MASK: u8 = 0x7;

    /// Keeps the low three bits of `bits`.
    #[inline]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Mapping of one virtual page.
///
/// `ACCESSED` and `DIRTY` feed page replacement and are only ever set here,
/// never cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pte {
    flags: PteFlags,
    cache: CacheAttr,
    pfn: u32,
}

impl Pte {
    /// Creates an entry mapping physical frame `pfn`.
    pub const fn new(pfn: u32, flags: PteFlags, cache: CacheAttr) -> Self {
        Self { flags, cache, pfn }
    }

    pub const fn is_valid(&self) -> bool {
        self.flags.contains(PteFlags::VALID)
    }

    pub const fn is_writable(&self) -> bool {
        self.flags.contains(PteFlags::WRITABLE)
    }

    pub const fn is_dirty(&self) -> bool {
        self.flags.contains(PteFlags::DIRTY)
    }

    pub const fn is_global(&self) -> bool {
        self.flags.contains(PteFlags::GLOBAL)
    }

    pub const fn is_accessed(&self) -> bool {
        self.flags.contains(PteFlags::ACCESSED)
    }

    pub const fn cache(&self) -> CacheAttr {
        self.cache
    }

    /// Physical frame number (physical address / page size).
    pub const fn pfn(&self) -> u32 {
        self.pfn
    }

    /// Records a reference to the page.
    #[inline]
    pub fn mark_accessed(&mut self) {
        self.flags.insert(PteFlags::ACCESSED);
    }

    /// Records a completed write to the page.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.flags.insert(PteFlags::DIRTY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_attr_keeps_three_bits() {
        assert_eq!(CacheAttr::from_bits_truncate(0xff).bits(), 7);
        assert_eq!(CacheAttr::from_bits_truncate(3), CacheAttr::CACHEABLE_NONCOHERENT);
    }

    #[test]
    fn bookkeeping_bits_only_accumulate() {
        let mut pte = Pte::new(7, PteFlags::VALID, CacheAttr::UNCACHED);
        assert!(!pte.is_accessed() && !pte.is_dirty());
        pte.mark_dirty();
        pte.mark_accessed();
        pte.mark_accessed();
        assert!(pte.is_accessed() && pte.is_dirty());
        assert!(pte.is_valid());
        assert!(!pte.is_writable());
        assert_eq!(pte.pfn(), 7);
    }
}
