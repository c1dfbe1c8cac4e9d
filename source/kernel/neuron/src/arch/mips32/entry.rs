// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bit-exact encodings of the CP0 TLB registers.
//!
//! Every word is a plain `u32` with masking accessors; nothing here touches
//! hardware, so the codec is usable from trap context and from host tests.

use core::fmt;

use crate::mm::{Asid, CacheAttr, Pte, PAGE_SIZE, PAGE_WIDTH};

/// Bytes covered by one TLB slot (an even/odd page pair).
pub const PAIR_SIZE: usize = 2 * PAGE_SIZE;

/// Returns `true` when `va` lies in the even page of its pair (EntryLo0).
#[inline]
pub const fn is_even_page(va: usize) -> bool {
    (va >> PAGE_WIDTH) & 1 == 0
}

/// One half of a TLB slot: `G` bit 0, `V` bit 1, `D` bit 2, `C` bits 3..=5,
/// `PFN` bits 6..=29.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct EntryLo(u32);

impl EntryLo {
    /// Invalid, non-global half entry.
    pub const NULL: Self = Self(0);

    const G: u32 = 1 << 0;
    const V: u32 = 1 << 1;
    const D: u32 = 1 << 2;
    const C_SHIFT: u32 = 3;
    const C_MASK: u32 = 0x7;
    const PFN_SHIFT: u32 = 6;
    /// Largest frame number the PFN field can hold.
    pub const PFN_MAX: u32 = (1 << 24) - 1;

    /// Packs the fields of a half entry. `pfn` is truncated to 24 bits.
    #[inline]
    pub const fn new(global: bool, valid: bool, dirty: bool, cache: CacheAttr, pfn: u32) -> Self {
        let mut bits = ((cache.bits() as u32) & Self::C_MASK) << Self::C_SHIFT;
        bits |= (pfn & Self::PFN_MAX) << Self::PFN_SHIFT;
        if global {
            bits |= Self::G;
        }
        if valid {
            bits |= Self::V;
        }
        if dirty {
            bits |= Self::D;
        }
        Self(bits)
    }

    /// Builds the half entry installed for `pte`. `dirty` becomes the hardware
    /// `D` (write-enable) bit.
    #[inline]
    pub const fn from_pte(pte: &Pte, dirty: bool) -> Self {
        Self::new(pte.is_global(), pte.is_valid(), dirty, pte.cache(), pte.pfn())
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn global(self) -> bool {
        self.0 & Self::G != 0
    }

    #[inline]
    pub const fn valid(self) -> bool {
        self.0 & Self::V != 0
    }

    #[inline]
    pub const fn dirty(self) -> bool {
        self.0 & Self::D != 0
    }

    #[inline]
    pub const fn cache(self) -> CacheAttr {
        CacheAttr::from_bits_truncate(((self.0 >> Self::C_SHIFT) & Self::C_MASK) as u8)
    }

    #[inline]
    pub const fn pfn(self) -> u32 {
        (self.0 >> Self::PFN_SHIFT) & Self::PFN_MAX
    }
}

impl fmt::Debug for EntryLo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "g={} v={} d={} c={:03b} pfn={:#x}",
            self.global() as u8,
            self.valid() as u8,
            self.dirty() as u8,
            self.cache().bits(),
            self.pfn()
        )
    }
}

/// Tag word of a TLB slot: ASID bits 0..=7, VPN2 bits 13..=31.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct EntryHi(u32);

impl EntryHi {
    pub const NULL: Self = Self(0);

    const ASID_MASK: u32 = 0xff;
    const VPN2_SHIFT: u32 = 13;

    /// Tag for the page pair containing `addr` under `asid`.
    #[inline]
    pub const fn new(asid: Asid, addr: usize) -> Self {
        let vpn2 = (addr & !(PAIR_SIZE - 1)) as u32;
        Self(vpn2 | asid.raw() as u32)
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn asid(self) -> Asid {
        Asid::from_raw((self.0 & Self::ASID_MASK) as u8)
    }

    /// Virtual page-pair number.
    #[inline]
    pub const fn vpn2(self) -> u32 {
        self.0 >> Self::VPN2_SHIFT
    }

    /// Same tag with the ASID field replaced.
    #[inline]
    pub const fn with_asid(self, asid: Asid) -> Self {
        Self((self.0 & !Self::ASID_MASK) | asid.raw() as u32)
    }
}

impl fmt::Debug for EntryHi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asid={} vpn2={:#x}", self.asid(), self.vpn2())
    }
}

/// CP0 Index register: slot index in bits 0..=5, probe failure in bit 31.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct TlbIndex(u32);

impl TlbIndex {
    const INDEX_MASK: u32 = 0x3f;
    const P: u32 = 1 << 31;

    /// Result of a `tlbp` that found no matching slot.
    pub const PROBE_FAILED: Self = Self(Self::P);

    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index as u32 & Self::INDEX_MASK)
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn probe_failed(self) -> bool {
        self.0 & Self::P != 0
    }

    #[inline]
    pub const fn index(self) -> usize {
        (self.0 & Self::INDEX_MASK) as usize
    }
}

/// CP0 PageMask register, mask bits 13..=24.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageMask(u32);

impl PageMask {
    /// 4 KiB pages (8 KiB per slot).
    pub const PAGE_4K: Self = Self(0);
    /// 16 KiB pages.
    pub const PAGE_16K: Self = Self(0x3 << 13);

    const MASK: u32 = 0xfff << 13;

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::MASK)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// VPN2 bits ignored by address matching under this mask.
    #[inline]
    pub const fn vpn2_ignored(self) -> u32 {
        self.0 >> 13
    }
}
