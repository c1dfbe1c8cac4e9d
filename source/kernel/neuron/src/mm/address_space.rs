// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Address spaces and ASID allocation.
//!
//! An [`AddressSpace`] pairs a hardware ASID with a spin-locked page table.
//! The ASID is read without taking the lock: it only changes while the space
//! is not current on any processor.

use core::sync::atomic::{AtomicU8, Ordering};

use spin::{Mutex, MutexGuard};

use super::{Asid, MapError, PageTable, Pte, ASID_INVALID, ASID_KERNEL, ASID_MAX, ASID_START};
use crate::hal::TranslationCache;

const MAX_ASIDS: usize = ASID_MAX.raw() as usize + 1;
const WORD_BITS: usize = u64::BITS as usize;
const BITMAP_WORDS: usize = (MAX_ASIDS + WORD_BITS - 1) / WORD_BITS;

/// Errors reported by the ASID allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsidError {
    /// No more ASIDs are available.
    Exhausted,
}

/// A process-wide mapping context.
pub struct AddressSpace {
    asid: AtomicU8,
    table: Mutex<PageTable>,
}

impl AddressSpace {
    /// Creates an empty address space tagged with `asid`.
    pub fn new(asid: Asid) -> Self {
        Self { asid: AtomicU8::new(asid.raw()), table: Mutex::new(PageTable::new()) }
    }

    /// Returns the hardware ASID backing this address space.
    #[inline]
    pub fn asid(&self) -> Asid {
        Asid::from_raw(self.asid.load(Ordering::Relaxed))
    }

    /// Re-tags the address space, e.g. after its previous ASID was recycled.
    pub fn set_asid(&self, asid: Asid) {
        self.asid.store(asid.raw(), Ordering::Relaxed);
    }

    /// Spins until the page-table lock is acquired.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, PageTable> {
        self.table.lock()
    }

    /// Maps a single page.
    pub fn map_page(&self, va: usize, pte: Pte) -> Result<(), MapError> {
        self.lock().map(va, pte)
    }

    /// Unmaps a single page and drops any cached translation of it.
    pub fn unmap_page<T: TranslationCache>(&self, va: usize, cache: &mut T) -> Result<Pte, MapError> {
        let pte = self.lock().unmap(va)?;
        cache.invalidate_pages(self.asid(), va, 1);
        Ok(pte)
    }
}

/// Bitmap allocator of hardware ASIDs.
pub struct AsidAllocator {
    bitmap: [u64; BITMAP_WORDS],
    next: usize,
}

impl AsidAllocator {
    /// Creates an allocator with the kernel and invalid ASIDs reserved.
    pub const fn new() -> Self {
        let mut bitmap = [0u64; BITMAP_WORDS];
        bitmap[0] |= 1 << ASID_KERNEL.raw();
        bitmap[0] |= 1 << ASID_INVALID.raw();
        Self { bitmap, next: ASID_START.raw() as usize }
    }

    /// Hands out the next free ASID.
    pub fn allocate(&mut self) -> Result<Asid, AsidError> {
        for _ in 0..MAX_ASIDS {
            let index = self.next % MAX_ASIDS;
            self.next = (index + 1) % MAX_ASIDS;
            let (word, bit) = (index / WORD_BITS, index % WORD_BITS);
            if self.bitmap[word] & (1 << bit) == 0 {
                self.bitmap[word] |= 1 << bit;
                return Ok(Asid::from_raw(index as u8));
            }
        }
        Err(AsidError::Exhausted)
    }

    /// Returns `asid` to the pool after purging its TLB entries, so the next
    /// owner cannot hit stale translations.
    pub fn release<T: TranslationCache>(&mut self, asid: Asid, cache: &mut T) {
        debug_assert!(asid != ASID_KERNEL && asid != ASID_INVALID);
        cache.invalidate_asid(asid);
        let index = asid.raw() as usize;
        self.bitmap[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
        log_debug!(target: "as", "asid {} recycled", asid);
    }

    /// Reports whether `asid` is currently handed out (or reserved).
    pub fn is_allocated(&self, asid: Asid) -> bool {
        let index = asid.raw() as usize;
        self.bitmap[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }
}

impl Default for AsidAllocator {
    fn default() -> Self {
        Self::new()
    }
}
