// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Two-level page table for the 32-bit virtual address space with lazy
//! allocation of leaf tables.

extern crate alloc;

use alloc::{boxed::Box, vec::Vec};

use super::{page_align_down, Pte, PAGE_SIZE, PAGE_WIDTH};

/// Entries per leaf table (10 bits of VPN).
const LEAF_ENTRIES: usize = 1024;
/// Entries in the root table (remaining 10 bits of VPN).
const ROOT_ENTRIES: usize = 1024;
/// Highest mappable virtual address (exclusive).
const VA_LIMIT: u64 = 1 << 32;

/// Error returned when manipulating page tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapError {
    /// Virtual address was not page aligned.
    Unaligned,
    /// Address lies outside the 32-bit address space.
    OutOfRange,
    /// Mapping collides with an existing entry.
    Overlap,
    /// No entry exists for the address.
    NotMapped,
}

struct LeafTable {
    entries: [Option<Pte>; LEAF_ENTRIES],
}

impl LeafTable {
    fn new() -> Box<Self> {
        Box::new(Self { entries: [None; LEAF_ENTRIES] })
    }
}

/// Page table mapping 4 KiB pages to [`Pte`] records.
pub struct PageTable {
    root: Vec<Option<Box<LeafTable>>>,
}

impl PageTable {
    /// Creates an empty page table.
    pub fn new() -> Self {
        let mut root = Vec::with_capacity(ROOT_ENTRIES);
        root.resize_with(ROOT_ENTRIES, || None);
        Self { root }
    }

    /// Installs `pte` for the page at `va`.
    pub fn map(&mut self, va: usize, pte: Pte) -> Result<(), MapError> {
        if va % PAGE_SIZE != 0 {
            return Err(MapError::Unaligned);
        }
        let (root, leaf) = split(va).ok_or(MapError::OutOfRange)?;
        let table = self.root[root].get_or_insert_with(LeafTable::new);
        let slot = &mut table.entries[leaf];
        if slot.is_some() {
            return Err(MapError::Overlap);
        }
        *slot = Some(pte);
        Ok(())
    }

    /// Removes and returns the entry for the page at `va`.
    pub fn unmap(&mut self, va: usize) -> Result<Pte, MapError> {
        if va % PAGE_SIZE != 0 {
            return Err(MapError::Unaligned);
        }
        let (root, leaf) = split(va).ok_or(MapError::OutOfRange)?;
        self.root[root]
            .as_mut()
            .and_then(|table| table.entries[leaf].take())
            .ok_or(MapError::NotMapped)
    }

    /// Looks up the entry of the page containing `va`. `va` need not be aligned.
    pub fn lookup(&self, va: usize) -> Option<&Pte> {
        let (root, leaf) = split(page_align_down(va))?;
        self.root[root].as_ref()?.entries[leaf].as_ref()
    }

    /// Mutable variant of [`PageTable::lookup`].
    pub fn lookup_mut(&mut self, va: usize) -> Option<&mut Pte> {
        let (root, leaf) = split(page_align_down(va))?;
        self.root[root].as_mut()?.entries[leaf].as_mut()
    }

    /// Number of pages currently mapped.
    pub fn mapped_pages(&self) -> usize {
        self.root
            .iter()
            .flatten()
            .map(|table| table.entries.iter().filter(|e| e.is_some()).count())
            .sum()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

fn split(va: usize) -> Option<(usize, usize)> {
    if va as u64 >= VA_LIMIT {
        return None;
    }
    let vpn = va >> PAGE_WIDTH;
    Some((vpn / LEAF_ENTRIES, vpn % LEAF_ENTRIES))
}
