// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hardware abstraction layer traits.

pub mod sim;

use crate::mm::Asid;

/// Architecture hook for dropping cached translations.
///
/// The MIPS32 software-managed TLB implements it for every
/// [`Cp0`](crate::arch::mips32::cp0::Cp0); a hardware-walked structure such as
/// a translation storage buffer would implement it by flushing that instead.
pub trait TranslationCache {
    /// Drops every cached translation.
    fn invalidate_all(&mut self);
    /// Drops every non-global translation tagged with `asid`.
    fn invalidate_asid(&mut self, asid: Asid);
    /// Drops translations of `count` pages starting at `page` under `asid`.
    fn invalidate_pages(&mut self, asid: Asid, page: usize, count: usize);
}
