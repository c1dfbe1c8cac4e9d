// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! NEURON virtual-memory back end for MIPS32 software-managed TLBs.
//!
//! The crate fields the three TLB trap classes (refill, invalid, modified),
//! resolves them against the active address space's page table and keeps the
//! hardware TLB coherent with ASID/page invalidation. Host builds run against
//! [`hal::sim::SimCp0`], a software model of the CP0 register file.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(all(target_arch = "mips", target_os = "none"), feature(asm_experimental_arch))]
#![forbid(clippy::unwrap_used)]

extern crate alloc;

#[macro_use]
mod diag;

pub mod arch;
pub mod console;
pub mod hal;
pub mod mm;
pub mod selftest;
pub mod sync;
pub mod trap;

mod panic;

pub use diag::log;
