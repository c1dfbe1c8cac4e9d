// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//! Trap handling: vector dispatch to the TLB handlers, trap history for the
//! panic path and symbol lookup for fatal reports.

use core::fmt::{self, Write};
use spin::Mutex;
use static_assertions::assert_eq_size;

use crate::arch::mips32::cp0::Cp0;
use crate::arch::mips32::tlb;
use crate::mm::AddressSpace;

// ——— diagnostics ———

static LAST_TRAP: Mutex<Option<TrapFrame>> = Mutex::new(None);

// ——— trap ring buffer (debug diagnostics) ———
const TRAP_RING_LEN: usize = 64;
static TRAP_RING: Mutex<[Option<TrapFrame>; TRAP_RING_LEN]> = Mutex::new([None; TRAP_RING_LEN]);
static TRAP_RING_IDX: Mutex<usize> = Mutex::new(0);

// ——— trap frame ———

/// Register state saved by the exception prologue.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct TrapFrame {
    /// $0..$31 ($0 is always 0).
    pub x: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    pub status: u32,
    pub cause: u32,
    pub epc: u32,
    pub badvaddr: u32,
}

assert_eq_size!(TrapFrame, [u32; 38]);

impl TrapFrame {
    /// Return address register ($31).
    #[inline]
    pub fn ra(&self) -> u32 {
        self.x[31]
    }
}

/// Exception vector the processor entered through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vector {
    /// Dedicated TLB refill vector (no matching slot, EXL clear).
    TlbRefill,
    /// General exception vector; the cause is in Cause.ExcCode.
    General,
}

/// Cause.ExcCode values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExcCode {
    Interrupt = 0,
    Mod = 1,
    TlbLoad = 2,
    TlbStore = 3,
    AddrLoad = 4,
    AddrStore = 5,
    BusInstr = 6,
    BusData = 7,
    Syscall = 8,
    Breakpoint = 9,
    ReservedInstr = 10,
    CopUnusable = 11,
    Overflow = 12,
    Trap = 13,
}

impl ExcCode {
    const SHIFT: u32 = 2;
    const MASK: u32 = 0x1f;

    /// Decodes Cause.ExcCode; codes without a variant yield `None`.
    pub fn from_cause(cause: u32) -> Option<Self> {
        Some(match (cause >> Self::SHIFT) & Self::MASK {
            0 => Self::Interrupt,
            1 => Self::Mod,
            2 => Self::TlbLoad,
            3 => Self::TlbStore,
            4 => Self::AddrLoad,
            5 => Self::AddrStore,
            6 => Self::BusInstr,
            7 => Self::BusData,
            8 => Self::Syscall,
            9 => Self::Breakpoint,
            10 => Self::ReservedInstr,
            11 => Self::CopUnusable,
            12 => Self::Overflow,
            13 => Self::Trap,
            _ => return None,
        })
    }

    /// Cause register value carrying only this ExcCode.
    pub const fn to_cause(self) -> u32 {
        (self as u32) << Self::SHIFT
    }
}

pub fn record(frame: &TrapFrame) {
    *LAST_TRAP.lock() = Some(*frame);
    // Push into ring
    let mut idx = TRAP_RING_IDX.lock();
    let mut ring = TRAP_RING.lock();
    ring[*idx % TRAP_RING_LEN] = Some(*frame);
    *idx = (*idx + 1) % TRAP_RING_LEN;
}

pub fn last_trap() -> Option<TrapFrame> {
    *LAST_TRAP.lock()
}

pub fn describe_cause(cause: u32) -> &'static str {
    match ExcCode::from_cause(cause) {
        Some(ExcCode::Interrupt) => "Interrupt",
        Some(ExcCode::Mod) => "TLBModified",
        Some(ExcCode::TlbLoad) => "TLBLoad",
        Some(ExcCode::TlbStore) => "TLBStore",
        Some(ExcCode::AddrLoad) => "AddressErrorLoad",
        Some(ExcCode::AddrStore) => "AddressErrorStore",
        Some(ExcCode::BusInstr) => "BusErrorInstruction",
        Some(ExcCode::BusData) => "BusErrorData",
        Some(ExcCode::Syscall) => "Syscall",
        Some(ExcCode::Breakpoint) => "Breakpoint",
        Some(ExcCode::ReservedInstr) => "ReservedInstruction",
        Some(ExcCode::CopUnusable) => "CoprocessorUnusable",
        Some(ExcCode::Overflow) => "Overflow",
        Some(ExcCode::Trap) => "Trap",
        None => "Exception",
    }
}

pub fn fmt_trap<W: Write>(frame: &TrapFrame, f: &mut W) -> fmt::Result {
    writeln!(f, " epc=0x{:08x} ra=0x{:08x}", frame.epc, frame.ra())?;
    writeln!(f, " cause=0x{:08x} ({})", frame.cause, describe_cause(frame.cause))?;
    writeln!(f, " badvaddr=0x{:08x} status=0x{:08x}", frame.badvaddr, frame.status)?;
    writeln!(f, " a0..a3 = {:08x?}", &frame.x[4..=7])
}

// ——— dispatch ———

/// Routes a trap taken while `vm` is the current address space.
///
/// TLB exceptions either resolve or halt the kernel; any other exception is
/// fatal at this layer.
pub fn dispatch<C: Cp0>(cp0: &mut C, vm: &AddressSpace, vector: Vector, frame: &mut TrapFrame) {
    record(frame);
    match vector {
        Vector::TlbRefill => tlb::tlb_refill(cp0, vm, frame),
        Vector::General => match ExcCode::from_cause(frame.cause) {
            Some(ExcCode::Mod) => tlb::tlb_modified(cp0, vm, frame),
            Some(ExcCode::TlbLoad | ExcCode::TlbStore) => tlb::tlb_invalid(cp0, vm, frame),
            _ => unhandled(frame),
        },
    }
}

#[cold]
fn unhandled(frame: &TrapFrame) -> ! {
    log_error!(target: "trap", "unhandled {} at {:#x}", describe_cause(frame.cause), frame.epc);
    panic!("EXC: cause=0x{:x} ({}) epc=0x{:x}", frame.cause, describe_cause(frame.cause), frame.epc);
}

// ——— bare-metal entry points (called from the exception vectors) ———

#[cfg(all(target_arch = "mips", target_os = "none"))]
fn enter(vector: Vector, frame: &mut TrapFrame) {
    // SAFETY: trap context runs on the trapping processor with no other live handle.
    let mut cp0 = unsafe { crate::arch::mips32::cp0::Hardware::local() };
    let Some(vm) = crate::mm::current_address_space() else {
        record(frame);
        panic!("trap with no address space: epc=0x{:x}", frame.epc);
    };
    dispatch(&mut cp0, vm, vector, frame);
}

#[cfg(all(target_arch = "mips", target_os = "none"))]
#[no_mangle]
extern "C" fn __tlb_refill_rust(frame: &mut TrapFrame) {
    enter(Vector::TlbRefill, frame);
}

#[cfg(all(target_arch = "mips", target_os = "none"))]
#[no_mangle]
extern "C" fn __exception_rust(frame: &mut TrapFrame) {
    enter(Vector::General, frame);
}

// ——— symbols ———

#[cfg(feature = "trap_symbols")]
#[allow(dead_code)]
mod trap_symbols {
    include!(concat!(env!("OUT_DIR"), "/trap_symbols.rs"));
}
#[cfg(not(feature = "trap_symbols"))]
mod trap_symbols {
    pub static TRAP_SYMBOLS: &[(u32, &str)] = &[];
}

/// Nearest symbol at or below `addr` in an address-sorted table.
pub fn nearest_symbol_in(table: &'static [(u32, &'static str)], addr: usize) -> Option<(&'static str, usize)> {
    let addr = u32::try_from(addr).ok()?;
    // Binary search for the first entry above addr.
    let mut lo = 0usize;
    let mut hi = table.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        if table[mid].0 <= addr {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo == 0 {
        return None;
    }
    let (base, name) = table[lo - 1];
    Some((name, base as usize))
}

/// Name of the function containing `addr`, from the embedded symbol table.
pub fn symbol_name(addr: usize) -> Option<&'static str> {
    nearest_symbol_in(trap_symbols::TRAP_SYMBOLS, addr).map(|(name, _)| name)
}

// ——— tests (host) ———
#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::{Access, SimCp0};
    use crate::mm::{Asid, CacheAttr, Pte, PteFlags};
    use alloc::string::String;

    static SYMBOLS: &[(u32, &str)] =
        &[(0x8000_0000, "kernel_start"), (0x8000_0100, "tlb_refill"), (0x8000_0400, "memcpy")];

    #[test]
    fn record_and_query_last_trap() {
        let mut frame = TrapFrame::default();
        frame.epc = 0x8000_1000;
        frame.badvaddr = 0x0bad_0000;
        record(&frame);
        assert!(last_trap().is_some());
        let ring = TRAP_RING.lock();
        assert!(ring.iter().flatten().any(|f| f.badvaddr == 0x0bad_0000 && f.epc == 0x8000_1000));
    }

    #[test]
    fn fmt_includes_registers() {
        let mut frame = TrapFrame::default();
        frame.x[4..=7].copy_from_slice(&[1; 4]);
        frame.epc = 0x2000;
        frame.cause = ExcCode::TlbStore.to_cause();
        frame.badvaddr = 0x3000;
        let mut out = String::new();
        fmt_trap(&frame, &mut out).expect("format");
        assert!(out.contains("epc"));
        assert!(out.contains("TLBStore"));
        assert!(out.contains("a0..a3"));
    }

    #[test]
    fn cause_decoding() {
        assert_eq!(ExcCode::from_cause(ExcCode::Mod.to_cause() | 0x8000_0300), Some(ExcCode::Mod));
        assert_eq!(ExcCode::from_cause(31 << 2), None);
        assert_eq!(describe_cause(31 << 2), "Exception");
    }

    #[test]
    fn nearest_symbol_picks_preceding_entry() {
        assert_eq!(nearest_symbol_in(SYMBOLS, 0x7fff_ffff), None);
        assert_eq!(nearest_symbol_in(SYMBOLS, 0x8000_0100), Some(("tlb_refill", 0x8000_0100)));
        assert_eq!(nearest_symbol_in(SYMBOLS, 0x8000_03fc), Some(("tlb_refill", 0x8000_0100)));
        assert_eq!(nearest_symbol_in(SYMBOLS, 0x8000_9000), Some(("memcpy", 0x8000_0400)));
        assert_eq!(nearest_symbol_in(&[], 0x8000_0000), None);
    }

    #[test]
    fn dispatch_routes_refill_then_modified() {
        let asid = Asid::from_raw(7);
        let vm = AddressSpace::new(asid);
        let pte = Pte::new(0x33, PteFlags::VALID | PteFlags::WRITABLE, CacheAttr::CACHEABLE_NONCOHERENT);
        vm.map_page(0x6000, pte).expect("map");
        let mut cp0 = SimCp0::new();
        cp0.switch_asid(asid);

        let vector = cp0.translate(0x6008, Access::Write).expect_err("refill");
        assert_eq!(vector, Vector::TlbRefill);
        let mut frame = cp0.fault_frame(0x8000_0200, 0);
        dispatch(&mut cp0, &vm, vector, &mut frame);

        let vector = cp0.translate(0x6008, Access::Write).expect_err("modified");
        assert_eq!(vector, Vector::General);
        assert_eq!(ExcCode::from_cause(cp0.cause()), Some(ExcCode::Mod));
        let mut frame = cp0.fault_frame(0x8000_0200, 0);
        dispatch(&mut cp0, &vm, vector, &mut frame);

        assert_eq!(cp0.translate(0x6008, Access::Write), Ok(0x33008));
        let pte = *vm.lock().lookup(0x6000).expect("mapped");
        assert!(pte.is_accessed() && pte.is_dirty());
    }

    #[test]
    #[should_panic(expected = "EXC: cause=0x20 (Syscall)")]
    fn dispatch_rejects_non_tlb_exceptions() {
        let vm = AddressSpace::new(Asid::from_raw(7));
        let mut frame = TrapFrame::default();
        frame.cause = ExcCode::Syscall.to_cause();
        dispatch(&mut SimCp0::new(), &vm, Vector::General, &mut frame);
    }
}
