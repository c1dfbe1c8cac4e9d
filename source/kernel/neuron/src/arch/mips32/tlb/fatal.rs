// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal path for unresolvable TLB exceptions.

use super::{FailureTag, TlbFault};
use crate::trap::{self, TrapFrame};

/// Halts the kernel with the faulting address, EPC and the nearest symbols of
/// EPC and RA (blank when unknown).
#[cold]
#[inline(never)]
pub fn report(frame: &TrapFrame, badvaddr: usize, tag: FailureTag, fault: TlbFault) -> ! {
    report_with(trap::symbol_name, frame, badvaddr, tag, fault)
}

fn report_with<F>(symbol_of: F, frame: &TrapFrame, badvaddr: usize, tag: FailureTag, fault: TlbFault) -> !
where
    F: Fn(usize) -> Option<&'static str>,
{
    let epc = frame.epc as usize;
    let ra = frame.ra() as usize;
    let symbol = symbol_of(epc).unwrap_or("");
    let caller = symbol_of(ra).unwrap_or("");
    log_error!(target: "tlb", "{} ({}) va={:#x} epc={:#x} ra={:#x}", tag, fault, badvaddr, epc, ra);
    panic!("{:#x}: {} at {:#x}({}<-{}): {}", badvaddr, tag, epc, symbol, caller, fault);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::Asid;

    static SYMBOLS: &[(u32, &str)] =
        &[(0x8000_0000, "kernel_start"), (0x8000_0100, "tlb_invalid"), (0x8000_0800, "copy_from_user")];

    fn lookup(addr: usize) -> Option<&'static str> {
        trap::nearest_symbol_in(SYMBOLS, addr).map(|(name, _)| name)
    }

    #[test]
    #[should_panic(expected = "0x2000: TLB Refill Exception at 0x80001234(<-): no such mapping")]
    fn refill_failure_message() {
        let mut frame = TrapFrame::default();
        frame.epc = 0x8000_1234;
        report(&frame, 0x2000, FailureTag::RefillFailure, TlbFault::NoMapping);
    }

    #[test]
    #[should_panic(expected = "TLB Modified Exception")]
    fn modified_failure_names_tag() {
        report(&TrapFrame::default(), 0x1000, FailureTag::ModifiedFailure, TlbFault::PermissionDenied);
    }

    #[test]
    #[should_panic(
        expected = "0x3000: TLB Invalid Exception at 0x80000120(tlb_invalid<-copy_from_user): ASID mismatch"
    )]
    fn failure_message_names_epc_and_ra_symbols() {
        let mut frame = TrapFrame::default();
        frame.epc = 0x8000_0120;
        frame.x[31] = 0x8000_0844;
        let fault = TlbFault::AsidMismatch { hardware: Asid::from_raw(4), active: Asid::from_raw(3) };
        report_with(lookup, &frame, 0x3000, FailureTag::InvalidFailure, fault);
    }

    #[test]
    #[should_panic(expected = "at 0x7000(<-kernel_start)")]
    fn unknown_epc_leaves_symbol_blank() {
        let mut frame = TrapFrame::default();
        frame.epc = 0x7000;
        frame.x[31] = 0x8000_0004;
        report_with(lookup, &frame, 0x1000, FailureTag::RefillFailure, TlbFault::NoMapping);
    }
}
