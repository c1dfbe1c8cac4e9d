// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Processor-local critical sections
//! OWNERS: @kernel-sync-team
//! PUBLIC API: IrqGuard::new(), Deref/DerefMut to the guarded Cp0
//! DEPENDS_ON: arch::mips32::cp0
//! INVARIANTS: Interrupts stay masked for the guard's lifetime; the previous level is restored on drop

use core::ops::{Deref, DerefMut};

use crate::arch::mips32::cp0::{Cp0, Ipl};

/// Exclusive CP0 access with local interrupts masked.
///
/// Holding `&mut IrqGuard<C>` is the proof required by TLB sequences that
/// reposition Index and must not be interleaved with a trap handler.
pub struct IrqGuard<'a, C: Cp0> {
    cp0: &'a mut C,
    ipl: Ipl,
}

impl<'a, C: Cp0> IrqGuard<'a, C> {
    pub fn new(cp0: &'a mut C) -> Self {
        let ipl = cp0.interrupts_disable();
        Self { cp0, ipl }
    }
}

impl<C: Cp0> Deref for IrqGuard<'_, C> {
    type Target = C;
    fn deref(&self) -> &C {
        self.cp0
    }
}

impl<C: Cp0> DerefMut for IrqGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.cp0
    }
}

impl<C: Cp0> Drop for IrqGuard<'_, C> {
    fn drop(&mut self) {
        self.cp0.interrupts_restore(self.ipl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimCp0;

    #[test]
    fn guard_restores_previous_level() {
        let mut cp0 = SimCp0::new();
        assert!(cp0.interrupts_enabled());
        {
            let guard = IrqGuard::new(&mut cp0);
            assert!(!guard.interrupts_enabled());
        }
        assert!(cp0.interrupts_enabled());
    }

    #[test]
    fn nested_guards_keep_interrupts_masked() {
        let mut cp0 = SimCp0::new();
        let mut outer = IrqGuard::new(&mut cp0);
        {
            let inner = IrqGuard::new(&mut *outer);
            assert!(!inner.interrupts_enabled());
        }
        assert!(!outer.interrupts_enabled());
        drop(outer);
        assert!(cp0.interrupts_enabled());
    }
}
