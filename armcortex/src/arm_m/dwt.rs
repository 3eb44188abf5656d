//! Data Watchpoint and Trace unit, used here only for its cycle counter.
//!
//! The counter lives in the DWT, but the DWT itself is powered off until
//! trace is enabled in the debug block's DEMCR, so the driver needs both.

use bitflags::bitflags;

use crate::arm_m::reg::Reg;

pub const DWT_ADDRESS: usize = 0xe0001000;
pub const DEMCR_ADDRESS: usize = 0xe000edfc;

#[repr(C)]
pub struct Registers {
    pub ctrl:     Reg<u32>,
    pub cyccnt:   Reg<u32>,
    pub cpicnt:   Reg<u32>,
    pub exccnt:   Reg<u32>,
    pub sleepcnt: Reg<u32>,
    pub lsucnt:   Reg<u32>,
    pub foldcnt:  Reg<u32>,
    pub pcsr:     Reg<u32>,
}

impl Registers {
    pub const fn new() -> Self {
        const W: Reg<u32> = Reg::new(0);
        Registers {
            ctrl: W,
            cyccnt: W,
            cpicnt: W,
            exccnt: W,
            sleepcnt: W,
            lsucnt: W,
            foldcnt: W,
            pcsr: W,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    /// DWT Control Register, the bits we care about.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Ctrl: u32 {
        const CYCCNTENA = 1 << 0;
        /// Read-only: set if the part has no cycle counter.
        const NOCYCCNT  = 1 << 25;
    }
}

bitflags! {
    /// Debug Exception and Monitor Control Register.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Demcr: u32 {
        /// Global enable for the DWT and ITM.
        const TRCENA = 1 << 24;
    }
}

/// Driver for the cycle counter.
pub struct Dwt {
    reg: *const Registers,
    demcr: *const Reg<u32>,
}

impl Dwt {
    /// # Safety
    ///
    /// The addresses must be the DWT block and DEMCR (`DWT_ADDRESS`,
    /// `DEMCR_ADDRESS`).
    pub const unsafe fn from_address(dwt: usize, demcr: usize) -> Self {
        Dwt {
            reg: dwt as *const Registers,
            demcr: demcr as *const Reg<u32>,
        }
    }

    pub const fn in_memory(reg: &'static Registers, demcr: &'static Reg<u32>) -> Self {
        Dwt { reg, demcr }
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }

    fn demcr(&self) -> &Reg<u32> {
        unsafe { &*self.demcr }
    }

    pub fn read_ctrl(&self) -> Ctrl {
        Ctrl::from_bits_retain(self.reg().ctrl.get())
    }

    pub fn write_ctrl(&self, v: Ctrl) {
        self.reg().ctrl.set(v.bits())
    }

    /// Some minimal implementations leave the cycle counter out.
    pub fn has_cycle_counter(&self) -> bool {
        !self.read_ctrl().contains(Ctrl::NOCYCCNT)
    }

    /// Powers up trace and starts the cycle counter from wherever it is.
    pub fn enable_cycle_counter(&self) {
        self.demcr().update(|v| v | Demcr::TRCENA.bits());
        self.write_ctrl(self.read_ctrl() | Ctrl::CYCCNTENA)
    }

    /// Stops the counter.  Trace stays powered, since a debugger may be
    /// using it.
    pub fn disable_cycle_counter(&self) {
        self.write_ctrl(self.read_ctrl() - Ctrl::CYCCNTENA)
    }

    /// Current cycle count.  Wraps at 2^32.
    pub fn cycles(&self) -> u32 {
        self.reg().cyccnt.get()
    }

    pub fn reset_cycles(&self) {
        self.reg().cyccnt.set(0)
    }
}

unsafe impl Sync for Dwt {}

#[cfg(target_os = "none")]
pub static DWT: Dwt = unsafe { Dwt::from_address(DWT_ADDRESS, DEMCR_ADDRESS) };

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;

    fn stand_in() -> (&'static Registers, &'static Reg<u32>, Dwt) {
        let reg: &'static Registers = Box::leak(Box::new(Registers::new()));
        let demcr: &'static Reg<u32> = Box::leak(Box::new(Reg::new(0)));
        (reg, demcr, Dwt::in_memory(reg, demcr))
    }

    #[test]
    fn enable_powers_trace_first() {
        let (reg, demcr, dwt) = stand_in();
        demcr.set(1);
        dwt.enable_cycle_counter();
        assert_eq!(demcr.get(), 1 | 1 << 24);
        assert_eq!(reg.ctrl.get(), 1);
    }

    #[test]
    fn disable_leaves_trace_on() {
        let (reg, demcr, dwt) = stand_in();
        dwt.enable_cycle_counter();
        dwt.disable_cycle_counter();
        assert_eq!(reg.ctrl.get(), 0);
        assert_eq!(demcr.get(), 1 << 24);
    }

    #[test]
    fn count_reads_and_resets() {
        let (reg, _, dwt) = stand_in();
        reg.cyccnt.set(123_456);
        assert_eq!(dwt.cycles(), 123_456);
        dwt.reset_cycles();
        assert_eq!(dwt.cycles(), 0);
    }

    #[test]
    fn missing_counter_is_detected() {
        let (reg, _, dwt) = stand_in();
        assert!(dwt.has_cycle_counter());
        reg.ctrl.set(1 << 25);
        assert!(!dwt.has_cycle_counter());
    }
}
