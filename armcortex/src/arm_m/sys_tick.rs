//! ARMv7-M SysTick timer support.
//!
//! SysTick is a core exception, so its handler is installed like any other:
//!
//! ```ignore
//! interrupt(SysTick::IRQ).enable(tick)?;
//! SYS_TICK.configure(16_000 - 1, ClkSource::ProcessorClock);
//! SYS_TICK.start(true);
//! ```

use bitflags::bitflags;

use crate::arm_m::irq::Irq;
use crate::arm_m::reg::Reg;

#[repr(C)]
pub struct Registers {
    pub csr:   Reg<u32>,
    pub rvr:   Reg<u32>,
    pub cvr:   Reg<u32>,
    pub calib: Reg<u32>,
}

impl Registers {
    pub const fn new() -> Self {
        Registers {
            csr: Reg::new(0),
            rvr: Reg::new(0),
            cvr: Reg::new(0),
            calib: Reg::new(0),
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

pub const SYS_TICK_ADDRESS: usize = 0xe000e010;

/// Largest value the 24-bit reload register holds.
pub const MAX_RELOAD: u32 = 0x00ff_ffff;

bitflags! {
    /// Control and Status Register.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Csr: u32 {
        const ENABLE    = 1 << 0;
        /// Pend the SysTick exception when the counter reaches zero.
        const TICKINT   = 1 << 1;
        /// Set: processor clock.  Clear: implementation-defined reference.
        const CLKSOURCE = 1 << 2;
        /// Counter reached zero since the last read.  Reading clears it.
        const COUNTFLAG = 1 << 16;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClkSource {
    ExternalReference = 0,
    ProcessorClock = 1,
}

pub struct SysTick {
    reg: *const Registers,
}

impl SysTick {
    /// The exception SysTick raises.
    pub const IRQ: Irq = Irq::SYS_TICK;

    // TODO: this peripheral, unusually for something designed by ARM, contains
    // read-to-clear bits and R/W bits without inherent atomic updates.  So
    // `start` and `stop` can lose a concurrent COUNTFLAG.

    /// # Safety
    ///
    /// `address` must be the SysTick register block (`SYS_TICK_ADDRESS`).
    pub const unsafe fn from_address(address: usize) -> Self {
        SysTick { reg: address as *const Registers }
    }

    pub const fn in_memory(reg: &'static Registers) -> Self {
        SysTick { reg }
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }

    pub fn read_csr(&self) -> Csr {
        Csr::from_bits_retain(self.reg().csr.get())
    }

    pub fn write_csr(&self, v: Csr) {
        self.reg().csr.set(v.bits())
    }

    pub fn read_rvr(&self) -> u32 {
        self.reg().rvr.get()
    }

    pub fn write_rvr(&self, v: u32) {
        self.reg().rvr.set(v)
    }

    pub fn read_cvr(&self) -> u32 {
        self.reg().cvr.get()
    }

    /// Any write clears the current value (and COUNTFLAG).
    pub fn write_cvr(&self, v: u32) {
        self.reg().cvr.set(v)
    }

    /// Stops the counter, loads `reload` and selects `source`.  The counter
    /// wraps every `reload + 1` ticks.
    pub fn configure(&self, reload: u32, source: ClkSource) {
        debug_assert!(reload <= MAX_RELOAD);
        self.stop();
        self.write_rvr(reload & MAX_RELOAD);
        self.write_cvr(0);
        let csr = match source {
            ClkSource::ProcessorClock => Csr::CLKSOURCE,
            ClkSource::ExternalReference => Csr::empty(),
        };
        self.write_csr(csr)
    }

    /// Starts counting, raising `SysTick::IRQ` at each wrap if `interrupt`.
    pub fn start(&self, interrupt: bool) {
        let mut csr = self.read_csr() - Csr::COUNTFLAG;
        csr.set(Csr::TICKINT, interrupt);
        self.write_csr(csr | Csr::ENABLE)
    }

    pub fn stop(&self) {
        let csr = self.read_csr() - Csr::COUNTFLAG;
        self.write_csr(csr - Csr::ENABLE - Csr::TICKINT)
    }

    pub fn clock_source(&self) -> ClkSource {
        if self.read_csr().contains(Csr::CLKSOURCE) {
            ClkSource::ProcessorClock
        } else {
            ClkSource::ExternalReference
        }
    }

    /// True if the counter has reached zero since this was last asked.
    pub fn has_wrapped(&self) -> bool {
        self.read_csr().contains(Csr::COUNTFLAG)
    }
}

unsafe impl Sync for SysTick {}

#[cfg(target_os = "none")]
pub static SYS_TICK: SysTick = unsafe { SysTick::from_address(SYS_TICK_ADDRESS) };
