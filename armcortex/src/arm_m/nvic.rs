//! Support for the ARM Nested Vector Interrupt Controller, or NVIC.
//!
//! This is the interrupt controller used across all (current) M-profile
//! processors.

use core::mem::offset_of;
use core::sync::atomic;

use static_assertions::{assert_eq_size, const_assert_eq};

use crate::arm_m;
use crate::arm_m::irq::Irq;
use crate::arm_m::reg::Reg;

/// Base address of the NVIC register block on every M-profile part.
pub const NVIC_ADDRESS: usize = 0xe000e100;

#[cfg(feature = "priority-bits-2")]
pub const PRIORITY_BITS: u32 = 2;
#[cfg(feature = "priority-bits-3")]
pub const PRIORITY_BITS: u32 = 3;
#[cfg(feature = "priority-bits-4")]
pub const PRIORITY_BITS: u32 = 4;
/// Number of priority bits the SoC implements, from the top of each `ip`
/// byte down.
#[cfg(not(any(feature = "priority-bits-2",
              feature = "priority-bits-3",
              feature = "priority-bits-4")))]
pub const PRIORITY_BITS: u32 = 8;

const PRIORITY_SHIFT: u32 = 8 - PRIORITY_BITS;

/// Most vendor interrupts an ARMv7-M NVIC can serve.  Enable bits exist for
/// a few more, but priority fields stop here.
pub const MAX_IRQS: usize = 240;

/// The NVIC's memory-mapped registers, reserved gaps included.  The layout
/// matches the silicon exactly, so a `Registers` in RAM is a faithful
/// stand-in for the real thing.
#[repr(C)]
pub struct Registers {
    /// The Interrupt Set Enabled Registers have one bit for each potential
    /// interrupt source.  Writing ones causes the corresponding interrupt(s) to
    /// become enabled; others remain unchanged.
    pub iser: [Reg<u32>; 8], _reserved_after_iser: [Reg<u32>; 24],

    /// The Interrupt Clear Enabled Registers have one bit for each potential
    /// interrupt source.  Writing ones causes the corresponding interrupt(s) to
    /// become disabled; others remain unchanged.
    pub icer: [Reg<u32>; 8], _reserved_after_icer: [Reg<u32>; 24],

    /// The Interrupt Set Pending Registers have one bit for each potential
    /// interrupt source.  Writing ones causes the corresponding interrupt(s) to
    /// become pending; others remain unchanged.
    pub ispr: [Reg<u32>; 8], _reserved_after_ispr: [Reg<u32>; 24],

    /// The Interrupt Clear Pending Registers have one bit for each potential
    /// interrupt source.  Writing ones causes the corresponding interrupt(s) to
    /// become non-pending; others remain unchanged.
    pub icpr: [Reg<u32>; 8], _reserved_after_icpr: [Reg<u32>; 24],

    /// The Interrupt Active Bit Registers have one bit for each potential
    /// interrupt source.  The bit is 1 if the interrupt is active, 0 otherwise.
    pub iabr: [Reg<u32>; 8], _reserved_after_iabr: [Reg<u32>; 56],

    /// The Interrupt Priority Registers contain an 8-bit field for each
    /// potential interrupt source.  Note that SoC vendors may leave some LSBs
    /// of the field unimplemented; see `PRIORITY_BITS`.
    ///
    /// While described in the ARM as 32-bit registers, these registers are
    /// explicitly permitted for byte access, which is how we model them here.
    pub ip: [Reg<u8>; MAX_IRQS], _reserved_after_ip: [Reg<u32>; 644],

    /// Software Trigger Interrupt Register.  Writing an interrupt number pends
    /// that interrupt.
    pub stir: Reg<u32>,
}

const_assert_eq!(offset_of!(Registers, iser), 0x000);
const_assert_eq!(offset_of!(Registers, icer), 0x080);
const_assert_eq!(offset_of!(Registers, ispr), 0x100);
const_assert_eq!(offset_of!(Registers, icpr), 0x180);
const_assert_eq!(offset_of!(Registers, iabr), 0x200);
const_assert_eq!(offset_of!(Registers, ip), 0x300);
const_assert_eq!(offset_of!(Registers, stir), 0xe00);
assert_eq_size!(Registers, [u32; 0x381]);

impl Registers {
    /// An all-zero register block, as a stand-in for hardware.
    pub const fn new() -> Self {
        const W: Reg<u32> = Reg::new(0);
        const B: Reg<u8> = Reg::new(0);
        Registers {
            iser: [W; 8], _reserved_after_iser: [W; 24],
            icer: [W; 8], _reserved_after_icer: [W; 24],
            ispr: [W; 8], _reserved_after_ispr: [W; 24],
            icpr: [W; 8], _reserved_after_icpr: [W; 24],
            iabr: [W; 8], _reserved_after_iabr: [W; 56],
            ip: [B; MAX_IRQS], _reserved_after_ip: [W; 644],
            stir: W,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// What sits behind an `Nvic`'s registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backing {
    /// The real peripheral.  Enable registers are write-one-to-set/clear and
    /// reads reflect interrupt state.
    Hardware,
    /// Ordinary memory.  Writes stick exactly as written, so anything that
    /// depends on the hardware's side effects has to model them.
    Memory,
}

/// Driver for the NVIC.
///
/// Because operations on the NVIC affect interrupts, which are asynchronous
/// events that can affect program order and make things difficult to reason
/// about, the methods on `Nvic` are very carefully specified.
///
/// All per-interrupt methods take vendor interrupts only (`irq >= 0`); core
/// exceptions are not controlled through the NVIC.
pub struct Nvic {
    reg: *const Registers,
    backing: Backing,
}

impl Nvic {
    /// Drives the hardware NVIC at `address`.
    ///
    /// # Safety
    ///
    /// `address` must be the NVIC's register block (normally `NVIC_ADDRESS`),
    /// and only one `Nvic` should drive it.
    pub const unsafe fn from_address(address: usize) -> Self {
        Nvic {
            reg: address as *const Registers,
            backing: Backing::Hardware,
        }
    }

    /// Drives a register block in plain memory.
    pub const fn in_memory(reg: &'static Registers) -> Self {
        Nvic {
            reg,
            backing: Backing::Memory,
        }
    }

    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Ensures that an interrupt is enabled by the time this function returns.
    ///
    /// If the interrupt is pending, and the current execution priority allows
    /// it to preempt, the handler will have run *before this function returns*.
    ///
    /// Only `irq`'s bit is written as a one; the hardware leaves every other
    /// interrupt alone, so no read-modify-write is needed.
    #[inline]
    pub fn enable_irq(&self, irq: Irq) {
        self.reg().iser[irq.bank()].set(irq.enable_mask());
        Self::write_barriers()
    }

    /// Ensures that an interrupt is disabled by the time this function returns.
    ///
    /// In the presence of a concurrent or pending interrupt from `irq`,
    /// assuming the current execution priority would allow it to preempt, its
    /// handler will either execute before this function returns, or will be
    /// deferred.
    ///
    /// Thus, code appearing after a call to `disable_irq` in program order
    /// can assume it will not be preempted by this interrupt (assuming that
    /// some other concurrent activity, such as a separate interrupt, doesn't
    /// re-enable it).
    #[inline]
    pub fn disable_irq(&self, irq: Irq) {
        self.reg().icer[irq.bank()].set(irq.enable_mask());
        Self::write_barriers()
    }

    /// Reads back `irq`'s bit in the set-enable register.
    pub fn is_enabled(&self, irq: Irq) -> bool {
        atomic::fence(atomic::Ordering::Acquire);
        self.reg().iser[irq.bank()].get() & irq.enable_mask() != 0
    }

    /// Masks every vendor interrupt.
    ///
    /// Memory has none of the hardware's write-one-to-clear behavior, so for
    /// `Backing::Memory` both enable arrays are zeroed afterwards to leave
    /// them looking the way the hardware would.
    pub fn disable_all(&self) {
        let reg = self.reg();
        for icer in &reg.icer {
            icer.set(0xffff_ffff);
        }

        if self.backing == Backing::Memory {
            for iser in &reg.iser {
                iser.set(0);
            }
            for icer in &reg.icer {
                icer.set(0);
            }
        }
        Self::write_barriers()
    }

    /// Marks `irq` pending.  If it is enabled and may preempt, the handler
    /// runs before this returns.
    pub fn set_pending(&self, irq: Irq) {
        self.reg().ispr[irq.bank()].set(irq.enable_mask());
        Self::write_barriers()
    }

    /// Ensures that an interrupt is not pending.  If hardware continues
    /// generating IRQs, the interrupt may immediately start pending again.
    pub fn clear_pending(&self, irq: Irq) {
        self.reg().icpr[irq.bank()].set(irq.enable_mask());
        Self::write_barriers()
    }

    pub fn is_pending(&self, irq: Irq) -> bool {
        atomic::fence(atomic::Ordering::Acquire);
        self.reg().ispr[irq.bank()].get() & irq.enable_mask() != 0
    }

    /// True while `irq`'s handler is executing or preempted.
    pub fn is_active(&self, irq: Irq) -> bool {
        atomic::fence(atomic::Ordering::Acquire);
        self.reg().iabr[irq.bank()].get() & irq.enable_mask() != 0
    }

    /// Sets the priority of an interrupt, synchronously.  `priority` is a
    /// logical level in `0 .. 1 << PRIORITY_BITS`; lower is more urgent.
    ///
    /// This may cause immediate preemption in the following cases:
    ///
    /// 1. If `priority` is eligible for preempt at the current execution
    ///    priority, and `irq` is pending.
    ///
    /// 2. If called from the handler from `irq` such that `priority` *lowers*
    ///    the current execution priority, and a different interrupt with
    ///    higher priority is pending.
    pub fn set_priority(&self, irq: Irq, priority: u8) {
        debug_assert!(u32::from(priority) < 1 << PRIORITY_BITS);
        self.reg().ip[Self::ip_index(irq)].set(priority << PRIORITY_SHIFT);
        Self::write_barriers()
    }

    /// Reads the priority of an interrupt as a logical level.
    ///
    /// This operation is atomic with respect to `set_priority`, but makes
    /// no particular guarantees about interaction with preempting interrupt
    /// handlers.
    pub fn priority(&self, irq: Irq) -> u8 {
        atomic::fence(atomic::Ordering::Acquire);
        self.reg().ip[Self::ip_index(irq)].get() >> PRIORITY_SHIFT
    }

    /// Pends `irq` through the Software Trigger Interrupt Register.
    pub fn trigger(&self, irq: Irq) {
        debug_assert!(!irq.default_enabled());
        self.reg().stir.set(irq.number() as u32);
        Self::write_barriers()
    }

    fn ip_index(irq: Irq) -> usize {
        debug_assert!(!irq.default_enabled());
        irq.number() as usize
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }

    #[inline]
    fn write_barriers() {
        // Data fence to ensure the write is not buffered (emits DMB).
        atomic::fence(atomic::Ordering::Release);
        // Instruction barrier to flush any instructions fetched before the
        // write completed.
        arm_m::instruction_synchronization_barrier()
    }
}

unsafe impl Sync for Nvic {}

/// Shared static instance of the `Nvic` driver.
#[cfg(target_os = "none")]
pub static NVIC: Nvic = unsafe { Nvic::from_address(NVIC_ADDRESS) };
