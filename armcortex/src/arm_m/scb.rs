//! ARMv7-M System Control Block support.
//!
//! The only part of the SCB the interrupt layer needs is the Vector Table
//! Offset Register, which it reaches through the `SystemControl` trait so that
//! it never touches the register directly.

use core::sync::atomic;

use crate::arm_m;
use crate::arm_m::reg::Reg;
use crate::arm_m::vector_table::Vector;

/// Base address of the SCB on every M-profile part.
pub const SCB_ADDRESS: usize = 0xe000ed00;

/// SCB registers, up to the fault address registers.
///
/// `vtor` holds an address and is modelled as `usize`, which is the same 32
/// bits as the other registers on every M-profile part.  That lets a
/// `Registers` in host memory hold a real host address.
#[repr(C)]
pub struct Registers {
    pub cpuid:   Reg<u32>,
    pub icsr:    Reg<u32>,
    pub vtor:    Reg<usize>,
    pub aircr:   Reg<u32>,
    pub scr:     Reg<u32>,
    pub ccr:     Reg<u32>,
    pub shpr:    [Reg<u32>; 3],
    pub shcsr:   Reg<u32>,
    pub cfsr:    Reg<u32>,
    pub hfsr:    Reg<u32>,
    pub dfsr:    Reg<u32>,
    pub mmfar:   Reg<u32>,
    pub bfar:    Reg<u32>,
    pub afsr:    Reg<u32>,
}

#[cfg(target_pointer_width = "32")]
mod layout {
    use core::mem::offset_of;
    use static_assertions::const_assert_eq;

    use super::Registers;

    const_assert_eq!(offset_of!(Registers, vtor), 0x08);
    const_assert_eq!(offset_of!(Registers, shpr), 0x18);
    const_assert_eq!(offset_of!(Registers, afsr), 0x3c);
}

impl Registers {
    /// All-zero SCB, as a stand-in for hardware.  A zero `vtor` reads as "no
    /// vector table relocated yet".
    pub const fn new() -> Self {
        const W: Reg<u32> = Reg::new(0);
        Registers {
            cpuid: W,
            icsr: W,
            vtor: Reg::new(0),
            aircr: W,
            scr: W,
            ccr: W,
            shpr: [W; 3],
            shcsr: W,
            cfsr: W,
            hfsr: W,
            dfsr: W,
            mmfar: W,
            bfar: W,
            afsr: W,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// The capability to find and move the active vector table.
///
/// Implementations must not cache: a `set` must be visible to the very next
/// `get`, because that readback is how initialization decides whether it has
/// already happened.
pub trait SystemControl {
    /// Address of the active vector table, or null if none has been
    /// relocated.
    fn interrupt_vector_table_address(&self) -> *const Vector;

    /// Points the processor at a new vector table.  Passing null returns to
    /// the "not relocated" state.
    fn set_interrupt_vector_table_address(&self, table: *const Vector);
}

pub struct Scb {
    reg: *const Registers,
}

impl Scb {
    /// # Safety
    ///
    /// `address` must be the SCB's register block (normally `SCB_ADDRESS`).
    pub const unsafe fn from_address(address: usize) -> Self {
        Scb { reg: address as *const Registers }
    }

    pub const fn in_memory(reg: &'static Registers) -> Self {
        Scb { reg }
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }
}

impl SystemControl for Scb {
    fn interrupt_vector_table_address(&self) -> *const Vector {
        self.reg().vtor.get() as *const Vector
    }

    fn set_interrupt_vector_table_address(&self, table: *const Vector) {
        self.reg().vtor.set(table as usize);
        // The new table must be in effect before any exception is taken.
        atomic::fence(atomic::Ordering::SeqCst);
        arm_m::data_synchronization_barrier();
        arm_m::instruction_synchronization_barrier()
    }
}

unsafe impl Sync for Scb {}

/// Shared static instance of the `Scb` driver.
#[cfg(target_os = "none")]
pub static SCB: Scb = unsafe { Scb::from_address(SCB_ADDRESS) };

/// `true` if `control` reports a relocated vector table.
pub fn vector_table_is_relocated<S: SystemControl + ?Sized>(control: &S) -> bool {
    !control.interrupt_vector_table_address().is_null()
}
