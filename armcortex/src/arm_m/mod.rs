//! Support for ARMv7-M processors (Cortex-M3, M4, M7).
//!
//! Every peripheral driver here can also be pointed at an ordinary block of
//! memory laid out like its registers.  That is how the interrupt logic gets
//! exercised on a host, where the real addresses mean nothing.

pub mod dwt;
pub mod exc;
pub mod interrupt;
pub mod irq;
pub mod nvic;
pub mod reg;
pub mod scb;
pub mod sys_tick;
pub mod vector_table;

/// Generates an instruction synchronization barrier (`ISB`) instruction.  For
/// other types of barriers, see Rust's fence operations.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline]
pub fn instruction_synchronization_barrier() {
    unsafe {
        core::arch::asm!("isb", options(nostack, preserves_flags))
    }
}

/// Generates a data synchronization barrier (`DSB`) instruction, which stalls
/// until every outstanding memory access, including writes to system control
/// registers, has completed.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline]
pub fn data_synchronization_barrier() {
    unsafe {
        core::arch::asm!("dsb", options(nostack, preserves_flags))
    }
}

// Off target there is no pipeline to flush and no write buffer to drain.

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline]
pub fn instruction_synchronization_barrier() {}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline]
pub fn data_synchronization_barrier() {}
