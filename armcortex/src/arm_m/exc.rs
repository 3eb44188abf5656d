//! ARMvx-M exception model basics.
//!
//! The processor's vector table is a flat array of handler addresses.  The
//! first sixteen entries belong to the processor core:
//!
//! | Slot | Use                          |
//! |------|------------------------------|
//! | 0    | Initial stack pointer        |
//! | 1    | Reset                        |
//! | 2    | NMI                          |
//! | 3    | Hard Fault                   |
//! | 4    | Memory Management Fault      |
//! | 5    | Bus Fault                    |
//! | 6    | Usage Fault                  |
//! | 7-10 | Reserved                     |
//! | 11   | Supervisor Call (`SVC`)      |
//! | 12   | Debug Monitor                |
//! | 13   | Reserved                     |
//! | 14   | PendSV                       |
//! | 15   | SysTick                      |
//!
//! Vendor-specific interrupts routed through the NVIC follow, starting at slot
//! 16.  Slots 0 and 1 are only consulted at reset, so a table that is installed
//! after boot may hold anything there.

/// ARMvx-M interrupt and exception handlers are merely functions conforming to
/// the C ABI.
pub type Handler = extern "C" fn();

/// Number of vector table slots owned by the processor core.  Every Cortex-M3,
/// M4 and M7 has exactly this many, reserved entries included.
pub const CORE_INTERRUPTS: i32 = 16;

/// Placeholder handler that does nothing.  Unused and disabled vectors point
/// here, so a spurious interrupt returns immediately instead of jumping
/// through garbage.
pub extern "C" fn nop() {}
