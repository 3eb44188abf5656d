//! Interrupt request numbers.
//!
//! ARM numbers exceptions two ways.  The vector table counts from zero at the
//! initial stack pointer; the NVIC (and CMSIS) count from zero at the first
//! vendor interrupt, which puts the core exceptions at negative numbers.  `Irq`
//! uses the latter and knows how to convert to everything else the hardware
//! wants.

use core::fmt;

use crate::arm_m::exc::CORE_INTERRUPTS;

/// Bits 5 and above of an IRQ number select which 32-bit word of the NVIC's
/// enable arrays holds its bit.
const INDEX_POSITION: i32 = 5;

/// The low 5 bits select the bit within that word.
const ENABLE_MASK_CODE: i32 = 0x1F;

/// An interrupt request number.  Negative values are core exceptions,
/// non-negative values are vendor interrupts.
///
/// Nothing here checks the number against the vector table, because the table
/// is sized at runtime.  See `is_valid`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Irq(i32);

impl Irq {
    /// The lowest slot an IRQ can address, which is the initial stack pointer
    /// and never a valid IRQ.  Valid IRQs are strictly greater.
    pub const BEGIN: i32 = -CORE_INTERRUPTS;

    pub const NMI: Irq = Irq(-14);
    pub const HARD_FAULT: Irq = Irq(-13);
    pub const MEM_MANAGE: Irq = Irq(-12);
    pub const BUS_FAULT: Irq = Irq(-11);
    pub const USAGE_FAULT: Irq = Irq(-10);
    pub const SV_CALL: Irq = Irq(-5);
    pub const DEBUG_MONITOR: Irq = Irq(-4);
    pub const PEND_SV: Irq = Irq(-2);
    pub const SYS_TICK: Irq = Irq(-1);

    pub const fn new(irq: i32) -> Self {
        Irq(irq)
    }

    /// The raw request number.
    pub const fn number(self) -> i32 {
        self.0
    }

    /// Core exceptions have no bit in the NVIC enable arrays; the hardware
    /// services them whenever they have a vector.
    pub const fn default_enabled(self) -> bool {
        self.0 < 0
    }

    /// Index of the 32-bit word in `iser`/`icer` (and friends) that holds
    /// this IRQ's bit.  Meaningless for default-enabled IRQs.
    pub const fn register_index(self) -> i32 {
        self.0 >> INDEX_POSITION
    }

    /// Mask with a single 1 in this IRQ's bit position within its word.
    pub const fn enable_mask(self) -> u32 {
        1 << (self.0 & ENABLE_MASK_CODE)
    }

    /// Slot in the vector table.  Only meaningful for valid IRQs.
    pub const fn vector_index(self) -> usize {
        (self.0 + CORE_INTERRUPTS) as usize
    }

    /// One past the last valid IRQ for a table of `vector_count` slots.
    pub const fn end(vector_count: usize) -> i32 {
        vector_count as i32 - CORE_INTERRUPTS
    }

    /// Checks whether this IRQ has a slot in a vector table of `vector_count`
    /// entries (core exceptions included).
    pub const fn is_valid(self, vector_count: usize) -> bool {
        self.0 > Self::BEGIN && self.0 < Self::end(vector_count)
    }

    /// Word index as a `usize`, for vendor interrupts only.
    pub(crate) fn bank(self) -> usize {
        debug_assert!(!self.default_enabled());
        self.register_index() as usize
    }
}

impl From<i32> for Irq {
    fn from(irq: i32) -> Self {
        Irq(irq)
    }
}

impl From<Irq> for i32 {
    fn from(irq: Irq) -> Self {
        irq.0
    }
}

impl fmt::Display for Irq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IRQ {}", self.0)
    }
}
