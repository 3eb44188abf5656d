//! RAM vector tables.
//!
//! The processor starts out using the vector table in flash.  To install
//! handlers at runtime the table has to move to RAM, into a buffer that lives
//! for the rest of the program and meets the alignment `VTOR` demands.
//! `VectorBuffer` is that buffer; `Interrupts::initialize` fills it and points
//! the hardware at it.

use core::mem;
use core::slice;

use crate::arm_m::exc::{nop, Handler, CORE_INTERRUPTS};
use crate::arm_m::nvic::MAX_IRQS;
use crate::arm_m::reg::Reg;

/// One slot of a vector table.  The processor reads these behind our back, so
/// they are written with volatile stores like any other register.
pub type Vector = Reg<Handler>;

/// Alignment of a relocated vector table.  `VTOR` ignores the low bits of the
/// address.  512 bytes is what the parts this crate targets require; a core
/// with more vectors than fit in 512 bytes may demand more.
pub const VECTOR_TABLE_ALIGN: usize = 512;

/// Backing store for a vector table with `N` vendor interrupts.  Core exception
/// slots come first, exactly as the processor expects.
///
/// Buffers are only useful with `'static` lifetime; declare one with the
/// `vector_table!` macro.  `N` may not exceed `nvic::MAX_IRQS`; a larger
/// buffer fails to compile.
#[repr(C, align(512))]
pub struct VectorBuffer<const N: usize> {
    core: [Vector; CORE_INTERRUPTS as usize],
    irqs: [Vector; N],
}

impl<const N: usize> VectorBuffer<N> {
    /// Total number of slots, core exceptions included.
    pub const LEN: usize = CORE_INTERRUPTS as usize + N;

    const FITS_NVIC: () = assert!(N <= MAX_IRQS,
                                  "more vendor interrupts than the NVIC serves");

    /// A buffer with every vector pointing at `nop`.
    pub const fn new() -> Self {
        let () = Self::FITS_NVIC;
        const NOP: Vector = Reg::new(nop);
        VectorBuffer {
            core: [NOP; CORE_INTERRUPTS as usize],
            irqs: [NOP; N],
        }
    }

    /// The buffer as one contiguous table.
    pub fn as_slice(&self) -> &[Vector] {
        // Both arrays hold the same pointer-sized type under repr(C), so
        // there is no padding between them.
        unsafe { slice::from_raw_parts(self as *const Self as *const Vector, Self::LEN) }
    }

    /// Points every slot at `handler`.
    pub fn fill(&self, handler: Handler) {
        for vector in self.as_slice() {
            vector.set(handler);
        }
    }
}

impl<const N: usize> Default for VectorBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const N: usize> Sync for VectorBuffer<N> {}

const _: () = assert!(mem::align_of::<VectorBuffer<0>>() == VECTOR_TABLE_ALIGN);

/// Declares a statically allocated `VectorBuffer` with room for `$count`
/// vendor interrupts, and evaluates to a `&'static` reference to it.
///
/// Each use of the macro is its own buffer.  Using it in a function that runs
/// more than once yields the same buffer every time.
///
/// ```ignore
/// let table = vector_table!(82);
/// INTERRUPTS.initialize(table);
/// ```
#[macro_export]
macro_rules! vector_table {
    ($count:expr) => {{
        static BUFFER: $crate::arm_m::vector_table::VectorBuffer<{ $count }> =
            $crate::arm_m::vector_table::VectorBuffer::new();
        &BUFFER
    }};
}
