//! Installing and controlling interrupt handlers at runtime.
//!
//! `Interrupts` owns the process-wide view of the RAM vector table and knows
//! which NVIC and which system control block to drive.  `Interrupt` is a
//! lightweight handle naming one IRQ; it installs or removes that IRQ's
//! handler and flips its enable bit.
//!
//! Usage on hardware:
//!
//! ```ignore
//! INTERRUPTS.initialize(vector_table!(82));
//! interrupt(Irq::new(37)).enable(usart1_isr)?;
//! ```
//!
//! Nothing here serializes callers.  Two contexts enabling or disabling the
//! *same* IRQ (say, thread code and a higher-priority handler) must arrange
//! their own exclusion, typically by masking interrupts around the call.
//! `initialize` and `reinitialize` must not race with anything.

use core::ptr;
use core::slice;
use core::sync::atomic::{self, AtomicPtr, AtomicUsize, Ordering};

use log::{debug, trace};
use thiserror::Error;

use crate::arm_m::exc::{nop, Handler};
use crate::arm_m::irq::Irq;
use crate::arm_m::nvic::Nvic;
use crate::arm_m::scb::{self, Scb, SystemControl};
use crate::arm_m::vector_table::{Vector, VectorBuffer};

/// Reasons an interrupt operation can be refused.  A refused operation has
/// not written anything.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// No vector table has been relocated to RAM.  This is usually a bug in
    /// the application's startup sequence; calling `Interrupts::initialize`
    /// fixes it.
    #[error("interrupt vector table has not been initialized")]
    VectorTableNotInitialized,

    /// The IRQ has no slot in the current vector table.  This points at a
    /// driver bug and is not usually recoverable.  Valid IRQs are greater
    /// than `Irq::BEGIN` and less than `end`.
    #[error("IRQ {invalid} is outside the vector table (valid IRQs are above -16 and below {end})")]
    InvalidIrq { invalid: i32, end: i32 },
}

pub type Result<T> = core::result::Result<T, Error>;

/// The interrupt controller: one per program.
///
/// Holds the published vector table (address and length, set by `initialize`)
/// along with the NVIC and system control block it operates on.  On hardware
/// use the `INTERRUPTS` static; elsewhere build one over register stand-ins.
pub struct Interrupts<'a, S: SystemControl = Scb> {
    nvic: &'a Nvic,
    control: &'a S,
    table: AtomicPtr<Vector>,
    len: AtomicUsize,
}

impl<'a, S: SystemControl> Interrupts<'a, S> {
    pub const fn new(nvic: &'a Nvic, control: &'a S) -> Self {
        Interrupts {
            nvic,
            control,
            table: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
        }
    }

    /// Relocates the vector table into `buffer`.
    ///
    /// If no table has been relocated yet, every slot of `buffer` is pointed
    /// at `nop`, `buffer` becomes the table seen by `vector_table` and every
    /// `Interrupt`, and the processor is switched over to it.
    ///
    /// If the system control block already reports a relocated table this
    /// does nothing, so independent startup paths may all call it.  Note that
    /// a later call with a different (or differently sized) buffer does *not*
    /// replace the active table; that buffer simply goes unused.
    pub fn initialize<const N: usize>(&self, buffer: &'static VectorBuffer<N>) {
        if scb::vector_table_is_relocated(self.control) {
            trace!("vector table already relocated, leaving it alone");
            return;
        }

        buffer.fill(nop);

        let vectors = buffer.as_slice();
        self.len.store(vectors.len(), Ordering::Release);
        self.table.store(vectors.as_ptr() as *mut Vector, Ordering::Release);

        self.control.set_interrupt_vector_table_address(vectors.as_ptr());
        debug!("vector table relocated to {:p} ({} vectors)",
               vectors.as_ptr(), vectors.len());
    }

    /// Starts over with a fresh vector table in `buffer`.
    ///
    /// Every vendor interrupt is disabled and every installed handler is
    /// forgotten, so this is only safe before drivers have set up their
    /// interrupts.
    pub fn reinitialize<const N: usize>(&self, buffer: &'static VectorBuffer<N>) {
        debug!("reinitializing vector table, all interrupts masked");
        self.nvic.disable_all();
        self.control.set_interrupt_vector_table_address(ptr::null());
        self.initialize(buffer);
    }

    /// The published vector table, empty before `initialize`.
    pub fn vector_table(&self) -> &'static [Vector] {
        let base = self.table.load(Ordering::Acquire);
        if base.is_null() {
            return &[];
        }
        let len = self.len.load(Ordering::Acquire);
        // Only ever set from a `&'static VectorBuffer` of exactly this length.
        unsafe { slice::from_raw_parts(base, len) }
    }

    /// Gets a handle for managing `irq`.  Handles are cheap and stateless;
    /// any number of them may name the same IRQ.
    pub fn interrupt(&self, irq: impl Into<Irq>) -> Interrupt<'_, S> {
        Interrupt {
            irq: irq.into(),
            interrupts: self,
        }
    }
}

/// Handle on a single IRQ.  Dropping it leaves the interrupt as it is.
pub struct Interrupt<'r, S: SystemControl = Scb> {
    irq: Irq,
    interrupts: &'r Interrupts<'r, S>,
}

impl<'r, S: SystemControl> Interrupt<'r, S> {
    pub fn irq(&self) -> Irq {
        self.irq
    }

    /// Installs `handler` as the service routine and enables the interrupt.
    ///
    /// Core exceptions are always enabled in hardware, so for them only the
    /// vector is written.
    pub fn enable(&self, handler: Handler) -> Result<()> {
        let table = self.sanity_check()?;

        table[self.irq.vector_index()].set(handler);

        if !self.irq.default_enabled() {
            // The new vector must land before the interrupt can fire.
            atomic::fence(Ordering::Release);
            self.interrupts.nvic.enable_irq(self.irq);
        }
        trace!("{} enabled", self.irq);
        Ok(())
    }

    /// Disables the interrupt and points its vector back at `nop`.
    pub fn disable(&self) -> Result<()> {
        let table = self.sanity_check()?;

        table[self.irq.vector_index()].set(nop);

        if !self.irq.default_enabled() {
            atomic::fence(Ordering::Release);
            self.interrupts.nvic.disable_irq(self.irq);
        }
        trace!("{} disabled", self.irq);
        Ok(())
    }

    /// Checks whether `handler` is the installed vector for this IRQ.  Meant
    /// for tests and diagnostics.
    ///
    /// Watch the NVIC half of this.  A core exception passes on the vector
    /// alone.  A vendor interrupt passes only if its set-enable bit reads
    /// back *clear*, so with real hardware, or any stand-in that remembers
    /// the write, a freshly `enable`d vendor interrupt reports `false`.
    pub fn verify_vector_enabled(&self, handler: Handler) -> Result<bool> {
        let table = self.sanity_check()?;

        let installed = table[self.irq.vector_index()].get();
        if installed as usize != handler as usize {
            return Ok(false);
        }

        if self.irq.default_enabled() {
            return Ok(true);
        }

        Ok(!self.interrupts.nvic.is_enabled(self.irq))
    }

    fn sanity_check(&self) -> Result<&'static [Vector]> {
        if !scb::vector_table_is_relocated(self.interrupts.control) {
            return Err(Error::VectorTableNotInitialized);
        }

        let table = self.interrupts.vector_table();
        if !self.irq.is_valid(table.len()) {
            return Err(Error::InvalidIrq {
                invalid: self.irq.number(),
                end: Irq::end(table.len()),
            });
        }

        Ok(table)
    }
}

/// The interrupt controller for this processor.
#[cfg(target_os = "none")]
pub static INTERRUPTS: Interrupts<'static, Scb> =
    Interrupts::new(&crate::arm_m::nvic::NVIC, &scb::SCB);

/// Shorthand for `INTERRUPTS.interrupt(irq)`.
#[cfg(target_os = "none")]
pub fn interrupt(irq: impl Into<Irq>) -> Interrupt<'static, Scb> {
    INTERRUPTS.interrupt(irq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_m::{nvic, scb};
    use core::sync::atomic::AtomicU32;
    use std::boxed::Box;
    use std::string::ToString;

    static HITS: AtomicU32 = AtomicU32::new(0);

    extern "C" fn isr_a() {
        let _ = HITS.fetch_add(1, Ordering::Relaxed);
    }

    extern "C" fn isr_b() {
        let _ = HITS.fetch_add(2, Ordering::Relaxed);
    }

    struct Rig {
        nvic: &'static nvic::Registers,
        scb: &'static scb::Registers,
        interrupts: Interrupts<'static, Scb>,
    }

    fn rig() -> Rig {
        let nvic_regs: &'static nvic::Registers =
            Box::leak(Box::new(nvic::Registers::new()));
        let scb_regs: &'static scb::Registers =
            Box::leak(Box::new(scb::Registers::new()));
        let nvic: &'static Nvic = Box::leak(Box::new(Nvic::in_memory(nvic_regs)));
        let scb: &'static Scb = Box::leak(Box::new(Scb::in_memory(scb_regs)));
        Rig {
            nvic: nvic_regs,
            scb: scb_regs,
            interrupts: Interrupts::new(nvic, scb),
        }
    }

    fn buffer<const N: usize>() -> &'static VectorBuffer<N> {
        Box::leak(Box::new(VectorBuffer::new()))
    }

    fn iser_is_untouched(rig: &Rig) -> bool {
        rig.nvic.iser.iter().all(|w| w.get() == 0)
            && rig.nvic.icer.iter().all(|w| w.get() == 0)
    }

    #[test]
    fn everything_fails_before_initialize() {
        let rig = rig();
        let irq = rig.interrupts.interrupt(5);
        assert_eq!(irq.enable(isr_a), Err(Error::VectorTableNotInitialized));
        assert_eq!(irq.disable(), Err(Error::VectorTableNotInitialized));
        assert_eq!(irq.verify_vector_enabled(isr_a),
                   Err(Error::VectorTableNotInitialized));
        assert!(iser_is_untouched(&rig));
        assert!(rig.interrupts.vector_table().is_empty());
    }

    #[test]
    fn initialize_publishes_and_relocates() {
        let rig = rig();
        let table = buffer::<32>();
        table.as_slice()[20].set(isr_a);

        rig.interrupts.initialize(table);

        let vectors = rig.interrupts.vector_table();
        assert_eq!(vectors.len(), 48);
        assert_eq!(vectors.as_ptr(), table.as_slice().as_ptr());
        assert_eq!(rig.scb.vtor.get(), vectors.as_ptr() as usize);
        assert!(vectors.iter().all(|v| v.get() as usize == nop as usize));
    }

    #[test]
    fn initialize_twice_changes_nothing() {
        let rig = rig();
        let first = buffer::<32>();
        rig.interrupts.initialize(first);
        rig.interrupts.interrupt(3).enable(isr_a).unwrap();

        let second = buffer::<64>();
        second.as_slice()[0].set(isr_b);
        rig.interrupts.initialize(second);

        assert_eq!(rig.scb.vtor.get(), first.as_slice().as_ptr() as usize);
        assert_eq!(rig.interrupts.vector_table().len(), 48);
        assert_eq!(first.as_slice()[19].get() as usize, isr_a as usize);
        // The unused buffer is not filled either.
        assert_eq!(second.as_slice()[0].get() as usize, isr_b as usize);
    }

    #[test]
    fn irq_bounds_follow_table_size() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<32>());

        assert_eq!(rig.interrupts.interrupt(-16).enable(isr_a),
                   Err(Error::InvalidIrq { invalid: -16, end: 32 }));
        assert_eq!(rig.interrupts.interrupt(32).enable(isr_a),
                   Err(Error::InvalidIrq { invalid: 32, end: 32 }));
        assert!(iser_is_untouched(&rig));

        assert_eq!(rig.interrupts.interrupt(-15).enable(isr_a), Ok(()));
        assert_eq!(rig.interrupts.interrupt(31).enable(isr_a), Ok(()));
    }

    #[test]
    fn largest_table_reaches_last_enable_word() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<{ nvic::MAX_IRQS }>());

        let last = rig.interrupts.interrupt(239);
        assert_eq!(last.enable(isr_a), Ok(()));
        assert_eq!(rig.interrupts.vector_table()[255].get() as usize, isr_a as usize);
        assert_eq!(rig.nvic.iser[7].get(), 1 << 15);

        assert_eq!(rig.interrupts.interrupt(240).enable(isr_a),
                   Err(Error::InvalidIrq { invalid: 240, end: 240 }));
        assert_eq!(rig.interrupts.vector_table().len(), 256);
        assert_eq!(rig.nvic.iser[7].get(), 1 << 15);
    }

    #[test]
    fn failed_operations_leave_table_alone() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<8>());
        assert!(rig.interrupts.interrupt(8).disable().is_err());
        assert!(rig.interrupts.interrupt(100).verify_vector_enabled(isr_a).is_err());
        assert!(rig.interrupts.vector_table()
                .iter().all(|v| v.get() as usize == nop as usize));
        assert!(iser_is_untouched(&rig));
    }

    #[test]
    fn enable_installs_vector_and_sets_enable_bit() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<32>());

        rig.interrupts.interrupt(Irq::new(5)).enable(isr_a).unwrap();

        let vectors = rig.interrupts.vector_table();
        assert_eq!(vectors[21].get() as usize, isr_a as usize);
        assert_eq!(rig.nvic.iser[0].get(), 1 << 5);
    }

    #[test]
    fn disable_restores_nop_and_writes_clear_enable() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<64>());
        let irq = rig.interrupts.interrupt(40);
        irq.enable(isr_a).unwrap();

        irq.disable().unwrap();

        let vectors = rig.interrupts.vector_table();
        assert_eq!(vectors[56].get() as usize, nop as usize);
        assert_eq!(rig.nvic.icer[1].get(), 1 << 8);
    }

    #[test]
    fn core_exceptions_never_touch_the_nvic() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<32>());
        let sys_tick = rig.interrupts.interrupt(Irq::SYS_TICK);

        sys_tick.enable(isr_b).unwrap();
        assert_eq!(rig.interrupts.vector_table()[15].get() as usize, isr_b as usize);
        assert!(iser_is_untouched(&rig));

        sys_tick.disable().unwrap();
        assert_eq!(rig.interrupts.vector_table()[15].get() as usize, nop as usize);
        assert!(iser_is_untouched(&rig));
    }

    #[test]
    fn verify_passes_core_exception_on_vector_alone() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<32>());
        let pend_sv = rig.interrupts.interrupt(Irq::PEND_SV);

        pend_sv.enable(isr_a).unwrap();
        assert_eq!(pend_sv.verify_vector_enabled(isr_a), Ok(true));
        assert_eq!(pend_sv.verify_vector_enabled(isr_b), Ok(false));
    }

    #[test]
    fn verify_fails_vendor_irq_while_enable_bit_reads_set() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<32>());
        let irq = rig.interrupts.interrupt(7);

        irq.enable(isr_a).unwrap();
        assert_eq!(irq.verify_vector_enabled(isr_a), Ok(false));

        rig.nvic.iser[0].set(0);
        assert_eq!(irq.verify_vector_enabled(isr_a), Ok(true));
    }

    #[test]
    fn verify_fails_after_handler_is_replaced() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<32>());
        let irq = rig.interrupts.interrupt(7);

        irq.enable(isr_a).unwrap();
        irq.disable().unwrap();
        rig.interrupts.interrupt(7).enable(isr_b).unwrap();

        assert_eq!(irq.verify_vector_enabled(isr_a), Ok(false));
    }

    #[test]
    fn reinitialize_wipes_handlers_and_enables() {
        let rig = rig();
        let table = buffer::<32>();
        rig.interrupts.initialize(table);
        rig.interrupts.interrupt(9).enable(isr_a).unwrap();
        assert_ne!(rig.nvic.iser[0].get(), 0);

        rig.interrupts.reinitialize(table);

        assert_eq!(rig.interrupts.vector_table()[25].get() as usize, nop as usize);
        assert_eq!(rig.nvic.iser[0].get() & (1 << 9), 0);
        assert!(iser_is_untouched(&rig));
        assert_eq!(rig.scb.vtor.get(), table.as_slice().as_ptr() as usize);
    }

    #[test]
    fn reinitialize_can_resize() {
        let rig = rig();
        rig.interrupts.initialize(buffer::<8>());
        assert!(rig.interrupts.interrupt(20).enable(isr_a).is_err());

        let bigger = buffer::<32>();
        rig.interrupts.reinitialize(bigger);
        assert_eq!(rig.interrupts.vector_table().len(), 48);
        assert_eq!(rig.interrupts.interrupt(20).enable(isr_a), Ok(()));
    }

    #[test]
    fn errors_describe_themselves() {
        assert_eq!(Error::VectorTableNotInitialized.to_string(),
                   "interrupt vector table has not been initialized");
        assert_eq!(Error::InvalidIrq { invalid: 40, end: 32 }.to_string(),
                   "IRQ 40 is outside the vector table \
                    (valid IRQs are above -16 and below 32)");
    }
}
