//! Support for memory-mapped registers of various sizes.

use core::cell::UnsafeCell;
use core::ptr;

/// A register whose contents can be represented as `T`.  The contents are
/// accessed using `volatile` operations only, ensuring that apparently dead
/// loads and stores are not optimized away.
///
/// Memory-mapped registers are the ultimate ambient authority, and are
/// inherently shared.  Thus, registers (like cells) can be mutated through a
/// shared reference `&`, and a unique reference `&mut` to a register is not
/// particularly meaningful.  Transitively, the same applies to structs that
/// group registers together, as in a memory-mapped peripheral.
///
/// `Reg` is `repr(transparent)`, so a struct of `Reg`s has exactly the layout
/// of the same struct of plain integers.  This is what lets a block of
/// registers be modelled in ordinary RAM when there is no hardware behind it.
#[repr(transparent)]
pub struct Reg<T> {
    value: UnsafeCell<T>,
}

impl<T: Copy> Reg<T> {
    /// Creates a register cell holding `value`.  Only meaningful for cells
    /// that live in RAM (vector tables, register stand-ins); real registers
    /// are never constructed, only referenced.
    pub const fn new(value: T) -> Self {
        Reg { value: UnsafeCell::new(value) }
    }

    /// Reads the contents of the register using a volatile load.
    #[inline]
    pub fn get(&self) -> T {
        unsafe { ptr::read_volatile(self.value.get()) }
    }

    /// Replaces the contents of the register using a volatile store.
    #[inline]
    pub fn set(&self, value: T) {
        unsafe { ptr::write_volatile(self.value.get(), value) }
    }

    /// Read-modify-write.  This is *not* atomic with respect to interrupts.
    #[inline]
    pub fn update<F: FnOnce(T) -> T>(&self, f: F) {
        self.set(f(self.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let r = Reg::new(0u32);
        r.set(0xdead_beef);
        assert_eq!(r.get(), 0xdead_beef);
    }

    #[test]
    fn update_applies_function() {
        let r = Reg::new(0b0101u8);
        r.update(|v| v | 0b1000);
        assert_eq!(r.get(), 0b1101);
    }

    #[test]
    fn layout_is_transparent() {
        assert_eq!(core::mem::size_of::<[Reg<u32>; 8]>(), 32);
        assert_eq!(core::mem::align_of::<Reg<u32>>(), 4);
        assert_eq!(core::mem::size_of::<Reg<u8>>(), 1);
    }
}
