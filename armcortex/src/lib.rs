//! Runtime management of the interrupt vector table and NVIC on ARM Cortex-M
//! processors.
//!
//! The flash vector table is fixed at link time.  This crate moves it into a
//! RAM buffer at startup so drivers can install their own handlers later:
//! see `arm_m::interrupt`.
//!
//! Hardware drivers (`NVIC`, `SCB`, `SYS_TICK`, `DWT`, `INTERRUPTS`) only exist
//! when building for bare metal.  Everywhere else each driver can be pointed at
//! a register block in ordinary memory, which is how the tests run.

#![no_std]

#![deny(
    unused_import_braces,
    unused_extern_crates,
    )]

#[cfg(test)]
extern crate std;

pub mod arm_m;
mod lang;

pub use arm_m::interrupt::{Error, Interrupt, Interrupts, Result};
pub use arm_m::irq::Irq;
