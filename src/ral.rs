//! A RAL-like module for the peripherals driven by this crate.
//!
//! Each submodule describes one peripheral's register block as a `#[repr(C)]`
//! struct, along with the bit positions the drivers use. The layouts are
//! checked at compile time against the reference manual offsets.
//!
//! The drivers never touch these blocks directly. They go through
//! [`Access`](crate::Access), which is implemented for [`Static`] pointers to
//! these blocks using the RAL macros re-exported here.

#![allow(
    non_snake_case, // Compatibility with RAL
)]

pub mod adc;
pub mod dma;
pub mod i2c;

pub use ral_registers::{modify_reg, read_reg, write_reg};
use ral_registers::{RORegister, RWRegister, WORegister};

/// I2C1 register block address.
pub const I2C1: usize = 0x4000_5400;
/// I2C2 register block address.
pub const I2C2: usize = 0x4000_5800;
/// ADC1 register block address.
pub const ADC1: usize = 0x4001_2400;
/// DMA1 register block address.
pub const DMA1: usize = 0x4002_0000;

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

/// A pointer to a register block in peripheral memory.
pub struct Static<T>(*const T);

impl<T> Static<T> {
    /// Point at the register block found at `address`.
    ///
    /// # Safety
    ///
    /// `address` must be the start of a `T` register block for this MCU.
    /// Every `Static` aliases the same hardware, so the caller is responsible
    /// for coordinating access between copies.
    pub const unsafe fn new(address: usize) -> Self {
        Self(address as *const T)
    }

    /// The address of the register block.
    pub fn address(&self) -> usize {
        self.0 as usize
    }
}

impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

// Safety: the pointee is memory-mapped hardware, not owned data. Accesses are
// single volatile loads and stores.
unsafe impl<T> Send for Static<T> {}
unsafe impl<T> Sync for Static<T> {}
