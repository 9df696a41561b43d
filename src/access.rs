//! Register access.
//!
//! Drivers name registers with a small, per-peripheral `Register` enum and
//! perform every load and store through [`Access`]. On the MCU, `Access` is
//! implemented for [`Static`](crate::ral::Static) register blocks. Anything
//! else that implements it, like a simulated peripheral, can stand in for
//! the hardware.

/// Read and write a peripheral's registers.
///
/// Implementations must perform each call as exactly one access, in call
/// order. Some status flags are cleared by the read sequence itself, so
/// caching or reordering accesses changes the hardware's behavior.
pub trait Access<R: Copy> {
    /// Load the 32-bit register.
    fn read(&self, register: R) -> u32;

    /// Store `value` into the register.
    fn write(&self, register: R, value: u32);

    /// Store a memory address into the register.
    ///
    /// The hardware only sees 32-bit addresses, and that's what the default
    /// implementation writes.
    fn write_address(&self, register: R, address: usize) {
        self.write(register, address as u32);
    }

    /// Read-modify-write the register.
    fn modify<F: FnOnce(u32) -> u32>(&self, register: R, f: F) {
        let value = self.read(register);
        self.write(register, f(value));
    }

    /// Set `bits` with a read-modify-write.
    fn set_bits(&self, register: R, bits: u32) {
        self.modify(register, |value| value | bits);
    }

    /// Clear `bits` with a read-modify-write.
    fn clear_bits(&self, register: R, bits: u32) {
        self.modify(register, |value| value & !bits);
    }

    /// Returns `true` if any of `bits` are set.
    fn test(&self, register: R, bits: u32) -> bool {
        self.read(register) & bits != 0
    }
}

impl<R: Copy, A: Access<R> + ?Sized> Access<R> for &A {
    fn read(&self, register: R) -> u32 {
        (**self).read(register)
    }
    fn write(&self, register: R, value: u32) {
        (**self).write(register, value)
    }
    fn write_address(&self, register: R, address: usize) {
        (**self).write_address(register, address)
    }
}
