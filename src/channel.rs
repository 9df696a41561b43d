//! DMA1 channels.
//!
//! A [`Channel`] binds one DMA1 channel to a peripheral's data register. Use
//! [`Dma::bind`](crate::Dma::bind) to create channels, then describe a
//! memory buffer, and enable the channel to start the transfer. The
//! peripheral request line paces the transfer from there.
//!
//! When the transfer completes (or fails), the channel interrupt fires. Call
//! [`Channel::on_interrupt`] from that handler. It acknowledges the status
//! flags, marks the channel complete, and invokes the channel's
//! [`Callback`].

use core::sync::atomic::{AtomicBool, Ordering};

use crate::ral::{self, dma::CCR, dma::ISR, Static};
use crate::{Access, Element, Error, Interrupt};

/// Registers of the DMA controller.
///
/// Channel registers take a channel number, 1 through 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Isr,
    Ifcr,
    Ccr(u8),
    Cndtr(u8),
    Cpar(u8),
    Cmar(u8),
}

impl Access<Register> for Static<ral::dma::RegisterBlock> {
    fn read(&self, register: Register) -> u32 {
        let dma = self;
        match register {
            Register::Isr => ral::read_reg!(ral::dma, dma, ISR),
            // Write only.
            Register::Ifcr => 0,
            Register::Ccr(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::read_reg!(ral::dma, ch, CCR)
            }
            Register::Cndtr(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::read_reg!(ral::dma, ch, CNDTR)
            }
            Register::Cpar(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::read_reg!(ral::dma, ch, CPAR)
            }
            Register::Cmar(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::read_reg!(ral::dma, ch, CMAR)
            }
        }
    }

    fn write(&self, register: Register, value: u32) {
        let dma = self;
        match register {
            // Read only.
            Register::Isr => {}
            Register::Ifcr => ral::write_reg!(ral::dma, dma, IFCR, value),
            Register::Ccr(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::write_reg!(ral::dma, ch, CCR, value)
            }
            Register::Cndtr(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::write_reg!(ral::dma, ch, CNDTR, value)
            }
            Register::Cpar(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::write_reg!(ral::dma, ch, CPAR, value)
            }
            Register::Cmar(ch) => {
                let ch = &dma.CH[usize::from(ch) - 1];
                ral::write_reg!(ral::dma, ch, CMAR, value)
            }
        }
    }
}

/// A peripheral request line and the peripheral register it serves.
///
/// On DMA1, each request line is hard-wired to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request {
    /// DMA1 channel number, 1 through 7.
    pub channel: u8,
    /// Address of the peripheral data register.
    pub peripheral: usize,
}

impl Request {
    pub const ADC1: Self = Self::new(1, ral::ADC1 + ral::adc::DR_OFFSET);
    pub const I2C2_TX: Self = Self::new(4, ral::I2C2 + ral::i2c::DR_OFFSET);
    pub const I2C2_RX: Self = Self::new(5, ral::I2C2 + ral::i2c::DR_OFFSET);
    pub const I2C1_TX: Self = Self::new(6, ral::I2C1 + ral::i2c::DR_OFFSET);
    pub const I2C1_RX: Self = Self::new(7, ral::I2C1 + ral::i2c::DR_OFFSET);

    pub const fn new(channel: u8, peripheral: usize) -> Self {
        Self {
            channel,
            peripheral,
        }
    }
}

impl<D: Access<Register> + Clone> crate::Dma<D> {
    /// Bind the channel serving `request`.
    ///
    /// Binding disables the channel, points it at the request's peripheral
    /// register, and enables its transfer-complete and transfer-error
    /// interrupts. The memory side is configured later.
    ///
    /// Returns `None` if the channel number is out of range, or if the
    /// channel was already bound. Each channel can be bound once. Binding is
    /// permanent: dropping the [`Channel`] disables it, but doesn't return it
    /// to this `Dma`.
    pub fn bind<'cb>(&self, request: Request) -> Option<Channel<'cb, D>> {
        let interrupt = Interrupt::dma1_channel(request.channel)?;
        let mask = 1 << (request.channel - 1);
        if self.taken.fetch_or(mask, Ordering::AcqRel) & mask != 0 {
            return None;
        }
        let channel = Channel {
            number: request.channel,
            interrupt,
            registers: self.registers.clone(),
            peripheral: request.peripheral,
            complete: AtomicBool::new(false),
            callback: None,
        };
        channel.configure();
        Some(channel)
    }
}

/// Raw channel status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & ISR::ALL as u8)
    }
    pub const fn bits(self) -> u8 {
        self.0
    }
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
    /// The full transfer finished.
    pub const fn is_complete(self) -> bool {
        self.0 & ISR::TCIF as u8 != 0
    }
    /// Half the transfer finished.
    pub const fn is_half_complete(self) -> bool {
        self.0 & ISR::HTIF as u8 != 0
    }
    /// The controller hit a bus error. It disables the channel when that
    /// happens.
    pub const fn is_error(self) -> bool {
        self.0 & ISR::TEIF as u8 != 0
    }
}

/// Invoked from the channel interrupt.
///
/// Callbacks run in interrupt context. They must not take a lock that the
/// interrupted code might hold.
pub trait Callback: Sync {
    fn call(&self, status: Status);
}

impl<F: Fn(Status) + Sync> Callback for F {
    fn call(&self, status: Status) {
        (self)(status)
    }
}

/// A DMA channel.
///
/// The channel stores memory addresses independent of the memory lifetime.
/// The unsafe configuration methods leave it to you to keep the buffer
/// alive while the transfer is enabled. The safe [`transmit`](Self::transmit)
/// and [`receive`](Self::receive) methods tie the buffer to the returned
/// guard instead.
///
/// Dropping the channel disables it. The channel stays bound, so it can't be
/// bound again.
pub struct Channel<'cb, D: Access<Register>> {
    /// Channel number, 1 through 7.
    number: u8,
    interrupt: Interrupt,
    registers: D,
    /// Address of the peripheral data register.
    peripheral: usize,
    /// Set from the interrupt, cleared when enabled.
    complete: AtomicBool,
    callback: Option<&'cb dyn Callback>,
}

impl<'cb, D: Access<Register>> Channel<'cb, D> {
    fn configure(&self) {
        self.registers.write(Register::Ccr(self.number), 0);
        self.registers
            .write_address(Register::Cpar(self.number), self.peripheral);
        self.registers
            .write(Register::Ccr(self.number), CCR::TCIE | CCR::TEIE);
        self.clear_status();
    }

    fn shift(&self) -> u32 {
        4 * u32::from(self.number - 1)
    }

    fn clear_status(&self) {
        self.registers.write(Register::Ifcr, ISR::ALL << self.shift());
    }

    fn ccr(&self) -> u32 {
        self.registers.read(Register::Ccr(self.number))
    }

    /// The DMA1 channel number.
    pub fn number(&self) -> u8 {
        self.number
    }

    /// The interrupt serviced by [`on_interrupt`](Self::on_interrupt).
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt
    }

    /// The peripheral register this channel serves.
    pub fn peripheral_address(&self) -> usize {
        self.peripheral
    }

    /// Set (or clear) the callback invoked on transfer interrupts.
    pub fn set_callback(&mut self, callback: Option<&'cb dyn Callback>) {
        self.callback = callback;
    }

    fn set_buffer<E: Element>(
        &self,
        address: usize,
        len: usize,
        direction: u32,
    ) -> crate::Result<()> {
        if self.is_enabled() {
            return Err(Error::Armed);
        }
        let count = u16::try_from(len).map_err(|_| Error::TooLong)?;
        self.registers
            .write_address(Register::Cmar(self.number), address);
        self.registers
            .write(Register::Cndtr(self.number), u32::from(count));
        self.registers.modify(Register::Ccr(self.number), |ccr| {
            let sizes =
                (CCR::SIZE_MASK << CCR::PSIZE_OFFSET) | (CCR::SIZE_MASK << CCR::MSIZE_OFFSET);
            (ccr & !(CCR::DIR | CCR::PINC | sizes))
                | direction
                | CCR::MINC
                | (E::SIZE << CCR::PSIZE_OFFSET)
                | (E::SIZE << CCR::MSIZE_OFFSET)
        });
        Ok(())
    }

    /// Move `len` elements starting at `source` into the peripheral.
    ///
    /// # Safety
    ///
    /// `source` must be valid for `len` reads for as long as the transfer
    /// is enabled.
    pub unsafe fn set_transmit_buffer<E: Element>(
        &self,
        source: *const E,
        len: usize,
    ) -> crate::Result<()> {
        self.set_buffer::<E>(source as usize, len, CCR::DIR)
    }

    /// Move `len` elements from the peripheral into memory starting at
    /// `destination`.
    ///
    /// # Safety
    ///
    /// `destination` must be valid for `len` writes for as long as the
    /// transfer is enabled. Nothing else may access that memory until the
    /// transfer is disabled.
    pub unsafe fn set_receive_buffer<E: Element>(
        &self,
        destination: *mut E,
        len: usize,
    ) -> crate::Result<()> {
        self.set_buffer::<E>(destination as usize, len, 0)
    }

    /// Restart the transfer from the top of the buffer once it completes.
    pub fn set_circular(&self, circular: bool) -> crate::Result<()> {
        if self.is_enabled() {
            return Err(Error::Armed);
        }
        if circular {
            self.registers.set_bits(Register::Ccr(self.number), CCR::CIRC);
        } else {
            self.registers
                .clear_bits(Register::Ccr(self.number), CCR::CIRC);
        }
        Ok(())
    }

    /// Enable the channel, starting the transfer.
    ///
    /// # Safety
    ///
    /// The buffer described by the most recent `set_*_buffer` call must
    /// still be valid, and must stay valid until the channel is disabled.
    pub unsafe fn enable(&self) {
        self.complete.store(false, Ordering::Release);
        self.clear_status();
        self.registers.set_bits(Register::Ccr(self.number), CCR::EN);
    }

    /// Enable the channel, and disable it when the guard drops.
    ///
    /// # Safety
    ///
    /// See [`enable`](Self::enable). The buffer must outlive the guard.
    pub unsafe fn scoped_enable(&self) -> ScopedEnable<'_, 'cb, D> {
        self.enable();
        ScopedEnable { channel: self }
    }

    /// Disable the channel, stopping any transfer.
    pub fn disable(&self) {
        self.registers
            .clear_bits(Register::Ccr(self.number), CCR::EN);
    }

    /// Returns `true` if the channel is enabled.
    pub fn is_enabled(&self) -> bool {
        self.ccr() & CCR::EN != 0
    }

    /// Transmit `buffer` to the peripheral.
    ///
    /// The transfer runs until the guard drops. Don't leak the guard with
    /// [`core::mem::forget`]: the channel would stay armed after `buffer` is
    /// gone. The transfer's end relies on the guard's destructor running.
    pub fn transmit<'a, E: Element>(
        &'a self,
        buffer: &'a [E],
    ) -> crate::Result<ScopedEnable<'a, 'cb, D>> {
        // Safety: the guard borrows the buffer, and disables the transfer
        // before that borrow ends.
        unsafe {
            self.set_transmit_buffer(buffer.as_ptr(), buffer.len())?;
            Ok(self.scoped_enable())
        }
    }

    /// Receive into `buffer` from the peripheral.
    ///
    /// The transfer runs until the guard drops. As with
    /// [`transmit`](Self::transmit), leaking the guard leaves the channel
    /// writing into memory that `buffer` no longer owns.
    pub fn receive<'a, E: Element>(
        &'a self,
        buffer: &'a mut [E],
    ) -> crate::Result<ScopedEnable<'a, 'cb, D>> {
        // Safety: the guard borrows the buffer, and disables the transfer
        // before that borrow ends.
        unsafe {
            self.set_receive_buffer(buffer.as_mut_ptr(), buffer.len())?;
            Ok(self.scoped_enable())
        }
    }

    /// Returns `true` once the transfer has completed.
    ///
    /// This observes both the interrupt handler's acknowledgement and a
    /// still-pending hardware flag.
    pub fn transfer_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire) || self.status().is_complete()
    }

    /// The channel's pending status flags.
    pub fn status(&self) -> Status {
        let isr = self.registers.read(Register::Isr);
        Status::from_bits((isr >> self.shift()) as u8)
    }

    /// Elements left in the transfer.
    pub fn remaining(&self) -> u16 {
        (self.registers.read(Register::Cndtr(self.number)) & ral::dma::CNDTR::NDT) as u16
    }

    /// Service the channel interrupt.
    ///
    /// Acknowledges the pending flags, records completion, and invokes the
    /// callback with the flags. Returns the flags that were pending.
    pub fn on_interrupt(&self) -> Status {
        let status = self.status();
        if status.is_empty() {
            return status;
        }
        self.clear_status();
        if status.is_complete() {
            self.complete.store(true, Ordering::Release);
        }
        if status.is_error() {
            warn!("DMA1 channel {} transfer error", self.number);
        }
        if let Some(callback) = self.callback {
            callback.call(status);
        }
        status
    }
}

impl<D: Access<Register>> Drop for Channel<'_, D> {
    fn drop(&mut self) {
        self.disable();
    }
}

/// Disables its channel when dropped.
pub struct ScopedEnable<'a, 'cb, D: Access<Register>> {
    channel: &'a Channel<'cb, D>,
}

impl<'cb, D: Access<Register>> ScopedEnable<'_, 'cb, D> {
    /// The enabled channel.
    pub fn channel(&self) -> &Channel<'cb, D> {
        self.channel
    }
}

impl<D: Access<Register>> Drop for ScopedEnable<'_, '_, D> {
    fn drop(&mut self) {
        self.channel.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn status_flags() {
        let status = Status::from_bits(0b1011);
        assert!(status.is_complete());
        assert!(status.is_error());
        assert!(!status.is_half_complete());
        assert_eq!(Status::from_bits(0xf4).bits(), 0x4);
        assert!(Status::default().is_empty());
    }
}
