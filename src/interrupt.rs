//! Interrupt numbers and control.

/// Interrupts serviced by the drivers in this crate.
///
/// The values are the STM32F103 vector table positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum Interrupt {
    DMA1_CHANNEL1 = 11,
    DMA1_CHANNEL2 = 12,
    DMA1_CHANNEL3 = 13,
    DMA1_CHANNEL4 = 14,
    DMA1_CHANNEL5 = 15,
    DMA1_CHANNEL6 = 16,
    DMA1_CHANNEL7 = 17,
    ADC1_2 = 18,
    I2C1_EV = 31,
    I2C1_ER = 32,
    I2C2_EV = 33,
    I2C2_ER = 34,
}

impl Interrupt {
    /// The interrupt for DMA1 channel `channel`, 1 through 7.
    pub const fn dma1_channel(channel: u8) -> Option<Self> {
        Some(match channel {
            1 => Interrupt::DMA1_CHANNEL1,
            2 => Interrupt::DMA1_CHANNEL2,
            3 => Interrupt::DMA1_CHANNEL3,
            4 => Interrupt::DMA1_CHANNEL4,
            5 => Interrupt::DMA1_CHANNEL5,
            6 => Interrupt::DMA1_CHANNEL6,
            7 => Interrupt::DMA1_CHANNEL7,
            _ => return None,
        })
    }

    /// If this is a DMA1 channel interrupt, the channel number.
    pub const fn as_dma1_channel(self) -> Option<u8> {
        match self {
            Interrupt::DMA1_CHANNEL1
            | Interrupt::DMA1_CHANNEL2
            | Interrupt::DMA1_CHANNEL3
            | Interrupt::DMA1_CHANNEL4
            | Interrupt::DMA1_CHANNEL5
            | Interrupt::DMA1_CHANNEL6
            | Interrupt::DMA1_CHANNEL7 => {
                Some((self as u16 - Interrupt::DMA1_CHANNEL1 as u16) as u8 + 1)
            }
            _ => None,
        }
    }
}

// Safety: the discriminants are valid vector numbers for this device.
unsafe impl cortex_m::interrupt::InterruptNumber for Interrupt {
    #[inline(always)]
    fn number(self) -> u16 {
        self as u16
    }
}

/// Enables and disables interrupt lines.
///
/// Drivers call this when they're initialized. [`Nvic`] is the
/// implementation for the MCU.
pub trait InterruptControl {
    fn enable_interrupt(&self, interrupt: Interrupt);
    fn disable_interrupt(&self, interrupt: Interrupt);
}

impl<C: InterruptControl + ?Sized> InterruptControl for &C {
    fn enable_interrupt(&self, interrupt: Interrupt) {
        (**self).enable_interrupt(interrupt)
    }
    fn disable_interrupt(&self, interrupt: Interrupt) {
        (**self).disable_interrupt(interrupt)
    }
}

/// Interrupt control through the Cortex-M NVIC.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvic;

impl InterruptControl for Nvic {
    fn enable_interrupt(&self, interrupt: Interrupt) {
        // Safety: the drivers install handlers for every interrupt they
        // enable, and unmasking doesn't break any critical section of theirs.
        unsafe { cortex_m::peripheral::NVIC::unmask(interrupt) }
    }
    fn disable_interrupt(&self, interrupt: Interrupt) {
        cortex_m::peripheral::NVIC::mask(interrupt)
    }
}
