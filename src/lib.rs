//! Interrupt and DMA driven peripheral drivers for STM32F103 processors.
//!
//! `stm32f103-periph` provides
//!
//! - an ADC driver, with interrupt-driven single conversions and a
//!   continuous, DMA-fed, four channel scan that averages blocks of samples.
//! - an I2C master driver, with polled and DMA data phases, bus error
//!   recovery, and a per-controller lock that keeps transactions whole.
//! - the DMA channel, spinlock, and bounded wait primitives those drivers
//!   are built on.
//!
//! Pin and clock configuration are your responsibility. Configure them
//! before initializing the drivers.
//!
//! # Getting started
//!
//! [`Peripherals`] holds one driver per peripheral. Take it once, attach
//! DMA channels, then initialize it. Route every interrupt it services to
//! [`Registry::on_interrupt`].
//!
//! ```no_run
//! use stm32f103_periph::{adc::Accumulator, i2c, interrupt::Nvic, Peripherals};
//!
//! static ACCUMULATOR: Accumulator = Accumulator::new();
//!
//! let mut periph = Peripherals::take(i2c::Config::default(), i2c::Config::default()).unwrap();
//! periph.attach(&ACCUMULATOR);
//! periph.init(&Nvic);
//!
//! // Write a command to the device at 0x76.
//! if !periph.i2c1.write(0x76, &[0x06, 0x20]) {
//!     // Inspect periph.i2c1.result_code()
//! }
//! ```
//!
//! # Register access
//!
//! The drivers reach their registers through the [`Access`] trait. On the
//! MCU, that's a [`Static`](ral::Static) pointer to the register block. For
//! testing, any other `Access` implementation can model the hardware.
//!
//! # Interrupts
//!
//! Spinlocks serialize callers in thread context. They don't protect
//! against an interrupt handler that preempts a lock holder and then takes
//! the same lock. The ADC end-of-conversion handler takes the ADC mailbox
//! lock, so it must not be able to preempt [`Adc::data`](adc::Adc::data).
//! Choose interrupt priorities accordingly.
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(test), no_std)]

// This must go first, so the logging macros are visible to the other modules.
mod fmt;

mod access;
pub mod adc;
pub mod channel;
mod element;
mod error;
pub mod i2c;
pub mod interrupt;
pub mod ral;
mod spinlock;
mod wait;

pub use access::Access;
pub use element::Element;
pub use error::Error;
pub use interrupt::Interrupt;
pub use spinlock::{Spinlock, SpinlockGuard};
pub use wait::BoundedWait;

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use adc::{Accumulator, Adc};
use channel::Channel;
use i2c::I2c;
use interrupt::InterruptControl;
use ral::Static;

/// A DMA result
pub type Result<T> = core::result::Result<T, Error>;

/// The DMA1 controller.
///
/// `Dma` binds [`Channel`]s to peripheral requests. Each channel can be
/// bound once.
pub struct Dma<D> {
    registers: D,
    /// One bit per bound channel.
    taken: AtomicU8,
}

impl<D> Dma<D> {
    /// Create the DMA driver.
    ///
    /// Note that this can evaluate at compile time.
    pub const fn new(registers: D) -> Self {
        Self {
            registers,
            taken: AtomicU8::new(0),
        }
    }

    /// The controller's register access.
    pub fn registers(&self) -> &D {
        &self.registers
    }
}

/// One driver per peripheral.
///
/// `I` accesses both I2C controllers, `A` the ADC, and `D` the DMA
/// controller.
pub struct Registry<'cb, I, A, D: Access<channel::Register>> {
    pub dma1: Dma<D>,
    pub i2c1: I2c<'cb, I, D>,
    pub i2c2: I2c<'cb, I, D>,
    pub adc1: Adc<'cb, A, D>,
}

impl<'cb, I, A, D: Access<channel::Register>> Registry<'cb, I, A, D> {
    pub const fn new(
        dma1: Dma<D>,
        i2c1: I2c<'cb, I, D>,
        i2c2: I2c<'cb, I, D>,
        adc1: Adc<'cb, A, D>,
    ) -> Self {
        Self {
            dma1,
            i2c1,
            i2c2,
            adc1,
        }
    }

    /// The attached DMA channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel<'cb, D>> {
        [
            self.adc1.channel(),
            self.i2c1.tx_channel(),
            self.i2c1.rx_channel(),
            self.i2c2.tx_channel(),
            self.i2c2.rx_channel(),
        ]
        .into_iter()
        .flatten()
    }
}

impl<'cb, I, A, D> Registry<'cb, I, A, D>
where
    I: Access<i2c::Register>,
    A: Access<adc::Register>,
    D: Access<channel::Register> + Clone,
{
    /// Attach DMA channels to both I2C controllers, and start the ADC's
    /// DMA scan into `accumulator`.
    ///
    /// Returns `false` if any channel couldn't be bound.
    pub fn attach(&mut self, accumulator: &'cb Accumulator) -> bool {
        let i2c1 = self.i2c1.attach(&self.dma1, i2c::Direction::Both);
        let i2c2 = self.i2c2.attach(&self.dma1, i2c::Direction::Both);
        let adc1 = self.adc1.attach(&self.dma1, accumulator);
        i2c1 && i2c2 && adc1
    }

    /// Initialize every driver, and enable the interrupts they service.
    ///
    /// Attach DMA channels first. Only attached channels have their
    /// interrupts enabled.
    pub fn init<C: InterruptControl>(&self, interrupts: &C) {
        self.i2c1.init(interrupts);
        self.i2c2.init(interrupts);
        self.adc1.init(interrupts);
        for channel in self.channels() {
            interrupts.enable_interrupt(channel.interrupt());
        }
    }

    /// Service `interrupt`.
    ///
    /// Call this from each interrupt handler enabled by
    /// [`init`](Self::init).
    pub fn on_interrupt(&self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::ADC1_2 => self.adc1.on_interrupt(),
            Interrupt::I2C1_EV => {
                self.i2c1.on_event_interrupt();
            }
            Interrupt::I2C1_ER => self.i2c1.on_error_interrupt(),
            Interrupt::I2C2_EV => {
                self.i2c2.on_event_interrupt();
            }
            Interrupt::I2C2_ER => self.i2c2.on_error_interrupt(),
            dma => {
                let number = dma.as_dma1_channel();
                if let Some(channel) = self.channels().find(|ch| Some(ch.number()) == number) {
                    channel.on_interrupt();
                }
            }
        }
    }
}

/// The drivers for this MCU's peripherals.
pub type Peripherals<'cb> = Registry<
    'cb,
    Static<ral::i2c::RegisterBlock>,
    Static<ral::adc::RegisterBlock>,
    Static<ral::dma::RegisterBlock>,
>;

static TAKEN: AtomicBool = AtomicBool::new(false);

impl Peripherals<'_> {
    /// Take the peripherals.
    ///
    /// Returns `None` after the first call.
    pub fn take(i2c1: i2c::Config, i2c2: i2c::Config) -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            None
        } else {
            // Safety: first and only call.
            Some(unsafe { Self::steal(i2c1, i2c2) })
        }
    }

    /// Create the peripherals, regardless of any earlier call.
    ///
    /// # Safety
    ///
    /// Every instance drives the same hardware. Make sure there's only one,
    /// or that they're otherwise synchronized.
    pub const unsafe fn steal(i2c1: i2c::Config, i2c2: i2c::Config) -> Self {
        Registry::new(
            Dma::new(Static::new(ral::DMA1)),
            I2c::new(i2c::Instance::I2c1, Static::new(ral::I2C1), i2c1),
            I2c::new(i2c::Instance::I2c2, Static::new(ral::I2C2), i2c2),
            Adc::new(Static::new(ral::ADC1)),
        )
    }
}
