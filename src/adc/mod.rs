//! ADC1 driver.
//!
//! The ADC runs in one of two ways.
//!
//! - Single-shot. [`Adc::start_conversion`] converts channel 0, and the
//!   end-of-conversion interrupt latches the result into a [`Mailbox`].
//!   [`Adc::data`] waits for it.
//! - Continuous scan. [`Adc::attach`] configures a four channel scan that
//!   DMA1 channel 1 copies into an [`Accumulator`], which averages the scans
//!   in blocks.

mod accumulator;
mod mailbox;

pub use accumulator::{Accumulator, BLOCK, SCAN_CHANNELS};
pub use mailbox::Mailbox;

use crate::channel::{self, Channel, Request, Status};
use crate::interrupt::{Interrupt, InterruptControl};
use crate::ral::{self, adc::CR1, adc::CR2, adc::SMPR, adc::SQR, Static};
use crate::{Access, BoundedWait, Dma};

/// Registers of the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Sr,
    Cr1,
    Cr2,
    Smpr1,
    Smpr2,
    Sqr1,
    Sqr2,
    Sqr3,
    Dr,
}

impl Access<Register> for Static<ral::adc::RegisterBlock> {
    fn read(&self, register: Register) -> u32 {
        let adc = self;
        match register {
            Register::Sr => ral::read_reg!(ral::adc, adc, SR),
            Register::Cr1 => ral::read_reg!(ral::adc, adc, CR1),
            Register::Cr2 => ral::read_reg!(ral::adc, adc, CR2),
            Register::Smpr1 => ral::read_reg!(ral::adc, adc, SMPR1),
            Register::Smpr2 => ral::read_reg!(ral::adc, adc, SMPR2),
            Register::Sqr1 => ral::read_reg!(ral::adc, adc, SQR1),
            Register::Sqr2 => ral::read_reg!(ral::adc, adc, SQR2),
            Register::Sqr3 => ral::read_reg!(ral::adc, adc, SQR3),
            Register::Dr => ral::read_reg!(ral::adc, adc, DR),
        }
    }

    fn write(&self, register: Register, value: u32) {
        let adc = self;
        match register {
            Register::Sr => ral::write_reg!(ral::adc, adc, SR, value),
            Register::Cr1 => ral::write_reg!(ral::adc, adc, CR1, value),
            Register::Cr2 => ral::write_reg!(ral::adc, adc, CR2, value),
            Register::Smpr1 => ral::write_reg!(ral::adc, adc, SMPR1, value),
            Register::Smpr2 => ral::write_reg!(ral::adc, adc, SMPR2, value),
            Register::Sqr1 => ral::write_reg!(ral::adc, adc, SQR1, value),
            Register::Sqr2 => ral::write_reg!(ral::adc, adc, SQR2, value),
            Register::Sqr3 => ral::write_reg!(ral::adc, adc, SQR3, value),
            Register::Dr => ral::write_reg!(ral::adc, adc, DR, value),
        }
    }
}

/// Polls allowed for each calibration step.
const CALIBRATION: BoundedWait = BoundedWait::new(1000);

/// The ADC1 driver.
pub struct Adc<'cb, R, D: Access<channel::Register>> {
    registers: R,
    mailbox: Mailbox,
    channel: Option<Channel<'cb, D>>,
}

impl<'cb, R, D: Access<channel::Register>> Adc<'cb, R, D> {
    /// Create the driver. Call [`init`](Self::init) before using it.
    pub const fn new(registers: R) -> Self {
        Self {
            registers,
            mailbox: Mailbox::new(),
            channel: None,
        }
    }

    /// The single-shot result slot.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// The scan's DMA channel, if attached.
    pub fn channel(&self) -> Option<&Channel<'cb, D>> {
        self.channel.as_ref()
    }
}

impl<'cb, R, D> Adc<'cb, R, D>
where
    R: Access<Register>,
    D: Access<channel::Register> + Clone,
{
    /// Prepare single conversions of channel 0, then power on and
    /// calibrate.
    ///
    /// Once [attached](Self::attach), the scan sequence stays as `attach`
    /// programmed it, so `init` may run before or after `attach`.
    pub fn init<C: InterruptControl>(&self, interrupts: &C) {
        self.registers.set_bits(Register::Cr1, CR1::EOCIE);
        if self.channel.is_none() {
            self.registers.write(Register::Sqr1, 0);
            self.registers.write(Register::Sqr2, 0);
            self.registers.write(Register::Sqr3, 0);
        }
        self.registers
            .set_bits(Register::Cr2, CR2::EXTSEL_SWSTART | CR2::EXTTRIG);
        interrupts.enable_interrupt(Interrupt::ADC1_2);
        self.registers.set_bits(Register::Cr2, CR2::ADON);
        self.calibrate();
    }

    /// Reset and run the calibration.
    ///
    /// Each step is polled a bounded number of times. Returns `false` if a
    /// step didn't finish. The converter is still usable, just uncalibrated.
    pub fn calibrate(&self) -> bool {
        self.registers.set_bits(Register::Cr2, CR2::RSTCAL);
        let reset = CALIBRATION.until(|| !self.registers.test(Register::Cr2, CR2::RSTCAL));
        self.registers.set_bits(Register::Cr2, CR2::CAL);
        let calibrated = CALIBRATION.until(|| !self.registers.test(Register::Cr2, CR2::CAL));
        if !(reset && calibrated) {
            debug!("ADC calibration incomplete, CR2 {}", self.cr2());
        }
        reset && calibrated
    }

    /// Scan channels 0 through 3 continuously, accumulating each scan into
    /// `accumulator` by DMA.
    ///
    /// The scan runs once a conversion is [started](Self::start_conversion).
    /// Returns `false` if the DMA channel can't be bound.
    pub fn attach(&mut self, dma: &Dma<D>, accumulator: &'cb Accumulator) -> bool {
        let Some(mut channel) = dma.bind(Request::ADC1) else {
            warn!("ADC DMA channel unavailable");
            return false;
        };
        channel.set_callback(Some(accumulator));
        // Safety: the accumulator outlives the channel, which borrows it
        // for 'cb.
        let configured = unsafe { channel.set_receive_buffer(accumulator.buffer(), SCAN_CHANNELS) }
            .and_then(|()| channel.set_circular(true));
        if configured.is_err() {
            return false;
        }

        self.registers.set_bits(Register::Cr1, CR1::SCAN);
        self.registers
            .set_bits(Register::Cr2, CR2::EXTSEL_SWSTART | CR2::CONT | CR2::DMA);
        let smpr = (0..SCAN_CHANNELS as u32)
            .fold(0, |smpr, ch| smpr | (SMPR::SMP_239_5 << (SMPR::SMP_WIDTH * ch)));
        self.registers.set_bits(Register::Smpr2, smpr);
        self.registers
            .write(Register::Sqr1, (SCAN_CHANNELS as u32 - 1) << SQR::L_OFFSET);
        self.registers.write(Register::Sqr2, 0);
        let sequence = (0..SCAN_CHANNELS as u32)
            .fold(0, |sqr, ch| sqr | (ch << (SQR::SQ_WIDTH * ch)));
        self.registers.write(Register::Sqr3, sequence);

        // Safety: same as above.
        unsafe { channel.enable() };
        self.channel = Some(channel);
        true
    }

    /// Resume or pause the DMA stream.
    pub fn enable(&self, enable: bool) {
        if let Some(channel) = &self.channel {
            if enable {
                // Safety: the channel still points at the accumulator passed
                // to attach, which outlives it.
                unsafe { channel.enable() };
            } else {
                channel.disable();
            }
        }
    }

    /// Start a conversion with the software trigger.
    pub fn start_conversion(&self) {
        self.registers.set_bits(Register::Cr2, CR2::SWSTART);
    }

    /// Wait for the next single-shot result.
    ///
    /// This waits without bound. Make sure a conversion was started.
    pub fn data(&self) -> u16 {
        self.mailbox.take()
    }

    /// Take a single-shot result if one is ready.
    pub fn try_data(&self) -> Option<u16> {
        self.mailbox.try_take()
    }

    /// The current CR2 value.
    pub fn cr2(&self) -> u32 {
        self.registers.read(Register::Cr2)
    }

    /// Handle the end-of-conversion interrupt.
    ///
    /// Reading DR clears the end-of-conversion flag.
    pub fn on_interrupt(&self) {
        let value = self.registers.read(Register::Dr) as u16;
        self.mailbox.post(value);
    }

    /// Handle the DMA channel interrupt.
    pub fn on_dma_interrupt(&self) -> Status {
        self.channel
            .as_ref()
            .map_or(Status::default(), Channel::on_interrupt)
    }
}
