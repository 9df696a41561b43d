//! I2C master driver.
//!
//! [`I2c`] runs master transactions on one I2C controller, either by polling
//! the data phase or by handing it to a DMA channel. Each entry point
//!
//! 1. takes the controller's lock for the whole transaction,
//! 2. recovers the bus from leftover error conditions, resetting the
//!    controller if that's the only way out,
//! 3. runs start, address, and data phases, each bounded by the configured
//!    [`BoundedWait`],
//! 4. stops the bus and cleans up, no matter how the transaction went.
//!
//! Entry points return `true` on success. [`I2c::result_code`] explains the
//! outcome of the most recent transaction.

mod result;
mod status;
mod transaction;

pub use result::{Mode, ResultCode};
pub use status::Status;

use crate::channel::{self, Channel, Request};
use crate::interrupt::{Interrupt, InterruptControl};
use crate::ral::{self, i2c::CR1, i2c::CR2, i2c::SR1, i2c::SR2, Static};
use crate::{Access, BoundedWait, Dma, Spinlock};

use embedded_hal::delay::DelayNs;

use transaction::Engine;

/// Registers of an I2C controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Cr1,
    Cr2,
    Oar1,
    Oar2,
    Dr,
    Sr1,
    Sr2,
    Ccr,
    Trise,
}

impl Access<Register> for Static<ral::i2c::RegisterBlock> {
    fn read(&self, register: Register) -> u32 {
        let i2c = self;
        match register {
            Register::Cr1 => ral::read_reg!(ral::i2c, i2c, CR1),
            Register::Cr2 => ral::read_reg!(ral::i2c, i2c, CR2),
            Register::Oar1 => ral::read_reg!(ral::i2c, i2c, OAR1),
            Register::Oar2 => ral::read_reg!(ral::i2c, i2c, OAR2),
            Register::Dr => ral::read_reg!(ral::i2c, i2c, DR),
            Register::Sr1 => ral::read_reg!(ral::i2c, i2c, SR1),
            Register::Sr2 => ral::read_reg!(ral::i2c, i2c, SR2),
            Register::Ccr => ral::read_reg!(ral::i2c, i2c, CCR),
            Register::Trise => ral::read_reg!(ral::i2c, i2c, TRISE),
        }
    }

    fn write(&self, register: Register, value: u32) {
        let i2c = self;
        match register {
            Register::Cr1 => ral::write_reg!(ral::i2c, i2c, CR1, value),
            Register::Cr2 => ral::write_reg!(ral::i2c, i2c, CR2, value),
            Register::Oar1 => ral::write_reg!(ral::i2c, i2c, OAR1, value),
            Register::Oar2 => ral::write_reg!(ral::i2c, i2c, OAR2, value),
            Register::Dr => ral::write_reg!(ral::i2c, i2c, DR, value),
            Register::Sr1 => ral::write_reg!(ral::i2c, i2c, SR1, value),
            Register::Sr2 => ral::write_reg!(ral::i2c, i2c, SR2, value),
            Register::Ccr => ral::write_reg!(ral::i2c, i2c, CCR, value),
            Register::Trise => ral::write_reg!(ral::i2c, i2c, TRISE, value),
        }
    }
}

/// One of the two I2C controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Instance {
    I2c1,
    I2c2,
}

impl Instance {
    /// Register block address.
    pub const fn address(self) -> usize {
        match self {
            Instance::I2c1 => ral::I2C1,
            Instance::I2c2 => ral::I2C2,
        }
    }

    /// Own address used unless [`Config::own_address`] says otherwise.
    pub const fn own_address(self) -> u8 {
        match self {
            Instance::I2c1 => 0x03,
            Instance::I2c2 => 0x04,
        }
    }

    pub const fn event_interrupt(self) -> Interrupt {
        match self {
            Instance::I2c1 => Interrupt::I2C1_EV,
            Instance::I2c2 => Interrupt::I2C2_EV,
        }
    }

    pub const fn error_interrupt(self) -> Interrupt {
        match self {
            Instance::I2c1 => Interrupt::I2C1_ER,
            Instance::I2c2 => Interrupt::I2C2_ER,
        }
    }

    /// DMA request for transmitting.
    pub const fn tx_request(self) -> Request {
        match self {
            Instance::I2c1 => Request::I2C1_TX,
            Instance::I2c2 => Request::I2C2_TX,
        }
    }

    /// DMA request for receiving.
    pub const fn rx_request(self) -> Request {
        match self {
            Instance::I2c1 => Request::I2C1_RX,
            Instance::I2c2 => Request::I2C2_RX,
        }
    }
}

/// Which DMA channels to attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Transmit,
    Receive,
    Both,
}

/// I2C controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// APB1 clock feeding the controller.
    pub pclk1_hz: u32,
    /// Standard mode SCL frequency.
    ///
    /// A value of zero, or one too large to double, leaves CCR unchanged on
    /// reset.
    pub bus_hz: u32,
    /// Own address. `None` selects the instance default.
    pub own_address: Option<u8>,
    /// Bound on every hardware handshake.
    pub wait: BoundedWait,
}

impl Config {
    /// 100 kHz bus, default own address, default wait budget.
    pub const fn new(pclk1_hz: u32) -> Self {
        Self {
            pclk1_hz,
            bus_hz: 100_000,
            own_address: None,
            wait: BoundedWait::DEFAULT,
        }
    }
}

impl Default for Config {
    /// PCLK1 at 36 MHz, the maximum for APB1.
    fn default() -> Self {
        Self::new(36_000_000)
    }
}

struct State {
    result: ResultCode,
    own_address: u8,
}

/// An I2C master.
///
/// `R` accesses the controller registers. `D` accesses the DMA controller
/// registers, and is only used once DMA channels are [attached](I2c::attach).
pub struct I2c<'cb, R, D: Access<channel::Register>> {
    instance: Instance,
    registers: R,
    config: Config,
    state: Spinlock<State>,
    tx: Option<Channel<'cb, D>>,
    rx: Option<Channel<'cb, D>>,
}

impl<'cb, R, D: Access<channel::Register>> I2c<'cb, R, D> {
    /// Create the driver. Call [`init`](Self::init) before using it.
    pub const fn new(instance: Instance, registers: R, config: Config) -> Self {
        let own_address = match config.own_address {
            Some(address) => address,
            None => instance.own_address(),
        };
        Self {
            instance,
            registers,
            config,
            state: Spinlock::new(State {
                result: ResultCode::Success,
                own_address,
            }),
            tx: None,
            rx: None,
        }
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transmit DMA channel, if attached.
    pub fn tx_channel(&self) -> Option<&Channel<'cb, D>> {
        self.tx.as_ref()
    }

    /// The receive DMA channel, if attached.
    pub fn rx_channel(&self) -> Option<&Channel<'cb, D>> {
        self.rx.as_ref()
    }

    /// Returns `true` if the DMA channels for `direction` are attached.
    pub fn has_dma(&self, direction: Direction) -> bool {
        match direction {
            Direction::Transmit => self.tx.is_some(),
            Direction::Receive => self.rx.is_some(),
            Direction::Both => self.tx.is_some() && self.rx.is_some(),
        }
    }

    /// The own address programmed into OAR1.
    pub fn own_address(&self) -> u8 {
        self.state.lock().own_address
    }

    /// The outcome of the most recent transaction.
    pub fn result_code(&self) -> ResultCode {
        self.state.lock().result
    }
}

impl<'cb, R, D> I2c<'cb, R, D>
where
    R: Access<Register>,
    D: Access<channel::Register> + Clone,
{
    /// Reset the controller, and enable its event and error interrupts.
    pub fn init<C: InterruptControl>(&self, interrupts: &C) {
        self.reset();
        interrupts.enable_interrupt(self.instance.event_interrupt());
        interrupts.enable_interrupt(self.instance.error_interrupt());
    }

    /// Attach DMA channels from `dma`.
    ///
    /// Returns `false` if a requested channel is already bound elsewhere.
    /// Channels that could be bound stay attached.
    pub fn attach(&mut self, dma: &Dma<D>, direction: Direction) -> bool {
        let mut attached = true;
        if matches!(direction, Direction::Receive | Direction::Both) && self.rx.is_none() {
            self.rx = dma.bind(self.instance.rx_request());
            attached &= self.rx.is_some();
        }
        if matches!(direction, Direction::Transmit | Direction::Both) && self.tx.is_none() {
            self.tx = dma.bind(self.instance.tx_request());
            attached &= self.tx.is_some();
        }
        if !attached {
            warn!("{} DMA channel unavailable", self.instance);
        }
        attached
    }

    fn engine(&self, own_address: u8) -> Engine<'_, R> {
        Engine {
            registers: &self.registers,
            config: &self.config,
            own_address,
        }
    }

    /// Run a transaction under the lock, recording its result.
    fn transact<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Engine<'_, R>) -> ResultCode,
    {
        let mut state = self.state.lock();
        let engine = self.engine(state.own_address);
        let mut result = engine.ready();
        if result.is_success() {
            engine.enable();
            result = f(&engine);
        }
        if !result.is_success() {
            debug!("{} transaction failed: {}", self.instance, result);
        }
        state.result = result;
        result.is_success()
    }

    fn fail(&self, result: ResultCode) -> bool {
        self.state.lock().result = result;
        false
    }

    /// Reset the controller and reprogram its timing and own address.
    pub fn reset(&self) {
        let state = self.state.lock();
        self.engine(state.own_address).soft_reset();
    }

    /// Program `own_address`, and acknowledge when addressed as a slave.
    pub fn listen(&self, own_address: u8) {
        let mut state = self.state.lock();
        state.own_address = own_address;
        self.registers
            .write(Register::Oar1, u32::from(own_address) << 1);
        self.registers.set_bits(Register::Cr1, CR1::ACK);
        self.registers
            .set_bits(Register::Cr2, CR2::ITEVTEN | CR2::ITERREN);
    }

    /// Read SR1, then SR2.
    pub fn status(&self) -> Status {
        Status::new(
            self.registers.read(Register::Sr1),
            self.registers.read(Register::Sr2),
        )
    }

    /// Read `data.len()` bytes from the device at `address`.
    ///
    /// An empty `data` succeeds without touching the bus.
    pub fn read(&self, address: u8, data: &mut [u8]) -> bool {
        if data.is_empty() {
            self.state.lock().result = ResultCode::Success;
            return true;
        }
        self.transact(|engine| engine.receive(address, data))
    }

    /// Write `data` to the device at `address`.
    ///
    /// An empty `data` checks that the device acknowledges its address.
    pub fn write(&self, address: u8, data: &[u8]) -> bool {
        self.transact(|engine| engine.transmit(address, data))
    }

    /// Write `data` to the device at `address` using the transmit DMA
    /// channel.
    ///
    /// For more than one byte, the channel is programmed for
    /// `data.len() + 1` elements, one past the end of `data`. The hardware
    /// raises transfer complete only after one request past the final byte,
    /// so the DMA controller may read the byte just past the end of `data`.
    /// STOP goes out right after that, and the byte is not sent as data. Keep
    /// that in mind when `data` ends at the edge of a memory region. A single
    /// byte is programmed as exactly one element. An empty
    /// `data` only probes the address, like [`write`](Self::write).
    pub fn dma_transfer(&self, address: u8, data: &[u8]) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return self.fail(ResultCode::NoDma(Mode::DmaTransmit));
        };
        if data.is_empty() {
            return self.write(address, data);
        }
        self.transact(|engine| engine.dma_transmit(tx, address, data))
    }

    /// Read `data.len()` bytes from the device at `address` using the
    /// receive DMA channel.
    ///
    /// The controller can't receive a single byte by DMA. One byte is
    /// received by polling instead.
    pub fn dma_receive(&self, address: u8, data: &mut [u8]) -> bool {
        let Some(rx) = self.rx.as_ref() else {
            return self.fail(ResultCode::NoDma(Mode::DmaReceive));
        };
        if data.len() < 2 {
            return self.read(address, data);
        }
        self.transact(|engine| engine.dma_receive(rx, address, data))
    }

    /// Wait up to 10 ms for the bus to release.
    ///
    /// Returns `true` once the bus isn't busy.
    pub fn wait_bus_release<T: DelayNs>(&self, delay: &mut T) -> bool {
        for _ in 0..10 {
            if !self.registers.test(Register::Sr2, SR2::BUSY) {
                return true;
            }
            delay.delay_ms(1);
        }
        let released = !self.registers.test(Register::Sr2, SR2::BUSY);
        if !released {
            warn!("{} stays busy, check that SDA is high", self.instance);
        }
        released
    }

    /// Handle the event interrupt.
    ///
    /// Only enabled when [listening](Self::listen). Acknowledges an address
    /// match and a stop condition.
    pub fn on_event_interrupt(&self) -> Status {
        let sr1 = self.registers.read(Register::Sr1);
        let sr2 = if sr1 & SR1::ADDR != 0 {
            self.registers.read(Register::Sr2)
        } else {
            0
        };
        if sr1 & SR1::STOPF != 0 {
            // STOPF clears with a read of SR1 followed by a write of CR1.
            self.registers.modify(Register::Cr1, |cr1| cr1);
        }
        Status::new(sr1, sr2)
    }

    /// Handle the error interrupt by clearing the error conditions.
    pub fn on_error_interrupt(&self) {
        let sr1 = self.registers.read(Register::Sr1);
        trace!("{} error interrupt {}", self.instance, sr1 & SR1::ERRORS);
        self.registers.write(Register::Sr1, sr1 & !SR1::ERRORS);
    }
}
