//! The master-mode protocol engine.
//!
//! An [`Engine`] drives one controller through
//! `BusReady -> Start -> Address -> Data -> Stop`. Every step that waits on
//! the hardware is a single [`BoundedWait`](crate::BoundedWait). A
//! [`Transaction`] guard performs the stop and cleanup sequence on every
//! exit path, so a step that fails only needs to return its code.
//!
//! Register ordering matters here. ADDR is cleared by reading SR1 and then
//! SR2; nothing may access the controller between those reads.

use crate::channel::{self, Channel};
use crate::ral::i2c::{CR1, CR2, SR1, SR2};
use crate::Access;

use super::{Config, Mode, Register, ResultCode, Status};

/// Direction bit appended to the slave address.
#[derive(Clone, Copy)]
enum Direction {
    Write = 0,
    Read = 1,
}

pub(super) struct Engine<'a, R> {
    pub(super) registers: &'a R,
    pub(super) config: &'a Config,
    pub(super) own_address: u8,
}

impl<R: Access<Register>> Engine<'_, R> {
    fn read(&self, register: Register) -> u32 {
        self.registers.read(register)
    }

    fn test(&self, register: Register, bits: u32) -> bool {
        self.registers.test(register, bits)
    }

    fn wait_for(&self, register: Register, bits: u32) -> bool {
        self.config.wait.until(|| self.test(register, bits))
    }

    /// Read SR1, then SR2.
    ///
    /// When ADDR is set, this is the sequence that clears it.
    pub(super) fn status(&self) -> Status {
        let sr1 = self.read(Register::Sr1);
        let sr2 = self.read(Register::Sr2);
        Status::new(sr1, sr2)
    }

    fn clear_address(&self) {
        let _ = self.status();
    }

    pub(super) fn busy(&self) -> bool {
        self.test(Register::Sr2, SR2::BUSY)
    }

    /// Reset the controller, and reprogram its timing and own address.
    pub(super) fn soft_reset(&self) {
        let pclk1 = self.config.pclk1_hz;
        self.registers.clear_bits(Register::Cr1, CR1::PE);
        self.registers.set_bits(Register::Cr1, CR1::SWRST);
        self.registers.clear_bits(Register::Cr1, CR1::SWRST);

        let freq = (pclk1 / 1_000_000) & CR2::FREQ;
        self.registers
            .modify(Register::Cr2, |cr2| (cr2 & !CR2::FREQ) | freq);
        self.registers.write(Register::Trise, freq + 1);
        self.registers
            .write(Register::Oar1, u32::from(self.own_address) << 1);
        self.registers.write(Register::Oar2, 0);
        match self
            .config
            .bus_hz
            .checked_mul(2)
            .and_then(|period| pclk1.checked_div(period))
        {
            Some(ccr) => self.registers.write(Register::Ccr, ccr),
            None => warn!("I2C bus frequency {} Hz unusable, CCR unchanged", self.config.bus_hz),
        }
        info!("I2C reset, FREQ {} MHz, own address {}", freq, self.own_address);
    }

    /// Clear bus error conditions.
    ///
    /// An acknowledge failure seen while the bus is still busy, or while
    /// we're still master, can't be cleared with the flags. That takes a
    /// reset. Any other condition is cleared in place.
    ///
    /// Returns `true` if no error conditions remain.
    pub(super) fn clear_errors(&self) -> bool {
        let sr1 = self.read(Register::Sr1);
        if sr1 & SR1::ERRORS == 0 {
            return true;
        }
        let sr2 = self.read(Register::Sr2);
        if sr1 & SR1::AF != 0 && sr2 & (SR2::BUSY | SR2::MSL) != 0 {
            warn!("I2C acknowledge failure with bus held, resetting");
            self.soft_reset();
        } else {
            debug!("I2C clearing error conditions {}", sr1 & SR1::ERRORS);
            self.registers.clear_bits(Register::Sr1, SR1::ERRORS);
        }
        !self.test(Register::Sr1, SR1::ERRORS)
    }

    /// Bring the bus to a state where a transaction can start.
    pub(super) fn ready(&self) -> ResultCode {
        if !self.clear_errors() {
            return ResultCode::DeviceError;
        }
        if !self.config.wait.until(|| !self.busy()) {
            self.clear_errors();
        }
        if self.busy() {
            ResultCode::BusBusy
        } else {
            ResultCode::Success
        }
    }

    /// Peripheral on, acknowledge received bytes.
    pub(super) fn enable(&self) {
        self.registers.set_bits(Register::Cr1, CR1::PE | CR1::ACK);
    }

    fn start(&self) -> bool {
        self.registers.set_bits(Register::Cr1, CR1::START);
        self.wait_for(Register::Sr1, SR1::SB)
    }

    /// Send the slave address. Returns `true` when ADDR is set.
    ///
    /// The wait ends early if the address isn't acknowledged.
    fn address(&self, address: u8, direction: Direction) -> bool {
        self.registers.write(
            Register::Dr,
            (u32::from(address & 0x7f) << 1) | direction as u32,
        );
        self.wait_for(Register::Sr1, SR1::ADDR | SR1::AF) && self.test(Register::Sr1, SR1::ADDR)
    }

    fn read_data(&self) -> u8 {
        self.read(Register::Dr) as u8
    }

    /// Master transmitter. An empty `data` only probes the address.
    pub(super) fn transmit(&self, address: u8, data: &[u8]) -> ResultCode {
        let mode = Mode::PollingTransmit;
        let mut transaction = Transaction::new(self);
        if !transaction.start() {
            return ResultCode::StartFailed(mode);
        }
        if !self.address(address, Direction::Write) {
            return ResultCode::AddressFailed(mode);
        }
        self.clear_address();
        for &byte in data {
            self.registers.write(Register::Dr, u32::from(byte));
            if !self.wait_for(Register::Sr1, SR1::TXE | SR1::BTF) {
                return ResultCode::Timeout(mode);
            }
        }
        ResultCode::Success
    }

    /// Master receiver.
    ///
    /// The data phase depends on the transfer size. Reception has to be
    /// stopped while the final bytes are still arriving, and the point at
    /// which the NACK and STOP are scheduled differs for one, two, and more
    /// bytes.
    pub(super) fn receive(&self, address: u8, data: &mut [u8]) -> ResultCode {
        let mode = Mode::PollingReceive;
        let mut transaction = Transaction::new(self);
        if !transaction.start() {
            return ResultCode::StartFailed(mode);
        }
        if !self.address(address, Direction::Read) {
            return ResultCode::AddressFailed(mode);
        }
        match data {
            [] => {
                self.clear_address();
                ResultCode::Success
            }
            [only] => self.receive_one(only),
            [first, second] => self.receive_two(first, second),
            _ => self.receive_many(data),
        }
    }

    fn receive_one(&self, byte: &mut u8) -> ResultCode {
        self.registers.clear_bits(Register::Cr1, CR1::ACK);
        self.clear_address();
        self.registers.set_bits(Register::Cr1, CR1::STOP);
        if !self.wait_for(Register::Sr1, SR1::RXNE) {
            return ResultCode::Timeout(Mode::PollingReceive);
        }
        *byte = self.read_data();
        ResultCode::Success
    }

    fn receive_two(&self, first: &mut u8, second: &mut u8) -> ResultCode {
        self.registers.set_bits(Register::Cr1, CR1::POS);
        self.clear_address();
        self.registers.clear_bits(Register::Cr1, CR1::ACK);
        let result = if self.wait_for(Register::Sr1, SR1::BTF) {
            self.registers.set_bits(Register::Cr1, CR1::STOP);
            *first = self.read_data();
            *second = self.read_data();
            ResultCode::Success
        } else {
            ResultCode::Timeout(Mode::PollingReceive)
        };
        self.registers.clear_bits(Register::Cr1, CR1::POS);
        result
    }

    fn receive_many(&self, data: &mut [u8]) -> ResultCode {
        let timeout = ResultCode::Timeout(Mode::PollingReceive);
        self.clear_address();

        let n = data.len();
        for byte in &mut data[..n - 3] {
            if !self.wait_for(Register::Sr1, SR1::RXNE) {
                return timeout;
            }
            *byte = self.read_data();
        }
        // N-2 in DR, N-1 in the shift register.
        if !self.wait_for(Register::Sr1, SR1::BTF) {
            return timeout;
        }
        self.registers.clear_bits(Register::Cr1, CR1::ACK);
        data[n - 3] = self.read_data();
        self.registers.set_bits(Register::Cr1, CR1::STOP);
        data[n - 2] = self.read_data();
        if !self.wait_for(Register::Sr1, SR1::RXNE) {
            return timeout;
        }
        data[n - 1] = self.read_data();
        ResultCode::Success
    }

    /// Master transmitter, with the data phase driven by `channel`.
    pub(super) fn dma_transmit<D: Access<channel::Register>>(
        &self,
        channel: &Channel<'_, D>,
        address: u8,
        data: &[u8],
    ) -> ResultCode {
        let mode = Mode::DmaTransmit;
        let mut transaction = Transaction::new(self);

        // Transfer complete rises one request after the final byte, so the
        // count runs one element past the data. A single byte is the
        // exception.
        let count = if data.len() == 1 { 1 } else { data.len() + 1 };
        // Safety: for more than one byte, the channel is programmed for
        // `data.len() + 1` reads, so the controller may fetch the byte just
        // past the end of `data` into DR as STOP goes out. That byte is a
        // bus-master read of memory adjacent to the slice; it is never
        // transmitted as data. The channel is disabled by `_armed`, which
        // drops before this function returns and ends the borrow of `data`.
        if let Err(error) = unsafe { channel.set_transmit_buffer(data.as_ptr(), count) } {
            warn!("I2C DMA transmit not armed: {}", error);
            return ResultCode::DeviceError;
        }
        // Safety: see above.
        let _armed = unsafe { channel.scoped_enable() };
        let _request = DmaRequest::new(self);

        if !transaction.start() {
            return ResultCode::StartFailed(mode);
        }
        if !self.address(address, Direction::Write) {
            return ResultCode::AddressFailed(mode);
        }
        self.clear_address();
        if self.config.wait.until(|| channel.transfer_complete()) {
            ResultCode::Success
        } else {
            ResultCode::Timeout(mode)
        }
    }

    /// Master receiver, with the data phase driven by `channel`.
    ///
    /// `data` must hold at least two bytes.
    pub(super) fn dma_receive<D: Access<channel::Register>>(
        &self,
        channel: &Channel<'_, D>,
        address: u8,
        data: &mut [u8],
    ) -> ResultCode {
        let mode = Mode::DmaReceive;
        let _armed = match channel.receive(data) {
            Ok(armed) => armed,
            Err(error) => {
                warn!("I2C DMA receive not armed: {}", error);
                return ResultCode::DeviceError;
            }
        };
        let _request = DmaRequest::new(self);
        // NACK the final byte the DMA controller reads.
        self.registers.set_bits(Register::Cr2, CR2::LAST);

        let mut transaction = Transaction::new(self);
        if !transaction.start() {
            return ResultCode::StartFailed(mode);
        }
        if !self.address(address, Direction::Read) {
            return ResultCode::AddressFailed(mode);
        }
        self.clear_address();
        if self.config.wait.until(|| channel.transfer_complete()) {
            ResultCode::Success
        } else {
            ResultCode::Timeout(mode)
        }
    }
}

/// Ends a transaction when dropped.
///
/// The cleanup is the same after success and after any failure:
///
/// 1. read SR1 and SR2, clearing a pending ADDR.
/// 2. if the start condition went out, send STOP and wait for the bus to
///    release. Otherwise, withdraw the START request.
/// 3. clear LAST.
/// 4. clear (or reset away) any bus error conditions.
pub(super) struct Transaction<'e, 'a, R: Access<Register>> {
    engine: &'e Engine<'a, R>,
    started: bool,
}

impl<'e, 'a, R: Access<Register>> Transaction<'e, 'a, R> {
    fn new(engine: &'e Engine<'a, R>) -> Self {
        Self {
            engine,
            started: false,
        }
    }

    fn start(&mut self) -> bool {
        self.started = self.engine.start();
        self.started
    }
}

impl<R: Access<Register>> Drop for Transaction<'_, '_, R> {
    fn drop(&mut self) {
        let engine = self.engine;
        let _ = engine.status();
        if self.started {
            engine.registers.set_bits(Register::Cr1, CR1::STOP);
            if !engine.config.wait.until(|| !engine.busy()) {
                debug!("I2C bus still busy after STOP");
            }
        } else {
            engine.registers.clear_bits(Register::Cr1, CR1::START);
        }
        engine.registers.clear_bits(Register::Cr2, CR2::LAST);
        engine.clear_errors();
    }
}

/// Lets the controller issue DMA requests until dropped.
struct DmaRequest<'e, 'a, R: Access<Register>> {
    engine: &'e Engine<'a, R>,
}

impl<'e, 'a, R: Access<Register>> DmaRequest<'e, 'a, R> {
    fn new(engine: &'e Engine<'a, R>) -> Self {
        engine.registers.set_bits(Register::Cr2, CR2::DMAEN);
        Self { engine }
    }
}

impl<R: Access<Register>> Drop for DmaRequest<'_, '_, R> {
    fn drop(&mut self) {
        self.engine
            .registers
            .clear_bits(Register::Cr2, CR2::DMAEN);
    }
}
