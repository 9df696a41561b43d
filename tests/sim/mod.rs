//! A simulated I2C controller, DMA1, and ADC1.
//!
//! The model covers the parts of the hardware that the drivers depend on:
//! flags that rise and fall with register accesses, the SR1-then-SR2 read
//! that clears ADDR, and DMA transfers that run once the I2C controller
//! enters its data phase. Every access is logged with the calling thread.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use stm32f103_periph::interrupt::{Interrupt, InterruptControl};
use stm32f103_periph::ral::adc::{CR2 as ADC_CR2, SR as ADC_SR};
use stm32f103_periph::ral::dma::{CCR, ISR};
use stm32f103_periph::ral::i2c::{CR1, SR1, SR2};
use stm32f103_periph::{adc, channel, i2c, Access, BoundedWait};

/// A register in any of the simulated peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    I2c(i2c::Register),
    Dma(channel::Register),
    Adc(adc::Register),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read(Reg, u32),
    Write(Reg, u32),
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub thread: ThreadId,
    pub op: Op,
}

/// Fault injection.
#[derive(Debug, Default, Clone, Copy)]
pub struct Knobs {
    /// The addressed device doesn't acknowledge.
    pub nack: bool,
    /// START never produces a start condition.
    pub ignore_start: bool,
    /// Something holds the bus. BUSY never clears.
    pub stuck_busy: bool,
    /// Error flags can't be cleared.
    pub sticky_errors: bool,
    /// Transmitted bytes never leave the data register.
    pub tx_stall: bool,
    /// DMA channels never move data.
    pub dma_stalled: bool,
    /// ADC calibration never finishes.
    pub stuck_calibration: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Addressed { read: bool },
    Data { read: bool },
}

#[derive(Debug)]
pub struct I2cModel {
    pub cr1: u32,
    pub cr2: u32,
    pub oar1: u32,
    pub oar2: u32,
    pub sr1: u32,
    pub sr2: u32,
    pub ccr: u32,
    pub trise: u32,
    phase: Phase,
    /// The most recent access was an SR1 read that saw ADDR.
    addr_seen: bool,
    /// What the device sends for every read.
    pub response: Vec<u8>,
    rx: VecDeque<u8>,
    /// Bytes the device received.
    pub written: Vec<u8>,
    /// Address bytes put on the bus.
    pub addresses: Vec<u8>,
    pub starts: u32,
    pub stops: u32,
    pub resets: u32,
}

impl I2cModel {
    fn new() -> Self {
        Self {
            cr1: 0,
            cr2: 0,
            oar1: 0,
            oar2: 0,
            sr1: 0,
            sr2: 0,
            ccr: 0,
            trise: 0,
            phase: Phase::Idle,
            addr_seen: false,
            response: Vec::new(),
            rx: VecDeque::new(),
            written: Vec::new(),
            addresses: Vec::new(),
            starts: 0,
            stops: 0,
            resets: 0,
        }
    }

    /// Bytes received but not yet read.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelModel {
    pub ccr: u32,
    pub cndtr: u32,
    pub cpar: usize,
    pub cmar: usize,
}

#[derive(Debug, Default)]
pub struct DmaModel {
    pub isr: u32,
    pub ch: [ChannelModel; 7],
}

#[derive(Debug, Default)]
pub struct AdcModel {
    pub sr: u32,
    pub cr1: u32,
    pub cr2: u32,
    pub smpr1: u32,
    pub smpr2: u32,
    pub sqr1: u32,
    pub sqr2: u32,
    pub sqr3: u32,
    pub dr: u32,
    /// Conversion results, in order.
    pub conversions: VecDeque<u16>,
}

pub struct State {
    pub knobs: Knobs,
    pub i2c: I2cModel,
    pub dma: DmaModel,
    pub adc: AdcModel,
    pub log: Vec<Entry>,
}

pub struct Sim {
    state: Mutex<State>,
}

/// A short wait budget keeps failing tests fast.
pub const WAIT: BoundedWait = BoundedWait::new(200);

pub fn config() -> i2c::Config {
    let mut config = i2c::Config::new(36_000_000);
    config.wait = WAIT;
    config
}

impl Sim {
    pub fn new() -> Self {
        Self::with_knobs(Knobs::default())
    }

    pub fn with_knobs(knobs: Knobs) -> Self {
        Self {
            state: Mutex::new(State {
                knobs,
                i2c: I2cModel::new(),
                dma: DmaModel::default(),
                adc: AdcModel::default(),
                log: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_knobs(&self, knobs: Knobs) {
        self.state().knobs = knobs;
    }

    /// Data the device returns for reads.
    pub fn respond_with(&self, bytes: &[u8]) {
        self.state().i2c.response = bytes.to_vec();
    }

    pub fn written(&self) -> Vec<u8> {
        self.state().i2c.written.clone()
    }

    pub fn log(&self) -> Vec<Entry> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    /// Complete one scan on DMA1 channel 1, as if the ADC had converted
    /// `samples`.
    pub fn adc_scan(&self, samples: [u16; 4]) {
        let mut state = self.state();
        let ch = state.dma.ch[0];
        if ch.ccr & CCR::EN == 0 || state.knobs.dma_stalled {
            return;
        }
        let destination = ch.cmar as *mut u16;
        for (i, sample) in samples.into_iter().enumerate() {
            // Safety: the driver pointed CMAR at a live four sample buffer.
            unsafe { destination.add(i).write_volatile(sample) };
        }
        state.dma.isr |= ISR::TCIF | ISR::GIF;
    }
}

impl State {
    fn record(&mut self, op: Op) {
        self.log.push(Entry {
            thread: thread::current().id(),
            op,
        });
    }

    fn i2c_read(&mut self, register: i2c::Register) -> u32 {
        use i2c::Register::*;
        let addr_seen = std::mem::take(&mut self.i2c.addr_seen);
        let model = &mut self.i2c;
        match register {
            Cr1 => model.cr1,
            Cr2 => model.cr2,
            Oar1 => model.oar1,
            Oar2 => model.oar2,
            Ccr => model.ccr,
            Trise => model.trise,
            Dr => model.rx.pop_front().map_or(0, u32::from),
            Sr1 => {
                let mut sr1 = model.sr1;
                if !model.rx.is_empty() {
                    sr1 |= SR1::RXNE;
                }
                if model.rx.len() >= 2 {
                    sr1 |= SR1::BTF;
                }
                model.addr_seen = sr1 & SR1::ADDR != 0;
                sr1
            }
            Sr2 => {
                let mut sr2 = model.sr2;
                if self.knobs.stuck_busy {
                    sr2 |= SR2::BUSY;
                }
                if addr_seen {
                    self.address_cleared();
                }
                sr2
            }
        }
    }

    fn address_cleared(&mut self) {
        let model = &mut self.i2c;
        model.sr1 &= !SR1::ADDR;
        if let Phase::Addressed { read } = model.phase {
            model.phase = Phase::Data { read };
            if read {
                model.rx = model.response.iter().copied().collect();
            } else {
                model.sr1 |= SR1::TXE;
            }
            if model.cr2 & stm32f103_periph::ral::i2c::CR2::DMAEN != 0 {
                self.run_i2c_dma(read);
            }
        }
    }

    fn run_i2c_dma(&mut self, read: bool) {
        if self.knobs.dma_stalled {
            return;
        }
        let Some(index) = (3..7).find(|&i| {
            let ccr = self.dma.ch[i].ccr;
            ccr & CCR::EN != 0 && (ccr & CCR::DIR != 0) != read
        }) else {
            return;
        };
        let ch = &mut self.dma.ch[index];
        let count = ch.cndtr as usize;
        if read {
            if self.i2c.rx.len() < count {
                return;
            }
            let destination = ch.cmar as *mut u8;
            for i in 0..count {
                let byte = self.i2c.rx.pop_front().unwrap_or(0);
                // Safety: the driver pointed CMAR at a live buffer of
                // CNDTR bytes.
                unsafe { destination.add(i).write(byte) };
            }
        } else {
            // The last request is never served; the final byte is already
            // on its way when STOP goes out.
            let bytes = if count <= 1 { count } else { count - 1 };
            let source = ch.cmar as *const u8;
            for i in 0..bytes {
                // Safety: the driver pointed CMAR at a live buffer of at
                // least this many bytes.
                self.i2c.written.push(unsafe { source.add(i).read() });
            }
        }
        ch.cndtr = 0;
        self.dma.isr |= (ISR::TCIF | ISR::GIF) << (4 * index);
    }

    fn i2c_write(&mut self, register: i2c::Register, value: u32) {
        use i2c::Register::*;
        self.i2c.addr_seen = false;
        let knobs = self.knobs;
        let model = &mut self.i2c;
        match register {
            Cr1 => {
                let old = model.cr1;
                let mut cr1 = value;
                if cr1 & CR1::SWRST != 0 && old & CR1::SWRST == 0 {
                    model.resets += 1;
                    model.cr2 = 0;
                    model.oar1 = 0;
                    model.oar2 = 0;
                    model.ccr = 0;
                    model.trise = 0;
                    model.sr1 = 0;
                    model.sr2 = 0;
                    model.phase = Phase::Idle;
                    model.rx.clear();
                    model.cr1 = CR1::SWRST;
                    return;
                }
                if cr1 & CR1::START != 0 && !knobs.ignore_start {
                    cr1 &= !CR1::START;
                    model.starts += 1;
                    model.phase = Phase::Started;
                    model.rx.clear();
                    model.sr1 |= SR1::SB;
                    model.sr2 |= SR2::BUSY | SR2::MSL;
                }
                if cr1 & CR1::STOP != 0 {
                    cr1 &= !CR1::STOP;
                    model.stops += 1;
                    model.phase = Phase::Idle;
                    model.sr1 &= !(SR1::SB | SR1::ADDR | SR1::TXE | SR1::BTF);
                    model.sr2 &= !(SR2::BUSY | SR2::MSL | SR2::TRA);
                }
                model.cr1 = cr1;
            }
            Cr2 => model.cr2 = value,
            Oar1 => model.oar1 = value,
            Oar2 => model.oar2 = value,
            Ccr => model.ccr = value,
            Trise => model.trise = value,
            Dr => match model.phase {
                Phase::Started => {
                    model.addresses.push(value as u8);
                    model.sr1 &= !SR1::SB;
                    if knobs.nack {
                        model.sr1 |= SR1::AF;
                    } else {
                        let read = value & 1 != 0;
                        model.sr1 |= SR1::ADDR;
                        if !read {
                            model.sr2 |= SR2::TRA;
                        }
                        model.phase = Phase::Addressed { read };
                    }
                }
                Phase::Data { read: false } => {
                    model.sr1 &= !(SR1::TXE | SR1::BTF);
                    if !knobs.tx_stall {
                        model.written.push(value as u8);
                        model.sr1 |= SR1::TXE | SR1::BTF;
                    }
                }
                _ => {}
            },
            Sr1 => {
                if !knobs.sticky_errors {
                    let errors = model.sr1 & SR1::ERRORS & value;
                    model.sr1 = (model.sr1 & !SR1::ERRORS) | errors;
                }
            }
            Sr2 => {}
        }
    }

    fn dma_read(&mut self, register: channel::Register) -> u32 {
        use channel::Register::*;
        let dma = &self.dma;
        match register {
            Isr => dma.isr,
            Ifcr => 0,
            Ccr(n) => dma.ch[usize::from(n) - 1].ccr,
            Cndtr(n) => dma.ch[usize::from(n) - 1].cndtr,
            Cpar(n) => dma.ch[usize::from(n) - 1].cpar as u32,
            Cmar(n) => dma.ch[usize::from(n) - 1].cmar as u32,
        }
    }

    fn dma_write(&mut self, register: channel::Register, value: usize) {
        use channel::Register::*;
        let dma = &mut self.dma;
        match register {
            Isr => {}
            Ifcr => dma.isr &= !(value as u32),
            Ccr(n) => dma.ch[usize::from(n) - 1].ccr = value as u32,
            Cndtr(n) => dma.ch[usize::from(n) - 1].cndtr = value as u32 & 0xffff,
            Cpar(n) => dma.ch[usize::from(n) - 1].cpar = value,
            Cmar(n) => dma.ch[usize::from(n) - 1].cmar = value,
        }
    }

    fn adc_read(&mut self, register: adc::Register) -> u32 {
        use adc::Register::*;
        let model = &mut self.adc;
        match register {
            Sr => model.sr,
            Cr1 => model.cr1,
            Cr2 => model.cr2,
            Smpr1 => model.smpr1,
            Smpr2 => model.smpr2,
            Sqr1 => model.sqr1,
            Sqr2 => model.sqr2,
            Sqr3 => model.sqr3,
            Dr => {
                model.sr &= !ADC_SR::EOC;
                model.dr
            }
        }
    }

    fn adc_write(&mut self, register: adc::Register, value: u32) {
        use adc::Register::*;
        let stuck = self.knobs.stuck_calibration;
        let model = &mut self.adc;
        match register {
            Sr => model.sr &= value,
            Cr1 => model.cr1 = value,
            Cr2 => {
                let mut cr2 = value;
                if !stuck {
                    cr2 &= !(ADC_CR2::RSTCAL | ADC_CR2::CAL);
                }
                if cr2 & ADC_CR2::SWSTART != 0 {
                    cr2 &= !ADC_CR2::SWSTART;
                    if let Some(sample) = model.conversions.pop_front() {
                        model.dr = u32::from(sample);
                        model.sr |= ADC_SR::EOC;
                    }
                }
                model.cr2 = cr2;
            }
            Smpr1 => model.smpr1 = value,
            Smpr2 => model.smpr2 = value,
            Sqr1 => model.sqr1 = value,
            Sqr2 => model.sqr2 = value,
            Sqr3 => model.sqr3 = value,
            Dr => {}
        }
    }
}

impl Access<i2c::Register> for Sim {
    fn read(&self, register: i2c::Register) -> u32 {
        let mut state = self.state();
        let value = state.i2c_read(register);
        state.record(Op::Read(Reg::I2c(register), value));
        value
    }
    fn write(&self, register: i2c::Register, value: u32) {
        let mut state = self.state();
        state.record(Op::Write(Reg::I2c(register), value));
        state.i2c_write(register, value);
    }
}

impl Access<channel::Register> for Sim {
    fn read(&self, register: channel::Register) -> u32 {
        let mut state = self.state();
        let value = state.dma_read(register);
        state.record(Op::Read(Reg::Dma(register), value));
        value
    }
    fn write(&self, register: channel::Register, value: u32) {
        self.write_address(register, value as usize);
    }
    fn write_address(&self, register: channel::Register, address: usize) {
        let mut state = self.state();
        state.record(Op::Write(Reg::Dma(register), address as u32));
        state.dma_write(register, address);
    }
}

impl Access<adc::Register> for Sim {
    fn read(&self, register: adc::Register) -> u32 {
        let mut state = self.state();
        let value = state.adc_read(register);
        state.record(Op::Read(Reg::Adc(register), value));
        value
    }
    fn write(&self, register: adc::Register, value: u32) {
        let mut state = self.state();
        state.record(Op::Write(Reg::Adc(register), value));
        state.adc_write(register, value);
    }
}

/// Records which interrupts were enabled.
#[derive(Default)]
pub struct Interrupts {
    pub enabled: Mutex<Vec<Interrupt>>,
}

impl Interrupts {
    pub fn enabled(&self) -> Vec<Interrupt> {
        self.enabled.lock().unwrap().clone()
    }
}

impl InterruptControl for Interrupts {
    fn enable_interrupt(&self, interrupt: Interrupt) {
        self.enabled.lock().unwrap().push(interrupt);
    }
    fn disable_interrupt(&self, interrupt: Interrupt) {
        self.enabled.lock().unwrap().retain(|&i| i != interrupt);
    }
}
