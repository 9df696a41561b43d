//! I2C register block and fields

use super::RWRegister;

/// I2C registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Control register 1
    pub CR1: RWRegister<u32>,
    /// Control register 2
    pub CR2: RWRegister<u32>,
    /// Own address register 1
    pub OAR1: RWRegister<u32>,
    /// Own address register 2
    pub OAR2: RWRegister<u32>,
    /// Data register
    pub DR: RWRegister<u32>,
    /// Status register 1
    pub SR1: RWRegister<u32>,
    /// Status register 2
    pub SR2: RWRegister<u32>,
    /// Clock control register
    pub CCR: RWRegister<u32>,
    /// Rise time register
    pub TRISE: RWRegister<u32>,
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, DR) == 0x10);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, TRISE) == 0x20);

/// Offset of the data register, used as the DMA peripheral address.
pub const DR_OFFSET: usize = core::mem::offset_of!(RegisterBlock, DR);

pub mod CR1 {
    pub const PE: u32 = 1 << 0;
    pub const START: u32 = 1 << 8;
    pub const STOP: u32 = 1 << 9;
    pub const ACK: u32 = 1 << 10;
    pub const POS: u32 = 1 << 11;
    pub const PEC: u32 = 1 << 12;
    pub const ALERT: u32 = 1 << 13;
    pub const SWRST: u32 = 1 << 15;
}

pub mod CR2 {
    pub const FREQ: u32 = 0x3f;
    pub const ITERREN: u32 = 1 << 8;
    pub const ITEVTEN: u32 = 1 << 9;
    pub const ITBUFEN: u32 = 1 << 10;
    pub const DMAEN: u32 = 1 << 11;
    pub const LAST: u32 = 1 << 12;
}

pub mod SR1 {
    pub const SB: u32 = 1 << 0;
    pub const ADDR: u32 = 1 << 1;
    pub const BTF: u32 = 1 << 2;
    pub const ADD10: u32 = 1 << 3;
    pub const STOPF: u32 = 1 << 4;
    pub const RXNE: u32 = 1 << 6;
    pub const TXE: u32 = 1 << 7;
    pub const BERR: u32 = 1 << 8;
    pub const ARLO: u32 = 1 << 9;
    pub const AF: u32 = 1 << 10;
    pub const OVR: u32 = 1 << 11;
    pub const PECERR: u32 = 1 << 12;
    pub const TIMEOUT: u32 = 1 << 14;
    pub const SMBALERT: u32 = 1 << 15;

    /// Every bus error condition reported in SR1.
    pub const ERRORS: u32 = SMBALERT | TIMEOUT | PECERR | OVR | AF | ARLO | BERR;
}

pub mod SR2 {
    pub const MSL: u32 = 1 << 0;
    pub const BUSY: u32 = 1 << 1;
    pub const TRA: u32 = 1 << 2;
}

pub mod CCR {
    pub const CCR: u32 = 0xfff;
}
