//! ADC register block and fields

use super::RWRegister;

/// ADC registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Status register
    pub SR: RWRegister<u32>,
    /// Control register 1
    pub CR1: RWRegister<u32>,
    /// Control register 2
    pub CR2: RWRegister<u32>,
    /// Sample time register 1
    pub SMPR1: RWRegister<u32>,
    /// Sample time register 2
    pub SMPR2: RWRegister<u32>,
    /// Injected channel data offset registers
    pub JOFR: [RWRegister<u32>; 4],
    /// Watchdog high threshold register
    pub HTR: RWRegister<u32>,
    /// Watchdog low threshold register
    pub LTR: RWRegister<u32>,
    /// Regular sequence register 1
    pub SQR1: RWRegister<u32>,
    /// Regular sequence register 2
    pub SQR2: RWRegister<u32>,
    /// Regular sequence register 3
    pub SQR3: RWRegister<u32>,
    /// Injected sequence register
    pub JSQR: RWRegister<u32>,
    /// Injected data registers
    pub JDR: [RWRegister<u32>; 4],
    /// Regular data register
    pub DR: RWRegister<u32>,
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, SQR1) == 0x2C);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, DR) == 0x4C);

/// Offset of the data register, used as the DMA peripheral address.
pub const DR_OFFSET: usize = core::mem::offset_of!(RegisterBlock, DR);

pub mod SR {
    pub const EOC: u32 = 1 << 1;
}

pub mod CR1 {
    pub const EOCIE: u32 = 1 << 5;
    pub const SCAN: u32 = 1 << 8;
}

pub mod CR2 {
    pub const ADON: u32 = 1 << 0;
    pub const CONT: u32 = 1 << 1;
    pub const CAL: u32 = 1 << 2;
    pub const RSTCAL: u32 = 1 << 3;
    pub const DMA: u32 = 1 << 8;
    pub const EXTSEL_OFFSET: u32 = 17;
    /// EXTSEL value selecting the SWSTART software trigger.
    pub const EXTSEL_SWSTART: u32 = 0b111 << EXTSEL_OFFSET;
    pub const EXTTRIG: u32 = 1 << 20;
    pub const SWSTART: u32 = 1 << 22;
}

pub mod SMPR {
    /// 239.5 cycles, the longest sample time.
    pub const SMP_239_5: u32 = 0b111;
    pub const SMP_WIDTH: u32 = 3;
}

pub mod SQR {
    pub const SQ_WIDTH: u32 = 5;
    pub const L_OFFSET: u32 = 20;
}
