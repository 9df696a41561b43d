//! DMA register blocks and fields

use super::{RORegister, RWRegister, WORegister};

/// The number of channels on DMA1.
pub const CHANNELS: usize = 7;

/// DMA registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt status register
    pub ISR: RORegister<u32>,
    /// Interrupt flag clear register
    pub IFCR: WORegister<u32>,
    /// Per-channel registers, channel 1 first
    pub CH: [ChannelRegisters; CHANNELS],
}

/// Registers for a single channel.
#[repr(C)]
pub struct ChannelRegisters {
    /// Configuration register
    pub CCR: RWRegister<u32>,
    /// Number of data register
    pub CNDTR: RWRegister<u32>,
    /// Peripheral address register
    pub CPAR: RWRegister<u32>,
    /// Memory address register
    pub CMAR: RWRegister<u32>,
    _reserved: [u32; 1],
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, CH) == 0x08);
const _: () = assert!(core::mem::size_of::<ChannelRegisters>() == 20);
// Channel 7 CMAR, the last register in the block.
const _: () = assert!(
    core::mem::offset_of!(RegisterBlock, CH)
        + 6 * core::mem::size_of::<ChannelRegisters>()
        + core::mem::offset_of!(ChannelRegisters, CMAR)
        == 0x8C
);

/// Interrupt flags, shifted by `4 * (channel - 1)` in ISR and IFCR.
pub mod ISR {
    pub const GIF: u32 = 1 << 0;
    pub const TCIF: u32 = 1 << 1;
    pub const HTIF: u32 = 1 << 2;
    pub const TEIF: u32 = 1 << 3;
    pub const ALL: u32 = GIF | TCIF | HTIF | TEIF;
}

pub mod CCR {
    pub const EN: u32 = 1 << 0;
    pub const TCIE: u32 = 1 << 1;
    pub const HTIE: u32 = 1 << 2;
    pub const TEIE: u32 = 1 << 3;
    pub const DIR: u32 = 1 << 4;
    pub const CIRC: u32 = 1 << 5;
    pub const PINC: u32 = 1 << 6;
    pub const MINC: u32 = 1 << 7;
    pub const PSIZE_OFFSET: u32 = 8;
    pub const MSIZE_OFFSET: u32 = 10;
    pub const SIZE_MASK: u32 = 0b11;
    pub const PL_OFFSET: u32 = 12;
    pub const MEM2MEM: u32 = 1 << 14;
}

pub mod CNDTR {
    pub const NDT: u32 = 0xffff;
}
