//! DMA element sizes.

mod private {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// An element that the DMA controller moves in a single beat.
///
/// This trait is sealed. It's implemented for `u8`, `u16`, and `u32`.
pub trait Element: Copy + private::Sealed {
    /// The PSIZE / MSIZE encoding for this element.
    const SIZE: u32;
}

impl Element for u8 {
    const SIZE: u32 = 0b00;
}

impl Element for u16 {
    const SIZE: u32 = 0b01;
}

impl Element for u32 {
    const SIZE: u32 = 0b10;
}
