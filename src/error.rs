//! DMA configuration errors

/// Errors from configuring a DMA [`Channel`](crate::channel::Channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The channel is enabled. Disable it before changing its
    /// configuration.
    Armed,
    /// The transfer is longer than the 16-bit transfer counter allows.
    TooLong,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Armed => f.write_str("DMA channel is enabled"),
            Error::TooLong => f.write_str("DMA transfer is longer than 65535 elements"),
        }
    }
}
