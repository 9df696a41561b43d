//! Transaction outcomes.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// The transfer style that produced a [`ResultCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    PollingTransmit,
    PollingReceive,
    DmaTransmit,
    DmaReceive,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::PollingTransmit => "polling master transmitter",
            Mode::PollingReceive => "polling master receiver",
            Mode::DmaTransmit => "dma master transmitter",
            Mode::DmaReceive => "dma master receiver",
        }
    }
}

/// Why the most recent transaction succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResultCode {
    #[default]
    Success,
    /// The bus stayed busy after error recovery.
    BusBusy,
    /// A bus error condition couldn't be cleared.
    DeviceError,
    /// The start condition wasn't generated.
    StartFailed(Mode),
    /// The address wasn't acknowledged.
    AddressFailed(Mode),
    /// A data phase step timed out.
    Timeout(Mode),
    /// A DMA transfer was requested without an attached DMA channel.
    NoDma(Mode),
}

impl ResultCode {
    pub const fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }

    /// The transfer style, if the failure happened within a transfer.
    pub const fn mode(self) -> Option<Mode> {
        match self {
            ResultCode::Success | ResultCode::BusBusy | ResultCode::DeviceError => None,
            ResultCode::StartFailed(mode)
            | ResultCode::AddressFailed(mode)
            | ResultCode::Timeout(mode)
            | ResultCode::NoDma(mode) => Some(mode),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ResultCode::Success => f.write_str("success"),
            ResultCode::BusBusy => f.write_str("i2c bus busy"),
            ResultCode::DeviceError => f.write_str("i2c device error condition"),
            ResultCode::StartFailed(mode) => write!(f, "i2c {} start failed", mode.as_str()),
            ResultCode::AddressFailed(mode) => write!(f, "i2c {} address failed", mode.as_str()),
            ResultCode::Timeout(mode) => write!(f, "i2c {} timeout", mode.as_str()),
            ResultCode::NoDma(mode) => write!(f, "i2c {} has no dma", mode.as_str()),
        }
    }
}

impl embedded_hal::i2c::Error for ResultCode {
    fn kind(&self) -> ErrorKind {
        match self {
            ResultCode::AddressFailed(_) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            ResultCode::BusBusy | ResultCode::DeviceError => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}
