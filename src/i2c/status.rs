//! Status register snapshots.

use core::fmt;

use crate::ral::i2c::{SR1, SR2};

/// SR1 in the low half-word, SR2 in the high half-word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u32);

const NAMES: [(u32, &str); 17] = [
    (SR1::SB, "SB"),
    (SR1::ADDR, "ADDR"),
    (SR1::BTF, "BTF"),
    (SR1::ADD10, "ADD10"),
    (SR1::STOPF, "STOPF"),
    (SR1::RXNE, "RxNE"),
    (SR1::TXE, "TxE"),
    (SR1::BERR, "BERR"),
    (SR1::ARLO, "ARLO"),
    (SR1::AF, "AF"),
    (SR1::OVR, "OVR"),
    (SR1::PECERR, "PECERR"),
    (SR1::TIMEOUT, "TIMEOUT"),
    (SR1::SMBALERT, "SMBALERT"),
    (SR2::MSL << 16, "MSL"),
    (SR2::BUSY << 16, "BUSY"),
    (SR2::TRA << 16, "TRA"),
];

impl Status {
    pub const fn new(sr1: u32, sr2: u32) -> Self {
        Self((sr1 & 0xffff) | (sr2 << 16))
    }
    pub const fn bits(self) -> u32 {
        self.0
    }
    pub const fn sr1(self) -> u32 {
        self.0 & 0xffff
    }
    pub const fn sr2(self) -> u32 {
        self.0 >> 16
    }
    pub const fn is_busy(self) -> bool {
        self.sr2() & SR2::BUSY != 0
    }
    /// The bus error conditions that are set.
    pub const fn errors(self) -> u32 {
        self.sr1() & SR1::ERRORS
    }
}

impl fmt::Display for Status {
    /// Lists the names of the set flags.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (bit, name) in NAMES {
            if self.0 & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("idle")?;
        }
        Ok(())
    }
}
