//! Raw register channels
//!
//! Named single-register controls exposed for direct read and write:
//! temperature sensors (read-only) and the voltage-typed RF, gain, FX3 and
//! power controls.

use crate::error::{DdcError, Result};
use crate::registers::RegisterInterface;
use ddc_chip::regs;
use tracing::debug;

/// Channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Temperature sensor; reads the low byte, ignores writes
    Temperature,
    /// Control register; raw read and write
    Voltage,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "temp"),
            Self::Voltage => write!(f, "voltage"),
        }
    }
}

/// One raw channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChannel {
    /// Channel name
    pub name: &'static str,
    /// Channel type
    pub kind: ChannelKind,
    /// Index within its type
    pub index: u32,
    /// Register offset
    pub address: usize,
}

const fn temp(index: u32, name: &'static str, address: usize) -> RawChannel {
    RawChannel {
        name,
        kind: ChannelKind::Temperature,
        index,
        address,
    }
}

const fn voltage(index: u32, name: &'static str, address: usize) -> RawChannel {
    RawChannel {
        name,
        kind: ChannelKind::Voltage,
        index,
        address,
    }
}

/// Every raw channel, temperature channels first.
pub const RAW_CHANNELS: [RawChannel; 20] = [
    temp(0, "local", regs::TEMP_LOCAL),
    temp(1, "remote", regs::TEMP_REMOTE),
    temp(2, "status", regs::TEMP_STATUS),
    voltage(0, "RX1_ATT", regs::RX1_ATT),
    voltage(1, "RX2_ATT", regs::RX2_ATT),
    voltage(2, "TX1_ATT", regs::TX1_ATT),
    voltage(3, "TX2_ATT", regs::TX2_ATT),
    voltage(4, "LNA", regs::CONFIG_LNA),
    voltage(5, "CAPTURE_INTERVAL", regs::CAPTURE_INTERVAL),
    voltage(6, "WORK_MODE", regs::WORK_MODE),
    voltage(7, "GAIN_HB", regs::GAIN_HB),
    voltage(8, "GAIN_POLY", regs::GAIN_POLY),
    voltage(9, "FX3_MODE", regs::FX3_MODE),
    voltage(10, "FX3_LENGTH", regs::FX3_LENGTH),
    voltage(11, "FX3_INTERVAL", regs::FX3_INTERVAL),
    voltage(12, "FX3_DATA_EN", regs::FX3_DATA_EN),
    voltage(13, "FX3_RESET", regs::FX3_RESET),
    voltage(14, "CALC_LEN", regs::CALC_LEN),
    voltage(15, "POW_LINE", regs::POW_LINE),
    voltage(16, "POW_DB", regs::POW_DB),
];

/// Look up a channel by name, ignoring ASCII case.
///
/// # Errors
///
/// [`DdcError::InvalidArgument`] for an unknown name.
pub fn find(name: &str) -> Result<&'static RawChannel> {
    RAW_CHANNELS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| DdcError::invalid_argument(format!("unknown channel {name:?}")))
}

impl RawChannel {
    /// Current raw value
    #[must_use]
    pub fn read(&self, registers: &dyn RegisterInterface) -> u32 {
        let value = registers.read32(self.address);
        match self.kind {
            ChannelKind::Temperature => value & regs::TEMP_MASK,
            ChannelKind::Voltage => value,
        }
    }

    /// Write a raw value. Returns false if the channel ignores writes.
    pub fn write(&self, registers: &dyn RegisterInterface, value: u32) -> bool {
        match self.kind {
            ChannelKind::Temperature => {
                debug!("Write to read-only channel {} ignored", self.name);
                false
            }
            ChannelKind::Voltage => {
                registers.write32(self.address, value);
                true
            }
        }
    }
}
