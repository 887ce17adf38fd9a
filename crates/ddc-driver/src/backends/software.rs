// SPDX-License-Identifier: AGPL-3.0-only

//! Software register backend
//!
//! An in-memory register file that records every access in order. It plays
//! two roles:
//!
//! 1. **CI without hardware**: every upload engine runs unchanged against it,
//!    so the full protocol is exercised without an FPGA.
//!
//! 2. **Register-sequence oracle**: tests assert the exact order and values
//!    of writes (strobe pairs, FIFO word order, window contents) from the
//!    access log.
//!
//! Reads return the last value written to the offset, or a value scripted
//! with [`SoftwareRegisters::script_reads`], or 0. Scripted values are
//! consumed first, in order, which is how tests model a completion flag that
//! rises after a few polls.

use crate::registers::{BackendType, RegisterInterface};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// One recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    /// `read32(offset)` returned `value`
    Read {
        /// Register offset
        offset: usize,
        /// Value returned
        value: u32,
    },
    /// `write32(offset, value)`
    Write {
        /// Register offset
        offset: usize,
        /// Value written
        value: u32,
    },
}

impl RegisterAccess {
    /// Offset of the access.
    pub const fn offset(&self) -> usize {
        match *self {
            Self::Read { offset, .. } | Self::Write { offset, .. } => offset,
        }
    }

    /// `(offset, value)` if this is a write.
    pub const fn as_write(&self) -> Option<(usize, u32)> {
        match *self {
            Self::Write { offset, value } => Some((offset, value)),
            Self::Read { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct RegisterFile {
    values: HashMap<usize, u32>,
    scripted: HashMap<usize, VecDeque<u32>>,
    log: Vec<RegisterAccess>,
}

/// In-memory register backend with an access log.
#[derive(Debug, Default)]
pub struct SoftwareRegisters {
    file: Mutex<RegisterFile>,
}

impl SoftwareRegisters {
    /// Empty register file, every register reads 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register without logging the change.
    #[must_use]
    pub fn with_value(self, offset: usize, value: u32) -> Self {
        self.set(offset, value);
        self
    }

    /// Change a register from the hardware side (not logged).
    pub fn set(&self, offset: usize, value: u32) {
        self.lock().values.insert(offset, value);
    }

    /// Queue values returned by the next reads of `offset`, before falling
    /// back to the register value.
    pub fn script_reads(&self, offset: usize, values: impl IntoIterator<Item = u32>) {
        self.lock()
            .scripted
            .entry(offset)
            .or_default()
            .extend(values);
    }

    /// Current register value (not logged).
    pub fn value(&self, offset: usize) -> u32 {
        self.lock().values.get(&offset).copied().unwrap_or(0)
    }

    /// Every access since creation or the last [`clear_log`](Self::clear_log).
    pub fn log(&self) -> Vec<RegisterAccess> {
        self.lock().log.clone()
    }

    /// Writes only, as `(offset, value)`, in order.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.lock()
            .log
            .iter()
            .filter_map(RegisterAccess::as_write)
            .collect()
    }

    /// Values written to one register, in order.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|&(o, _)| o == offset)
            .map(|(_, v)| v)
            .collect()
    }

    /// Number of reads of one register.
    pub fn read_count(&self, offset: usize) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|a| matches!(a, RegisterAccess::Read { offset: o, .. } if *o == offset))
            .count()
    }

    /// Forget recorded accesses; register values are kept.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    fn lock(&self) -> MutexGuard<'_, RegisterFile> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegisterInterface for SoftwareRegisters {
    fn read32(&self, offset: usize) -> u32 {
        let mut file = self.lock();
        let scripted = file.scripted.get_mut(&offset).and_then(VecDeque::pop_front);
        let value = scripted.unwrap_or_else(|| file.values.get(&offset).copied().unwrap_or(0));
        file.log.push(RegisterAccess::Read { offset, value });
        trace!("sw read32 @ {offset:#x} = {value:#x}");
        value
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut file = self.lock();
        file.values.insert(offset, value);
        file.log.push(RegisterAccess::Write { offset, value });
        trace!("sw write32 @ {offset:#x} = {value:#x}");
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_return_last_write() {
        let regs = SoftwareRegisters::new();
        assert_eq!(regs.read32(0x10), 0);
        regs.write32(0x10, 7);
        assert_eq!(regs.read32(0x10), 7);
        assert_eq!(regs.writes(), vec![(0x10, 7)]);
        assert_eq!(regs.read_count(0x10), 2);
    }

    #[test]
    fn scripted_reads_come_first() {
        let regs = SoftwareRegisters::new().with_value(0x30, 9);
        regs.script_reads(0x30, [0, 0, 1]);
        let seen: Vec<u32> = (0..4).map(|_| regs.read32(0x30)).collect();
        assert_eq!(seen, vec![0, 0, 1, 9]);
    }

    #[test]
    fn pulse_is_one_then_zero() {
        let regs = SoftwareRegisters::new();
        regs.pulse(0x24);
        assert_eq!(regs.writes_to(0x24), vec![1, 0]);
        regs.clear_log();
        assert!(regs.log().is_empty());
        assert_eq!(regs.value(0x24), 0);
    }
}
