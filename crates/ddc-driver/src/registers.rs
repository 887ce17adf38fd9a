//! Register access abstraction
//!
//! Everything above this layer talks to the core through 32-bit reads and
//! writes at byte offsets. Backends decide how those reach the hardware.

use std::fmt::Debug;

/// 32-bit register access to a mapped core.
///
/// Both operations are infallible once the backend exists: mapping errors
/// surface when the backend is constructed, not per access.
pub trait RegisterInterface: Debug + Send + Sync {
    /// Read the register at `offset`
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`
    fn write32(&self, offset: usize, value: u32);

    /// Strobe a register: write 1, then 0
    fn pulse(&self, offset: usize) {
        self.write32(offset, 1);
        self.write32(offset, 0);
    }

    /// Backend type for debugging
    fn backend_type(&self) -> BackendType;
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Memory-mapped resource file
    Mmap,

    /// In-memory register file, no hardware required
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmap => write!(f, "MMIO"),
            Self::Software => write!(f, "Software"),
        }
    }
}
