//! Upload accumulation
//!
//! Both upload channels receive their payload as a sequence of writes at
//! increasing byte offsets, the way a binary sysfs attribute is fed. An
//! [`UploadBuffer`] holds the bytes received so far; a write at offset 0
//! starts a new transfer.

use crate::error::{DdcError, Result};
use bytes::Bytes;

/// Outcome of one write to an upload channel.
///
/// None of these is an error: the write call reports every byte as consumed
/// and the caller keeps streaming or starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Terminator not yet received; no hardware change
    Incomplete,
    /// Start marker does not belong to this channel; no hardware change
    ForeignMarker,
    /// Upload validated and written to the hardware
    Applied,
}

/// Capacity-bounded, offset-addressed byte buffer.
#[derive(Debug, Clone)]
pub struct UploadBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl UploadBuffer {
    /// Empty buffer accepting at most `capacity` bytes.
    pub const fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }

    /// Maximum transfer size
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes received so far (highest written offset + 1)
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True before the first write of a transfer
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Received bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Start a new transfer, dropping anything received.
    pub fn begin(&mut self) {
        self.data.clear();
    }

    /// Store `bytes` at `offset`.
    ///
    /// Offset 0 begins a new transfer. Writing past the current end
    /// zero-fills any gap.
    ///
    /// # Errors
    ///
    /// [`DdcError::InvalidArgument`] if the write would end past the
    /// capacity, [`DdcError::OutOfMemory`] if the buffer cannot grow.
    pub fn append(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.capacity)
            .ok_or_else(|| {
                DdcError::invalid_argument(format!(
                    "write of {} bytes at offset {offset:#x} exceeds capacity {:#x}",
                    bytes.len(),
                    self.capacity
                ))
            })?;

        if offset == 0 {
            self.begin();
        }

        if end > self.data.len() {
            self.data
                .try_reserve(end - self.data.len())
                .map_err(|_| DdcError::OutOfMemory { requested: end })?;
            self.data.resize(end, 0);
        }

        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Little-endian word at `offset`, if received.
    #[must_use]
    pub fn word(&self, offset: usize) -> Option<u32> {
        le_u32(&self.data, offset)
    }

    /// Hand over the completed transfer and reset.
    pub fn finalize(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.data))
    }

    /// Drop the transfer and release its memory.
    pub fn discard(&mut self) {
        self.data = Vec::new();
    }
}

pub(crate) fn le_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}
