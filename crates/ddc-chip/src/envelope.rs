//! Waveform upload envelope.
//!
//! A waveform upload is a single binary blob framed by two markers. All
//! header fields are little-endian `u32`s:
//!
//! ```text
//! offset  field
//! 0x00    start marker           START_MARKER
//! 0x04    enable flag            nonzero → arm playback after the load
//! 0x08    playback mode          see regs::playback
//! 0x0C    DDR start address
//! 0x10    DDR end address        0 → derived from sequence count and length
//! 0x14    payload length         bytes, multiple of 4
//! 0x18    sequence count         ≥ 1 when payload length > 0
//! 0x1C    payload …
//! 0x1C+N  end marker             END_MARKER
//! ```

/// Magic value of the first header word.
pub const START_MARKER: u32 = 0x5AA5_0F0F;
/// Magic value expected right after the payload.
pub const END_MARKER: u32 = 0xF0F0_A55A;

/// Header field offsets.
pub mod field {
    /// Start marker.
    pub const START_MARKER: usize = 0x00;
    /// Enable flag.
    pub const ENABLE: usize = 0x04;
    /// Playback mode.
    pub const MODE: usize = 0x08;
    /// DDR start address.
    pub const DDR_START: usize = 0x0C;
    /// DDR end address.
    pub const DDR_END: usize = 0x10;
    /// Payload length in bytes.
    pub const PAYLOAD_LENGTH: usize = 0x14;
    /// Sequence count.
    pub const SEQUENCE_COUNT: usize = 0x18;
}

/// Bytes before the payload.
pub const HEADER_SIZE: usize = 0x1C;
/// Size of the trailing end marker.
pub const END_MARKER_SIZE: usize = 4;

/// Capacity of the waveform upload channel.
pub const WAVEFORM_CAPACITY: usize = 0x4_0100;
/// Largest payload the channel accepts.
pub const MAX_PAYLOAD: usize = WAVEFORM_CAPACITY - HEADER_SIZE;

/// Words per FIFO chunk.
pub const CHUNK_WORDS: usize = 4;
/// Bytes per FIFO chunk.
pub const CHUNK_BYTES: usize = CHUNK_WORDS * 4;

/// DDR words occupied by one sequence.
pub const SEQUENCE_UNIT: u32 = 0x2_0000;

/// Offset of the end marker for a given payload length.
#[must_use]
pub const fn end_marker_offset(payload_length: usize) -> usize {
    HEADER_SIZE + payload_length
}
