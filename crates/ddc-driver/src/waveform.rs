//! Waveform upload and playback
//!
//! A waveform upload is one enveloped blob (see [`ddc_chip::envelope`])
//! written to the waveform channel in pieces. Every write re-examines what
//! has been received:
//!
//! 1. foreign start marker → ignored, nothing touched
//! 2. bad payload length → `InvalidArgument`
//! 3. end marker not yet received, or wrong → keep waiting
//! 4. otherwise disarm playback, stream the payload through the DUC FIFO,
//!    start the DDR load and wait for it, then arm playback if requested
//!
//! Stages 1-3 never write a register. The FIFO takes one 16-byte chunk at a
//! time: words go in reversed, the chunk index is set, and a commit strobe
//! latches them.

use crate::buffer::{le_u32, Progress, UploadBuffer};
use crate::config::{DeviceConfig, PollBudget};
use crate::error::{DdcError, Result};
use crate::registers::RegisterInterface;
use bytes::Bytes;
use ddc_chip::envelope::{self, field, CHUNK_BYTES, HEADER_SIZE, SEQUENCE_UNIT};
use ddc_chip::regs;
use tracing::{debug, error, info, warn};

/// Playback parameters last committed to the DUC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Playback armed
    pub enabled: bool,
    /// Playback mode register value
    pub mode: u32,
    /// DDR start address
    pub ddr_start: u32,
    /// DDR end address as written
    pub ddr_end: u32,
    /// Sequence count of the last streamed payload
    pub sequence_count: u32,
}

/// Decoded envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformEnvelope {
    /// Arm playback after the load
    pub enable: bool,
    /// Playback mode
    pub mode: u32,
    /// DDR start address
    pub ddr_start: u32,
    /// DDR end address, 0 to derive it
    pub ddr_end: u32,
    /// Payload length in bytes
    pub payload_length: usize,
    /// Sequence count
    pub sequence_count: u32,
}

impl WaveformEnvelope {
    /// Decode the header fields after the start marker.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            enable: le_u32(bytes, field::ENABLE)? != 0,
            mode: le_u32(bytes, field::MODE)?,
            ddr_start: le_u32(bytes, field::DDR_START)?,
            ddr_end: le_u32(bytes, field::DDR_END)?,
            payload_length: le_u32(bytes, field::PAYLOAD_LENGTH)? as usize,
            sequence_count: le_u32(bytes, field::SEQUENCE_COUNT)?,
        })
    }

    /// Offset of the end marker
    #[must_use]
    pub const fn end_marker_offset(&self) -> usize {
        envelope::end_marker_offset(self.payload_length)
    }

    /// DDR end address to program: the supplied one, or
    /// `SEQUENCE_UNIT * (sequence_count - 1) + payload_length / 2` when 0.
    ///
    /// Computed in 32-bit register arithmetic.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn ddr_end_address(&self) -> u32 {
        if self.ddr_end != 0 {
            return self.ddr_end;
        }
        SEQUENCE_UNIT
            .wrapping_mul(self.sequence_count.saturating_sub(1))
            .wrapping_add((self.payload_length / 2) as u32)
    }

    fn validate(&self, capacity: usize) -> Result<()> {
        let max = capacity.saturating_sub(HEADER_SIZE);
        if self.payload_length % 4 != 0 || self.payload_length > max {
            return Err(DdcError::invalid_argument(format!(
                "payload length {:#x} must be a multiple of 4 and at most {max:#x}",
                self.payload_length
            )));
        }
        Ok(())
    }

    fn validate_sequence(&self) -> Result<u32> {
        if self.payload_length == 0 {
            return Ok(0);
        }
        if self.sequence_count == 0 {
            return Err(DdcError::invalid_argument(
                "sequence count must be at least 1 for a non-empty payload",
            ));
        }
        SEQUENCE_UNIT
            .checked_mul(self.sequence_count)
            .ok_or_else(|| {
                DdcError::invalid_argument(format!(
                    "sequence count {} overflows the load length",
                    self.sequence_count
                ))
            })
    }
}

/// Waveform upload channel and the playback state it commits.
#[derive(Debug)]
pub struct WaveformSession {
    buffer: UploadBuffer,
    start_marker: u32,
    end_marker: u32,
    poll: PollBudget,
    playback: PlaybackConfig,
    loaded: Option<Bytes>,
}

impl WaveformSession {
    /// Session using the capacity, markers and poll budget of `config`.
    #[must_use]
    pub const fn new(config: &DeviceConfig) -> Self {
        Self {
            buffer: UploadBuffer::new(config.waveform_capacity),
            start_marker: config.start_marker,
            end_marker: config.end_marker,
            poll: config.poll,
            playback: PlaybackConfig {
                enabled: false,
                mode: regs::playback::OFF,
                ddr_start: 0,
                ddr_end: 0,
                sequence_count: 0,
            },
            loaded: None,
        }
    }

    /// Last committed playback configuration
    #[must_use]
    pub const fn playback(&self) -> &PlaybackConfig {
        &self.playback
    }

    /// Payload of the last upload that reached DDR
    #[must_use]
    pub const fn loaded_payload(&self) -> Option<&Bytes> {
        self.loaded.as_ref()
    }

    /// Bytes of the transfer in progress
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Accept `bytes` at `offset` and act on the envelope once complete.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a bad payload length or sequence count and for
    /// writes past the capacity, `OutOfMemory` if the buffer cannot grow,
    /// `HardwareTimeout` if the DDR load never completes. Any error drops
    /// the transfer; the committed playback configuration is only changed
    /// by the steps that already reached the hardware.
    pub fn write(
        &mut self,
        registers: &dyn RegisterInterface,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Progress> {
        let result = self
            .buffer
            .append(offset, bytes)
            .and_then(|()| self.advance(registers));
        if let Err(e) = &result {
            self.buffer.discard();
            error!("Waveform upload failed: {e}");
        }
        result
    }

    fn advance(&mut self, registers: &dyn RegisterInterface) -> Result<Progress> {
        let Some(start) = self.buffer.word(field::START_MARKER) else {
            return Ok(Progress::Incomplete);
        };
        if start != self.start_marker {
            warn!(
                "Waveform upload ignored: start marker {start:#010x}, expected {:#010x}",
                self.start_marker
            );
            return Ok(Progress::ForeignMarker);
        }

        let Some(envelope) = WaveformEnvelope::decode(self.buffer.as_slice()) else {
            return Ok(Progress::Incomplete);
        };
        envelope.validate(self.buffer.capacity())?;

        let end = envelope.end_marker_offset();
        match self.buffer.word(end) {
            None => {
                debug!(
                    "Waveform upload: {} of {} bytes",
                    self.buffer.len(),
                    end + envelope::END_MARKER_SIZE
                );
                return Ok(Progress::Incomplete);
            }
            Some(marker) if marker != self.end_marker => {
                debug!("Waveform upload: end marker {marker:#010x} at {end:#x}, waiting");
                return Ok(Progress::Incomplete);
            }
            Some(_) => {}
        }

        let load_length = envelope.validate_sequence()?;

        registers.write32(regs::PLAYBACK_MODE, regs::playback::OFF);
        self.playback.enabled = false;

        if envelope.payload_length > 0 {
            let payload = &self.buffer.as_slice()[HEADER_SIZE..end];
            stream_payload(registers, payload);
            start_load(registers, load_length, self.poll)?;
            self.playback.sequence_count = envelope.sequence_count;
        }

        if envelope.enable {
            self.playback = enable_playback(registers, &envelope);
        }

        info!(
            "Waveform committed: {} payload bytes, playback {}",
            envelope.payload_length,
            if self.playback.enabled { "armed" } else { "off" }
        );
        let blob = self.buffer.finalize();
        if envelope.payload_length > 0 {
            self.loaded = Some(blob.slice(HEADER_SIZE..end));
        }
        Ok(Progress::Applied)
    }
}

/// Feed the payload to the DUC FIFO, one chunk per commit strobe.
///
/// A short last chunk is zero-padded.
fn stream_payload(registers: &dyn RegisterInterface, payload: &[u8]) {
    let mut chunks = 0u32;
    for (index, chunk) in (0u32..).zip(payload.chunks(CHUNK_BYTES)) {
        let mut words = [0u32; envelope::CHUNK_WORDS];
        for (word, bytes) in words.iter_mut().zip(chunk.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        for (fifo, word) in regs::FIFO_DATA.iter().zip(words.iter().rev()) {
            registers.write32(*fifo, *word);
        }
        registers.write32(regs::FIFO_INDEX, index);
        registers.pulse(regs::FIFO_COMMIT);
        chunks = index + 1;
    }
    debug!("Streamed {chunks} chunks ({} bytes)", payload.len());
}

/// Start the DDR load and poll for completion.
fn start_load(registers: &dyn RegisterInterface, length: u32, poll: PollBudget) -> Result<()> {
    registers.write32(regs::LOAD_LENGTH, length);
    registers.pulse(regs::LOAD_STROBE);

    for attempt in 1..=poll.attempts {
        if registers.read32(regs::LOAD_DONE) != 0 {
            debug!("DDR load complete after {attempt} polls");
            return Ok(());
        }
        if attempt < poll.attempts {
            std::thread::sleep(poll.interval);
        }
    }

    Err(DdcError::HardwareTimeout {
        register: regs::LOAD_DONE,
        attempts: poll.attempts,
    })
}

fn enable_playback(registers: &dyn RegisterInterface, envelope: &WaveformEnvelope) -> PlaybackConfig {
    let ddr_end = envelope.ddr_end_address();
    registers.write32(regs::DDR_START, envelope.ddr_start);
    registers.write32(regs::DDR_END, ddr_end);
    registers.write32(regs::PLAYBACK_MODE, envelope.mode);
    registers.pulse(regs::PLAYBACK_ENABLE);

    PlaybackConfig {
        enabled: true,
        mode: envelope.mode,
        ddr_start: envelope.ddr_start,
        ddr_end,
        sequence_count: envelope.sequence_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareRegisters;
    use crate::error::ErrorKind;
    use std::time::Duration;

    fn config() -> DeviceConfig {
        DeviceConfig::default().with_poll(PollBudget {
            attempts: 10,
            interval: Duration::ZERO,
        })
    }

    fn blob(enable: u32, mode: u32, ddr_end: u32, payload: &[u8], seq: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for word in [
            envelope::START_MARKER,
            enable,
            mode,
            0x100,
            ddr_end,
            u32::try_from(payload.len()).unwrap(),
            seq,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(payload);
        out.extend_from_slice(&envelope::END_MARKER.to_le_bytes());
        out
    }

    #[test]
    fn decode_reads_header_fields() {
        let env = WaveformEnvelope::decode(&blob(1, 2, 0, &[0; 8], 3)).unwrap();
        assert!(env.enable);
        assert_eq!(env.mode, 2);
        assert_eq!(env.ddr_start, 0x100);
        assert_eq!(env.payload_length, 8);
        assert_eq!(env.sequence_count, 3);
        assert_eq!(env.end_marker_offset(), HEADER_SIZE + 8);
        assert!(WaveformEnvelope::decode(&[0; HEADER_SIZE - 1]).is_none());
    }

    #[test]
    fn derived_ddr_end() {
        let mut env = WaveformEnvelope::decode(&blob(1, 1, 0, &[0; 32], 2)).unwrap();
        assert_eq!(env.ddr_end_address(), 0x2_0000 + 16);
        env.ddr_end = 0x1234;
        assert_eq!(env.ddr_end_address(), 0x1234);
        env.ddr_end = 0;
        env.sequence_count = 0;
        env.payload_length = 0;
        assert_eq!(env.ddr_end_address(), 0);
    }

    #[test]
    fn fifo_words_are_reversed_and_padded() {
        let regs = SoftwareRegisters::new();
        let payload: Vec<u8> = [1u32, 2, 3, 4, 5]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        stream_payload(&regs, &payload);

        let fifo: Vec<(usize, u32)> = regs
            .writes()
            .into_iter()
            .filter(|(o, _)| regs::FIFO_DATA.contains(o))
            .collect();
        assert_eq!(
            fifo,
            vec![
                (regs::FIFO_DATA[0], 4),
                (regs::FIFO_DATA[1], 3),
                (regs::FIFO_DATA[2], 2),
                (regs::FIFO_DATA[3], 1),
                (regs::FIFO_DATA[0], 0),
                (regs::FIFO_DATA[1], 0),
                (regs::FIFO_DATA[2], 0),
                (regs::FIFO_DATA[3], 5),
            ]
        );
        assert_eq!(regs.writes_to(regs::FIFO_INDEX), vec![0, 1]);
    }

    #[test]
    fn empty_payload_with_enable_skips_streaming() {
        let regs = SoftwareRegisters::new();
        let mut session = WaveformSession::new(&config());
        let progress = session.write(&regs, 0, &blob(1, 2, 0x800, &[], 1)).unwrap();
        assert_eq!(progress, Progress::Applied);
        assert_eq!(
            regs.writes(),
            vec![
                (regs::PLAYBACK_MODE, 0),
                (regs::DDR_START, 0x100),
                (regs::DDR_END, 0x800),
                (regs::PLAYBACK_MODE, 2),
                (regs::PLAYBACK_ENABLE, 1),
                (regs::PLAYBACK_ENABLE, 0),
            ]
        );
        assert!(session.playback().enabled);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn disabled_envelope_only_disarms() {
        let regs = SoftwareRegisters::new().with_value(regs::LOAD_DONE, 1);
        let mut session = WaveformSession::new(&config());
        session.write(&regs, 0, &blob(0, 1, 0, &[0; 16], 1)).unwrap();
        assert!(regs.writes_to(regs::PLAYBACK_ENABLE).is_empty());
        assert_eq!(regs.writes_to(regs::PLAYBACK_MODE), vec![0]);
        assert!(!session.playback().enabled);
        assert_eq!(session.playback().sequence_count, 1);
    }

    #[test]
    fn zero_sequence_count_changes_nothing() {
        let regs = SoftwareRegisters::new();
        let mut session = WaveformSession::new(&config());
        let err = session.write(&regs, 0, &blob(1, 1, 0, &[0; 16], 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(regs.writes().is_empty());
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let regs = SoftwareRegisters::new();
        let mut session = WaveformSession::new(&config());
        let mut header = blob(1, 1, 0, &[], 1);
        header[field::PAYLOAD_LENGTH..field::PAYLOAD_LENGTH + 4]
            .copy_from_slice(&u32::try_from(envelope::MAX_PAYLOAD + 4).unwrap().to_le_bytes());
        let err = session.write(&regs, 0, &header[..HEADER_SIZE]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(regs.writes().is_empty());
    }

    #[test]
    fn poll_stops_at_first_nonzero() {
        let regs = SoftwareRegisters::new();
        regs.script_reads(regs::LOAD_DONE, [0, 0, 1]);
        start_load(&regs, 0x2_0000, config().poll).unwrap();
        assert_eq!(regs.read_count(regs::LOAD_DONE), 3);
    }

    #[test]
    fn incomplete_then_applied() {
        let regs = SoftwareRegisters::new().with_value(regs::LOAD_DONE, 1);
        let mut session = WaveformSession::new(&config());
        let data = blob(1, 1, 0, &[7; 32], 1);
        let (head, tail) = data.split_at(20);

        assert_eq!(session.write(&regs, 0, head).unwrap(), Progress::Incomplete);
        assert!(regs.writes().is_empty());
        assert_eq!(session.write(&regs, 20, tail).unwrap(), Progress::Applied);
        assert_eq!(regs.writes_to(regs::FIFO_COMMIT), vec![1, 0, 1, 0]);
        assert_eq!(session.loaded_payload().unwrap().as_ref(), &[7; 32]);
    }
}
