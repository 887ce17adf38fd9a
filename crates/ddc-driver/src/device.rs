//! DDC device handle
//!
//! A [`DdcDevice`] owns the register interface of one core together with its
//! upload channels and playback state. Configuration changes (profile and
//! waveform uploads, span, raw writes) hold the device lock exclusively;
//! status reads share it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use ddc_chip::regs;
use tracing::info;

use crate::buffer::Progress;
use crate::channels;
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::profile::{CoefficientProfile, ProfileChannel};
use crate::registers::{BackendType, RegisterInterface};
use crate::span::SpanController;
use crate::waveform::{PlaybackConfig, WaveformSession};

/// Read-back of either upload channel.
pub const CHANNEL_PLACEHOLDER: &[u8] = b"TBD";

/// HDL build identification, BCD-coded by the FPGA image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HdlIdent {
    /// Build year
    pub year: u32,
    /// Build month
    pub month: u32,
    /// Build day
    pub date: u32,
    /// User version
    pub version: u32,
}

impl HdlIdent {
    fn read(registers: &dyn RegisterInterface) -> Self {
        let [year, month, date, version] = regs::HDL_IDENT.map(|r| registers.read32(r));
        Self {
            year,
            month,
            date,
            version,
        }
    }
}

impl fmt::Display for HdlIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}/{:x}/{:x} version({:x})",
            self.year, self.month, self.date, self.version
        )
    }
}

#[derive(Debug)]
struct DeviceState {
    profile: ProfileChannel,
    waveform: WaveformSession,
}

/// One DDC/DUC core
#[derive(Debug)]
pub struct DdcDevice {
    registers: Arc<dyn RegisterInterface>,
    config: DeviceConfig,
    ident: HdlIdent,
    state: RwLock<DeviceState>,
}

impl DdcDevice {
    /// Bring a freshly configured core to its boot state.
    ///
    /// Selects the widest span, zeroes attenuators and stage gains, reads the
    /// HDL identification and loads the default filter tables.
    pub fn probe(registers: Arc<dyn RegisterInterface>, config: DeviceConfig) -> Self {
        registers.write32(regs::SPAN, 0);
        for reg in regs::ATTENUATORS.into_iter().chain(regs::GAIN_CONTROLS) {
            registers.write32(reg, 0);
        }

        let ident = HdlIdent::read(registers.as_ref());
        info!("HDL user datetime {ident} on {}", registers.backend_type());

        let defaults = CoefficientProfile::defaults();
        defaults.push(registers.as_ref());

        let device = Self::with_state(registers, config, ident);
        device.write_state().profile.set_committed(defaults);
        device
    }

    /// Wrap a core that is already configured; only the identification
    /// registers are read.
    pub fn attach(registers: Arc<dyn RegisterInterface>, config: DeviceConfig) -> Self {
        let ident = HdlIdent::read(registers.as_ref());
        info!("Attached to HDL {ident} on {}", registers.backend_type());
        Self::with_state(registers, config, ident)
    }

    fn with_state(
        registers: Arc<dyn RegisterInterface>,
        config: DeviceConfig,
        ident: HdlIdent,
    ) -> Self {
        let state = DeviceState {
            profile: ProfileChannel::new(config.profile_capacity),
            waveform: WaveformSession::new(&config),
        };
        Self {
            registers,
            config,
            ident,
            state: RwLock::new(state),
        }
    }

    /// HDL identification read at probe/attach
    #[must_use]
    pub const fn ident(&self) -> HdlIdent {
        self.ident
    }

    /// Device configuration
    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Register backend in use
    #[must_use]
    pub fn backend_type(&self) -> BackendType {
        self.registers.backend_type()
    }

    // ── Profile channel ──────────────────────────────────────────────────────

    /// Feed profile text at `offset`, reporting what the write achieved.
    ///
    /// # Errors
    ///
    /// See [`ProfileChannel::write`].
    pub fn upload_profile(&self, offset: usize, bytes: &[u8]) -> Result<Progress> {
        let mut state = self.write_state();
        state.profile.write(self.registers.as_ref(), offset, bytes)
    }

    /// Profile channel write: bytes consumed.
    ///
    /// # Errors
    ///
    /// See [`ProfileChannel::write`].
    pub fn write_profile(&self, offset: usize, bytes: &[u8]) -> Result<usize> {
        self.upload_profile(offset, bytes).map(|_| bytes.len())
    }

    /// Profile channel read-back.
    #[must_use]
    pub fn read_profile(&self, offset: usize) -> &'static [u8] {
        placeholder(offset)
    }

    /// Profile last written to the coefficient windows
    #[must_use]
    pub fn committed_profile(&self) -> Option<CoefficientProfile> {
        self.read_state().profile.committed().cloned()
    }

    // ── Waveform channel ─────────────────────────────────────────────────────

    /// Feed waveform bytes at `offset`, reporting what the write achieved.
    ///
    /// # Errors
    ///
    /// See [`WaveformSession::write`].
    pub fn upload_waveform(&self, offset: usize, bytes: &[u8]) -> Result<Progress> {
        let mut state = self.write_state();
        state.waveform.write(self.registers.as_ref(), offset, bytes)
    }

    /// Waveform channel write: bytes consumed.
    ///
    /// # Errors
    ///
    /// See [`WaveformSession::write`].
    pub fn write_waveform(&self, offset: usize, bytes: &[u8]) -> Result<usize> {
        self.upload_waveform(offset, bytes).map(|_| bytes.len())
    }

    /// Waveform channel read-back.
    #[must_use]
    pub fn read_waveform(&self, offset: usize) -> &'static [u8] {
        placeholder(offset)
    }

    /// Payload of the last waveform loaded into DDR
    #[must_use]
    pub fn loaded_payload(&self) -> Option<Bytes> {
        self.read_state().waveform.loaded_payload().cloned()
    }

    /// Playback configuration last committed
    #[must_use]
    pub fn playback(&self) -> PlaybackConfig {
        *self.read_state().waveform.playback()
    }

    // ── Span ─────────────────────────────────────────────────────────────────

    /// Select the span for `bandwidth_hz`; returns the code written.
    pub fn set_span(&self, bandwidth_hz: u64) -> u32 {
        let _state = self.write_state();
        self.span().write(bandwidth_hz)
    }

    /// Current span bandwidth in Hz (0 for an unknown code)
    #[must_use]
    pub fn span_hz(&self) -> u64 {
        let _state = self.read_state();
        self.span().read()
    }

    /// Span text channel write: decimal Hz.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the text is not a decimal integer.
    pub fn write_span(&self, text: &[u8]) -> Result<usize> {
        let _state = self.write_state();
        self.span().write_text(text)
    }

    /// Span text channel read: decimal Hz and a newline.
    #[must_use]
    pub fn read_span(&self) -> String {
        let _state = self.read_state();
        self.span().read_text()
    }

    fn span(&self) -> SpanController<'_> {
        SpanController::new(self.registers.as_ref())
    }

    // ── Raw channels ─────────────────────────────────────────────────────────

    /// Raw value of a named channel.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown channel.
    pub fn read_raw(&self, channel: &str) -> Result<u32> {
        let channel = channels::find(channel)?;
        let _state = self.read_state();
        Ok(channel.read(self.registers.as_ref()))
    }

    /// Write a named channel. Writes to temperature channels are ignored.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown channel.
    pub fn write_raw(&self, channel: &str, value: u32) -> Result<()> {
        let channel = channels::find(channel)?;
        let _state = self.write_state();
        channel.write(self.registers.as_ref(), value);
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, DeviceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DeviceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn placeholder(offset: usize) -> &'static [u8] {
    if offset == 0 {
        CHANNEL_PLACEHOLDER
    } else {
        &[]
    }
}
