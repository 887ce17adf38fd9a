//! Register map of the DDC/DUC core.
//!
//! All offsets are byte offsets from the start of the mapped AXI region and
//! address 32-bit registers. The core is split into blocks:
//!
//! ```text
//! 0x100000  DDC        halfband window, polyphase window
//! 0x150000  DUC        waveform FIFO, DDR playback control
//! 0x130000  RF         attenuators
//! 0x140000  FX3        USB3 streaming bridge
//! 0x180000  COMMON     HDL identification, span, temperatures, gains, power
//! ```

/// DDC block base.
pub const DDC_OFFSET: usize = 0x10_0000;
/// RF control block base.
pub const RF_CONTROL_OFFSET: usize = 0x13_0000;
/// FX3 USB bridge block base.
pub const FX3_CONTROL_OFFSET: usize = 0x14_0000;
/// DUC (transmit playback) block base.
pub const DUC_OFFSET: usize = 0x15_0000;
/// Common block base.
pub const COMMON_OFFSET: usize = 0x18_0000;

/// Stride between consecutive 32-bit registers.
pub const WORD: usize = 4;

/// Size of the register space the driver touches. Mappings shorter than
/// this cannot host the core.
pub const REGION_SIZE: usize = 0x20_0000;

// ── DDC coefficient windows ──────────────────────────────────────────────────

/// Halfband coefficient window: one word per tap.
pub const HALFBAND_BASE: usize = DDC_OFFSET;
/// Polyphase coefficient window: one word per tap.
pub const POLY_BASE: usize = DDC_OFFSET + 0x400;

/// Register holding halfband tap `index`.
#[must_use]
pub const fn halfband_tap(index: usize) -> usize {
    HALFBAND_BASE + index * WORD
}

/// Register holding polyphase tap `index`.
#[must_use]
pub const fn poly_tap(index: usize) -> usize {
    POLY_BASE + index * WORD
}

// ── Common block ─────────────────────────────────────────────────────────────

const fn common(word: usize) -> usize {
    COMMON_OFFSET + word * WORD
}

/// HDL build year (BCD).
pub const HDL_USER_YEAR: usize = common(0);
/// HDL build month (BCD).
pub const HDL_USER_MONTH: usize = common(1);
/// HDL build day (BCD).
pub const HDL_USER_DATE: usize = common(2);
/// HDL user version.
pub const HDL_USER_VERSION: usize = common(3);

/// Span (bandwidth) code register. See [`crate::span`].
pub const SPAN: usize = common(0x100);
/// LNA control.
pub const CONFIG_LNA: usize = common(0x101);
/// Local board temperature.
pub const TEMP_LOCAL: usize = common(0x102);
/// Remote (FPGA die) temperature.
pub const TEMP_REMOTE: usize = common(0x103);
/// Temperature sensor status.
pub const TEMP_STATUS: usize = common(0x104);

/// Capture interval.
pub const CAPTURE_INTERVAL: usize = common(0x180);
/// Work mode.
pub const WORK_MODE: usize = common(0x181);
/// Halfband stage gain.
pub const GAIN_HB: usize = common(0x182);
/// Polyphase stage gain.
pub const GAIN_POLY: usize = common(0x183);
/// Power calculation length.
pub const CALC_LEN: usize = common(0x184);
/// Measured power, linear.
pub const POW_LINE: usize = common(0x185);
/// Measured power, dB.
pub const POW_DB: usize = common(0x186);

/// Temperature registers only carry a value in the low byte.
pub const TEMP_MASK: u32 = 0xFF;

// ── RF block ─────────────────────────────────────────────────────────────────

/// RX1 attenuator.
pub const RX1_ATT: usize = RF_CONTROL_OFFSET;
/// RX2 attenuator.
pub const RX2_ATT: usize = RF_CONTROL_OFFSET + 4;
/// TX1 attenuator.
pub const TX1_ATT: usize = RF_CONTROL_OFFSET + 8;
/// TX2 attenuator.
pub const TX2_ATT: usize = RF_CONTROL_OFFSET + 12;

/// Attenuators zeroed at probe.
pub const ATTENUATORS: [usize; 4] = [RX1_ATT, RX2_ATT, TX1_ATT, TX2_ATT];
/// Gain-control registers zeroed at probe.
pub const GAIN_CONTROLS: [usize; 2] = [GAIN_HB, GAIN_POLY];
/// Identification registers read at probe, in report order.
pub const HDL_IDENT: [usize; 4] = [HDL_USER_YEAR, HDL_USER_MONTH, HDL_USER_DATE, HDL_USER_VERSION];

// ── FX3 block ────────────────────────────────────────────────────────────────

/// FPGA program mode (default 1).
pub const FX3_MODE: usize = FX3_CONTROL_OFFSET;
/// USB transfer length in words, minus one.
pub const FX3_LENGTH: usize = FX3_CONTROL_OFFSET + 0x4;
/// Sample interval: 0 → 122.88 Msps, 1 → 61.44 Msps, 2 → 40.96 Msps, …
pub const FX3_INTERVAL: usize = FX3_CONTROL_OFFSET + 0x8;
/// Streaming enable (default 1).
pub const FX3_DATA_EN: usize = FX3_CONTROL_OFFSET + 0xC;
/// Bridge reset, active on a 0 → 1 edge.
pub const FX3_RESET: usize = FX3_CONTROL_OFFSET + 0x10;

// ── DUC playback block ───────────────────────────────────────────────────────

/// Playback mode. Writing 0 disarms playback.
pub const PLAYBACK_MODE: usize = DUC_OFFSET;
/// DDR playback start address.
pub const DDR_START: usize = DUC_OFFSET + 0x04;
/// DDR playback end address.
pub const DDR_END: usize = DUC_OFFSET + 0x08;
/// Playback enable strobe.
pub const PLAYBACK_ENABLE: usize = DUC_OFFSET + 0x0C;

/// FIFO input words; a chunk is latched from all four at once.
pub const FIFO_DATA: [usize; 4] = [
    DUC_OFFSET + 0x10,
    DUC_OFFSET + 0x14,
    DUC_OFFSET + 0x18,
    DUC_OFFSET + 0x1C,
];
/// Index of the chunk currently held in `FIFO_DATA`.
pub const FIFO_INDEX: usize = DUC_OFFSET + 0x20;
/// Chunk commit strobe.
pub const FIFO_COMMIT: usize = DUC_OFFSET + 0x24;
/// Length of the DDR load, in `SEQUENCE_UNIT`s times sequence count.
pub const LOAD_LENGTH: usize = DUC_OFFSET + 0x28;
/// DDR load strobe.
pub const LOAD_STROBE: usize = DUC_OFFSET + 0x2C;
/// DDR load completion flag; nonzero once the load has finished.
pub const LOAD_DONE: usize = DUC_OFFSET + 0x30;

/// Playback mode values.
pub mod playback {
    /// Playback disarmed.
    pub const OFF: u32 = 0;
    /// Play the DDR window once.
    pub const SINGLE: u32 = 1;
    /// Repeat the DDR window.
    pub const CYCLIC: u32 = 2;
}
