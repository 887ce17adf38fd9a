//! Driver for the AXI DDC/DUC software-defined-radio front-end.
//!
//! The core is provisioned entirely through 32-bit register writes:
//!
//! - **Coefficient profiles**: ASCII tagged text parsed into halfband and
//!   polyphase FIR tables and written to the DDC coefficient windows.
//! - **Waveform uploads**: an enveloped binary blob streamed chunk by chunk
//!   through the DUC FIFO into DDR, then optionally armed for playback.
//! - **Span**: analysis bandwidth selected by a 4-bit code.
//! - **Raw channels**: temperatures, attenuators, gains, FX3 bridge, power.
//!
//! Both uploads arrive as writes at increasing offsets, the way a binary
//! sysfs attribute is fed, and only touch the hardware once complete.
//!
//! # Backends
//!
//! ```text
//! MmapRegisters      : UIO node or PCIe resource file, volatile MMIO
//! SoftwareRegisters  : in-memory register file with an access log (CI)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ddc_driver::{ClockTopology, DdcDevice, DeviceConfig, DeviceManager, MmapRegisters};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeviceConfig::from_env();
//! let regs = MmapRegisters::open("/dev/uio0", config.map_size)?;
//! let mgr = DeviceManager::init(4, &ClockTopology::new())?;
//! mgr.register(DdcDevice::probe(Arc::new(regs), config))?;
//!
//! let dev = mgr.open_first()?;
//! dev.write_span(b"20000000\n")?;
//! let profile = std::fs::read("custom.profile")?;
//! dev.write_profile(0, &profile)?;
//! print!("{}", dev.read_span());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod buffer;
pub mod channels;
mod config;
mod device;
mod error;
mod manager;
pub mod profile;
mod registers;
mod span;
pub mod topology;
pub mod waveform;

/// Register map and envelope layout (re-exported from ddc-chip).
pub mod chip {
    pub use ddc_chip::{coefficients, envelope, regs, span};
}

pub use backends::{MmapRegisters, RegisterAccess, SoftwareRegisters};
pub use buffer::{Progress, UploadBuffer};
pub use channels::{ChannelKind, RawChannel, RAW_CHANNELS};
pub use config::{parse_size, DeviceConfig, PollBudget, ENV_MAP_SIZE, ENV_RESOURCE, PROFILE_CAPACITY};
pub use device::{DdcDevice, HdlIdent, CHANNEL_PLACEHOLDER};
pub use error::{DdcError, ErrorKind, Result};
pub use manager::{DeviceManager, DeviceRef, DeviceSession};
pub use profile::{CoefficientProfile, ProfileChannel};
pub use registers::{BackendType, RegisterInterface};
pub use span::SpanController;
pub use topology::{ClockEdge, ClockGraph, ClockTopology, PortRef, PortRole};
pub use waveform::{PlaybackConfig, WaveformEnvelope, WaveformSession};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ClockTopology, CoefficientProfile, DdcDevice, DdcError, DeviceConfig, DeviceManager,
        Progress, RegisterInterface, Result, SoftwareRegisters, SpanController, WaveformSession,
    };
}
