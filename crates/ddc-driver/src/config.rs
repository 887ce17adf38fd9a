//! Device configuration
//!
//! Defaults reproduce the fixed values of the FPGA image. The CLI overlays
//! the environment with [`DeviceConfig::from_env`].

use ddc_chip::{envelope, regs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Profile channel capacity in bytes.
pub const PROFILE_CAPACITY: usize = 8192;

/// Environment variable naming the register resource to map.
pub const ENV_RESOURCE: &str = "DDC_RESOURCE";
/// Environment variable overriding the mapping length.
pub const ENV_MAP_SIZE: &str = "DDC_MAP_SIZE";

/// Device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Register resource to map (UIO node or sysfs `resourceN` file)
    pub resource_path: Option<PathBuf>,

    /// Bytes to map from the resource
    pub map_size: usize,

    /// Profile channel capacity
    pub profile_capacity: usize,

    /// Waveform channel capacity
    pub waveform_capacity: usize,

    /// Bounded completion poll
    pub poll: PollBudget,

    /// Start marker expected at offset 0 of a waveform upload
    pub start_marker: u32,

    /// End marker expected after the payload
    pub end_marker: u32,
}

/// Completion poll budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    /// Polls before giving up
    pub attempts: u32,

    /// Delay between polls
    pub interval: Duration,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(1),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            resource_path: None,
            map_size: regs::REGION_SIZE,
            profile_capacity: PROFILE_CAPACITY,
            waveform_capacity: envelope::WAVEFORM_CAPACITY,
            poll: PollBudget::default(),
            start_marker: envelope::START_MARKER,
            end_marker: envelope::END_MARKER,
        }
    }
}

impl DeviceConfig {
    /// Defaults overlaid with `DDC_RESOURCE` and `DDC_MAP_SIZE`.
    ///
    /// An unparseable `DDC_MAP_SIZE` is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(ENV_RESOURCE) {
            debug!("{ENV_RESOURCE}={path}");
            config.resource_path = Some(PathBuf::from(path));
        }

        if let Ok(raw) = std::env::var(ENV_MAP_SIZE) {
            match parse_size(&raw) {
                Some(size) => config.map_size = size,
                None => warn!("Ignoring {ENV_MAP_SIZE}={raw:?}: not a size"),
            }
        }

        config
    }

    /// Use a specific register resource
    #[must_use]
    pub fn with_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    /// Use a specific poll budget
    #[must_use]
    pub const fn with_poll(mut self, poll: PollBudget) -> Self {
        self.poll = poll;
        self
    }

    /// Use specific envelope markers
    #[must_use]
    pub const fn with_markers(mut self, start: u32, end: u32) -> Self {
        self.start_marker = start;
        self.end_marker = end;
        self
    }
}

/// Parse a size or register value: `0x`-prefixed hex or decimal.
#[must_use]
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
