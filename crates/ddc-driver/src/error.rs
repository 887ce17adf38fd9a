//! Error types for DDC driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DDC operations
pub type Result<T> = std::result::Result<T, DdcError>;

/// Errors that can occur during DDC operations
#[derive(Debug, Error)]
pub enum DdcError {
    /// Bad length, count, offset or marker in an upload or request
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason for rejection
        reason: String,
    },

    /// Profile line that is neither a marker nor a hex coefficient
    #[error("Malformed profile entry: {line:?}")]
    Malformed {
        /// Offending line, leading whitespace stripped
        line: String,
    },

    /// Completion flag never observed within the poll budget
    #[error("Hardware timeout: register {register:#x} still clear after {attempts} polls")]
    HardwareTimeout {
        /// Polled register
        register: usize,
        /// Number of polls performed
        attempts: u32,
    },

    /// Upload buffer could not grow
    #[error("Out of memory: cannot reserve {requested} bytes")]
    OutOfMemory {
        /// Bytes requested
        requested: usize,
    },

    /// No live device with this identifier
    #[error("Device not found: ddc:{id}")]
    DeviceNotFound {
        /// Device identifier
        id: usize,
    },

    /// Device already opened exclusively
    #[error("Device busy: ddc:{id}")]
    DeviceBusy {
        /// Device identifier
        id: usize,
    },

    /// Every device identifier is in use
    #[error("Device registry full ({capacity} devices)")]
    RegistryFull {
        /// Registry capacity
        capacity: usize,
    },

    /// Register resource could not be mapped
    #[error("Cannot map registers from {path}: {reason}")]
    Mapping {
        /// Resource path
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

/// Failure class, for callers that branch on the kind of error rather than
/// its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input
    InvalidArgument,
    /// Unparseable coefficient line
    Malformed,
    /// Handshake never completed
    HardwareTimeout,
    /// Allocation failure
    OutOfMemory,
    /// Registry, lifetime or mapping failure
    Device,
    /// Operating-system I/O failure
    Io,
}

impl DdcError {
    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a malformed profile entry error
    pub fn malformed(line: impl Into<String>) -> Self {
        Self::Malformed { line: line.into() }
    }

    /// Create a mapping error
    pub fn mapping(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Failure class of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Malformed { .. } => ErrorKind::Malformed,
            Self::HardwareTimeout { .. } => ErrorKind::HardwareTimeout,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::DeviceNotFound { .. }
            | Self::DeviceBusy { .. }
            | Self::RegistryFull { .. }
            | Self::Mapping { .. } => ErrorKind::Device,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(DdcError::malformed("zz").kind(), ErrorKind::Malformed);
        assert_eq!(
            DdcError::HardwareTimeout { register: 0x15_0030, attempts: 10 }.kind(),
            ErrorKind::HardwareTimeout
        );
        assert_eq!(DdcError::DeviceBusy { id: 0 }.kind(), ErrorKind::Device);
    }

    #[test]
    fn messages_carry_context() {
        let e = DdcError::HardwareTimeout { register: 0x15_0030, attempts: 10 };
        assert_eq!(
            e.to_string(),
            "Hardware timeout: register 0x150030 still clear after 10 polls"
        );
        assert!(DdcError::invalid_argument("payload length 6")
            .to_string()
            .contains("payload length 6"));
    }
}
