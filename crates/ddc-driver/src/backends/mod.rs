//! Register backends
//!
//! Two backends available:
//! - **Mmap**: volatile access to a mapped UIO node or PCIe resource file
//! - **Software**: in-memory register file with an access log, for CI

pub mod mmap;
pub mod software;

pub use mmap::MmapRegisters;
pub use software::{RegisterAccess, SoftwareRegisters};
