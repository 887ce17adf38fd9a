//! Silicon model for the AXI DDC/DUC channelizer core.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the FPGA image: register addresses, the waveform envelope
//! layout, the span code table and the filter tables the core boots with.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register map: DDC windows, DUC playback block, common, RF, FX3 |
//! | [`envelope`] | Waveform upload envelope: markers, header offsets, capacities |
//! | [`span`] | Bandwidth ↔ span code table |
//! | [`coefficients`] | Default halfband and polyphase tables, section caps |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod coefficients;
pub mod envelope;
pub mod regs;
pub mod span;
