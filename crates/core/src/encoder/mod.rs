//! Encode command construction and host capability detection.
//!
//! [`CapabilitySnapshot::detect`] runs once per batch; the resulting snapshot
//! is handed to [`EncodeCommandBuilder`] for every file, which decides between
//! the VideoToolbox and software encoder profiles.

mod capabilities;
mod codec;
mod command;
mod config;

pub use capabilities::CapabilitySnapshot;
pub use codec::{OutputCodec, OutputFormat};
pub use command::{
    filter_graph, EncodeCommand, EncodeCommandBuilder, SpotlightInputs, TwoPassCommand,
    NULL_DEVICE,
};
pub use config::{EncodeSettings, HardwareConfig};
