//! Audio module - PCM output shared by every backend
//!
//! - `output`: output device/stream traits and their error codes
//! - `sink`: the format-checking PCM sink with cached volume
//! - `cpal_output`: the default cpal-backed device
//! - `convert`: rate and channel conversion to the device layout
//! - `librespot_sink`: adapter plugging the sink into librespot's player

mod convert;
mod cpal_output;
mod librespot_sink;
mod output;
mod sink;

pub use cpal_output::CpalOutput;
pub use librespot_sink::BladeSink;
pub use output::{OutputDevice, OutputError, OutputStream, PlayState, StreamSpec};
pub use sink::{lock_sink, write_all, OutputFormat, PcmSink, SharedSink, SinkError};

#[cfg(test)]
pub(crate) use output::testing;
