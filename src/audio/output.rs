//! Platform audio output abstraction
//!
//! A device hands out PCM streams. Streams accept interleaved signed 16-bit
//! little-endian samples in streaming mode.

use std::io;
use thiserror::Error;

/// Parameters of a stream opened on an output device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size_bytes: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Paused,
    Playing,
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("audio output write failure")]
    Failure,
    #[error("invalid value used to write audio output")]
    BadValue,
    #[error("audio output died before write")]
    DeadObject,
    #[error("audio output write invalid")]
    InvalidOperation,
    #[error("{0}")]
    Unavailable(String),
}

impl From<OutputError> for io::Error {
    fn from(err: OutputError) -> Self {
        let kind = match err {
            OutputError::BadValue => io::ErrorKind::InvalidInput,
            OutputError::DeadObject => io::ErrorKind::BrokenPipe,
            OutputError::Unavailable(_) => io::ErrorKind::NotConnected,
            OutputError::Failure | OutputError::InvalidOperation => io::ErrorKind::Other,
        };
        io::Error::new(kind, format!("BLADE-AUDIO: {}", err))
    }
}

pub trait OutputStream: Send {
    /// Queue PCM bytes. Returns the number of bytes accepted.
    fn write(&mut self, pcm: &[u8]) -> Result<usize, OutputError>;
    fn set_volume(&mut self, volume: f32);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn flush(&mut self);
    fn release(&mut self);
    fn play_state(&self) -> PlayState;
}

pub trait OutputDevice: Send + Sync {
    /// Smallest buffer, in bytes, the device accepts for this layout
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> usize;
    fn open(&self, spec: StreamSpec) -> Result<Box<dyn OutputStream>, OutputError>;
}
