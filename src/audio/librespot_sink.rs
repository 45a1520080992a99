//! librespot sink writing into a Blade [`PcmSink`]

use librespot::playback::audio_backend::{Sink, SinkError as LibrespotSinkError, SinkResult};
use librespot::playback::convert::Converter;
use librespot::playback::decoder::AudioPacket;
use librespot::playback::{NUM_CHANNELS, SAMPLE_RATE};

use super::output::PlayState;
use super::sink::{lock_sink, write_all, OutputFormat, SharedSink, SinkError};

/// Hands librespot's decoded audio to the shared Blade sink as 16-bit PCM
pub struct BladeSink {
    sink: SharedSink,
    format: OutputFormat,
}

impl BladeSink {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            format: OutputFormat::s16(SAMPLE_RATE, NUM_CHANNELS as u16),
        }
    }
}

impl Sink for BladeSink {
    fn start(&mut self) -> SinkResult<()> {
        lock_sink(&self.sink).start(self.format).map_err(|e| match e {
            SinkError::OutputCreation(_) => LibrespotSinkError::ConnectionRefused(e.to_string()),
            _ => LibrespotSinkError::InvalidParams(e.to_string()),
        })
    }

    fn stop(&mut self) -> SinkResult<()> {
        let mut sink = lock_sink(&self.sink);
        sink.stop();
        sink.flush();
        Ok(())
    }

    fn write(&mut self, packet: AudioPacket, converter: &mut Converter) -> SinkResult<()> {
        let samples = packet
            .samples()
            .map_err(|e| LibrespotSinkError::OnWrite(e.to_string()))?;
        let pcm: Vec<u8> = converter
            .f64_to_s16(samples)
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect();

        // A paused stream resumes later; a stopped or released one never drains
        let sink = &self.sink;
        let written = write_all(sink, &pcm, || {
            matches!(lock_sink(sink).play_state(), Some(PlayState::Playing | PlayState::Paused))
        })
        .map_err(|e| LibrespotSinkError::OnWrite(e.to_string()))?;
        if written < pcm.len() {
            tracing::debug!(dropped = pcm.len() - written, "Audio stream stopped mid-packet");
        }
        Ok(())
    }
}
