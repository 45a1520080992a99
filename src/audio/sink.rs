//! PCM sink between a backend player and the platform audio output

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use super::output::{OutputDevice, OutputError, OutputStream, PlayState, StreamSpec};

/// Layout of the PCM a backend wants to write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl OutputFormat {
    pub fn s16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("BLADE-AUDIO: Unsupported sample size : {0}")]
    UnsupportedSampleSize(u16),

    #[error("BLADE-AUDIO: Only 1 or 2 channels supported (format contains {0})")]
    UnsupportedChannels(u16),

    #[error("BLADE-AUDIO: Audio output creation failed : {0}")]
    OutputCreation(#[source] OutputError),
}

/// Sink shared between a backend and whoever controls its volume
pub type SharedSink = Arc<Mutex<PcmSink>>;

/// Wait between retries while the stream takes nothing
const WRITE_RETRY: Duration = Duration::from_millis(10);

pub fn lock_sink(sink: &SharedSink) -> MutexGuard<'_, PcmSink> {
    sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write all of `pcm`, retrying the remainder while the stream is full or
/// paused. The sink is unlocked between attempts so it can be resumed.
/// `keep_going` is asked before each retry; once it says no, the bytes written
/// so far are returned.
pub fn write_all(sink: &SharedSink, pcm: &[u8], mut keep_going: impl FnMut() -> bool) -> io::Result<usize> {
    let mut written = 0;
    while written < pcm.len() {
        let accepted = lock_sink(sink).write(&pcm[written..])?;
        written += accepted;
        if written == pcm.len() || !keep_going() {
            break;
        }
        if accepted == 0 {
            thread::sleep(WRITE_RETRY);
        }
    }
    Ok(written)
}

/// Streams 16-bit PCM to one output stream at a time.
///
/// The volume is remembered across streams: a volume set while no stream is
/// open is applied to the next one.
pub struct PcmSink {
    device: Arc<dyn OutputDevice>,
    stream: Option<Box<dyn OutputStream>>,
    last_volume: Option<f32>,
}

impl PcmSink {
    pub fn new(device: Arc<dyn OutputDevice>) -> Self {
        Self {
            device,
            stream: None,
            last_volume: None,
        }
    }

    pub fn shared(device: Arc<dyn OutputDevice>) -> SharedSink {
        Arc::new(Mutex::new(Self::new(device)))
    }

    pub fn start(&mut self, format: OutputFormat) -> Result<(), SinkError> {
        if format.bits_per_sample != 16 {
            return Err(SinkError::UnsupportedSampleSize(format.bits_per_sample));
        }
        if !(1..=2).contains(&format.channels) {
            return Err(SinkError::UnsupportedChannels(format.channels));
        }

        self.release();

        let buffer_size_bytes = self.device.min_buffer_size(format.sample_rate, format.channels);
        let spec = StreamSpec {
            sample_rate: format.sample_rate,
            channels: format.channels,
            buffer_size_bytes,
        };
        let mut stream = self.device.open(spec).map_err(SinkError::OutputCreation)?;

        if let Some(volume) = self.last_volume {
            stream.set_volume(volume);
        }
        stream.play();
        tracing::debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            buffer_size_bytes,
            "Audio sink started"
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Queue `pcm` on the open stream. Returns the number of bytes accepted,
    /// which is short of `pcm.len()` when the stream is full and not playing.
    pub fn write(&mut self, pcm: &[u8]) -> io::Result<usize> {
        let stream = self.stream.as_mut().ok_or(OutputError::InvalidOperation)?;
        Ok(stream.write(pcm)?)
    }

    /// Remember `volume` and apply it to the open stream. Returns false when
    /// no stream is open.
    pub fn set_volume(&mut self, volume: f32) -> bool {
        let volume = volume.clamp(0.0, 1.0);
        self.last_volume = Some(volume);
        match self.stream.as_mut() {
            Some(stream) => {
                stream.set_volume(volume);
                true
            }
            None => false,
        }
    }

    pub fn volume(&self) -> Option<f32> {
        self.last_volume
    }

    pub fn pause(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            if stream.play_state() == PlayState::Playing {
                stream.pause();
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            if stream.play_state() != PlayState::Playing {
                stream.play();
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            if stream.play_state() != PlayState::Stopped {
                stream.stop();
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.flush();
        }
    }

    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }

    pub fn close(&mut self) {
        self.stream = None;
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// State of the open stream, `None` without one
    pub fn play_state(&self) -> Option<PlayState> {
        self.stream.as_ref().map(|stream| stream.play_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::testing::{MockDevice, OutputEvent};

    fn sink_with(device: &MockDevice) -> PcmSink {
        PcmSink::new(Arc::new(device.clone()))
    }

    #[test]
    fn only_16_bit_samples_are_accepted() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);

        for bits in [8u16, 24, 32] {
            let err = sink
                .start(OutputFormat {
                    sample_rate: 44_100,
                    channels: 2,
                    bits_per_sample: bits,
                })
                .unwrap_err();
            assert!(matches!(err, SinkError::UnsupportedSampleSize(b) if b == bits));
            assert!(err.to_string().contains(&format!("Unsupported sample size : {}", bits)));
        }
        assert!(device.events().is_empty());
        assert!(!sink.is_active());
    }

    #[test]
    fn only_mono_and_stereo_are_accepted() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);

        for channels in [0u16, 3, 6, 8] {
            let err = sink.start(OutputFormat::s16(48_000, channels)).unwrap_err();
            assert!(matches!(err, SinkError::UnsupportedChannels(c) if c == channels));
        }
        assert!(sink.start(OutputFormat::s16(48_000, 1)).is_ok());
        assert!(sink.start(OutputFormat::s16(48_000, 2)).is_ok());
    }

    #[test]
    fn stream_is_sized_to_the_device_minimum() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);
        sink.start(OutputFormat::s16(44_100, 2)).unwrap();

        assert_eq!(
            device.events()[0],
            OutputEvent::Open(StreamSpec {
                sample_rate: 44_100,
                channels: 2,
                buffer_size_bytes: 4_410 * 2 * 2,
            })
        );
        assert_eq!(device.events()[1], OutputEvent::Play);
    }

    #[test]
    fn volume_set_before_start_is_applied_on_start() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);

        assert!(!sink.set_volume(0.25));
        sink.start(OutputFormat::s16(44_100, 2)).unwrap();

        let events = device.events();
        assert!(matches!(events[0], OutputEvent::Open(_)));
        assert_eq!(events[1], OutputEvent::Volume(0.25));
        assert_eq!(events[2], OutputEvent::Play);
    }

    #[test]
    fn volume_survives_a_new_stream() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);
        sink.start(OutputFormat::s16(44_100, 2)).unwrap();
        assert!(sink.set_volume(0.5));

        sink.start(OutputFormat::s16(22_050, 1)).unwrap();
        let events = device.events();
        let reopened = events.iter().rposition(|e| matches!(e, OutputEvent::Open(_))).unwrap();
        assert_eq!(events[reopened - 1], OutputEvent::Release);
        assert_eq!(events[reopened + 1], OutputEvent::Volume(0.5));
    }

    #[test]
    fn write_failures_become_io_errors() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);
        sink.start(OutputFormat::s16(44_100, 2)).unwrap();
        assert_eq!(sink.write(&[0u8; 8]).unwrap(), 8);
        assert_eq!(device.bytes_written(), 8);

        let cases: [(fn() -> OutputError, io::ErrorKind); 4] = [
            (|| OutputError::Failure, io::ErrorKind::Other),
            (|| OutputError::BadValue, io::ErrorKind::InvalidInput),
            (|| OutputError::DeadObject, io::ErrorKind::BrokenPipe),
            (|| OutputError::InvalidOperation, io::ErrorKind::Other),
        ];
        for (fail, kind) in cases {
            *device.fail_writes_with.lock().unwrap() = Some(fail);
            let err = sink.write(&[0u8; 4]).unwrap_err();
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn write_without_stream_is_invalid() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);
        let err = sink.write(&[0u8; 4]).unwrap_err();
        assert!(err.to_string().contains("write invalid"));
    }

    #[test]
    fn write_all_retries_short_writes() {
        let device = MockDevice::default();
        *device.max_write.lock().unwrap() = Some(4);
        let sink = PcmSink::shared(Arc::new(device.clone()));
        lock_sink(&sink).start(OutputFormat::s16(44_100, 2)).unwrap();

        let written = write_all(&sink, &[0u8; 10], || true).unwrap();
        assert_eq!(written, 10);
        let writes: Vec<_> = device
            .events()
            .into_iter()
            .filter(|e| matches!(e, OutputEvent::Write(_)))
            .collect();
        assert_eq!(writes, vec![OutputEvent::Write(4), OutputEvent::Write(4), OutputEvent::Write(2)]);
    }

    #[test]
    fn write_all_stops_when_told_and_reports_the_count() {
        let device = MockDevice::default();
        *device.max_write.lock().unwrap() = Some(4);
        let sink = PcmSink::shared(Arc::new(device.clone()));
        lock_sink(&sink).start(OutputFormat::s16(44_100, 2)).unwrap();

        let mut retries = 0;
        let written = write_all(&sink, &[0u8; 16], || {
            retries += 1;
            retries < 2
        })
        .unwrap();
        assert_eq!(written, 8);
        assert_eq!(device.bytes_written(), 8);
    }

    #[test]
    fn write_all_waits_for_a_paused_stream() {
        let device = MockDevice::default();
        *device.max_write.lock().unwrap() = Some(0);
        let sink = PcmSink::shared(Arc::new(device.clone()));
        lock_sink(&sink).start(OutputFormat::s16(44_100, 2)).unwrap();

        let mut retries = 0;
        let written = write_all(&sink, &[0u8; 8], || {
            retries += 1;
            if retries == 3 {
                *device.max_write.lock().unwrap() = None;
            }
            true
        })
        .unwrap();
        assert_eq!(written, 8);
        assert_eq!(retries, 3);
        assert_eq!(lock_sink(&sink).play_state(), Some(PlayState::Playing));
    }

    #[test]
    fn failed_device_open_is_a_start_error() {
        let device = MockDevice {
            fail_open: true,
            ..MockDevice::default()
        };
        let mut sink = sink_with(&device);
        let err = sink.start(OutputFormat::s16(44_100, 2)).unwrap_err();
        assert!(matches!(err, SinkError::OutputCreation(_)));
    }

    #[test]
    fn controls_are_noops_without_stream() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);
        sink.stop();
        sink.flush();
        sink.release();
        sink.pause();
        sink.close();
        assert!(device.events().is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let device = MockDevice::default();
        let mut sink = sink_with(&device);
        sink.start(OutputFormat::s16(44_100, 2)).unwrap();
        sink.stop();
        sink.stop();

        let stops = device.events().iter().filter(|e| **e == OutputEvent::Stop).count();
        assert_eq!(stops, 1);
    }
}
