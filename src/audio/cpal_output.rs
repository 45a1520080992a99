//! Default output device backed by cpal
//!
//! cpal streams are not `Send`, so each stream lives on its own audio thread
//! and is driven through a command channel. PCM written by the player is
//! queued in a bounded buffer drained by the cpal callback, which converts it
//! to whatever configuration the device negotiated.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::convert::FrameConverter;
use super::output::{OutputDevice, OutputError, OutputStream, PlayState, StreamSpec};

/// How long the streaming buffer holds, on top of the device minimum
const BUFFER_MILLIS: usize = 500;
const WRITE_WAIT: Duration = Duration::from_millis(50);

pub struct CpalOutput;

impl OutputDevice for CpalOutput {
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> usize {
        // 100 ms of 16-bit audio
        (sample_rate as usize / 10) * channels as usize * 2
    }

    fn open(&self, spec: StreamSpec) -> Result<Box<dyn OutputStream>, OutputError> {
        let stream = CpalStream::open(spec)?;
        Ok(Box::new(stream))
    }
}

enum StreamCommand {
    Play,
    Pause,
    Shutdown,
}

struct SharedBuffer {
    samples: Mutex<VecDeque<i16>>,
    space: Condvar,
    capacity: usize,
    volume: AtomicU32,
    state: AtomicU8,
    dead: AtomicBool,
}

impl SharedBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity,
            volume: AtomicU32::new(1.0f32.to_bits()),
            state: AtomicU8::new(encode_state(PlayState::Stopped)),
            dead: AtomicBool::new(false),
        }
    }

    fn samples(&self) -> MutexGuard<'_, VecDeque<i16>> {
        self.samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> PlayState {
        decode_state(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlayState) {
        self.state.store(encode_state(state), Ordering::Release);
        self.space.notify_all();
    }

    fn fill<T>(&self, converter: &mut FrameConverter, output: &mut [T])
    where
        T: Sample + FromSample<f32>,
    {
        if self.state() != PlayState::Playing {
            output.fill(T::EQUILIBRIUM);
            return;
        }

        let volume = f32::from_bits(self.volume.load(Ordering::Relaxed));
        let mut samples = self.samples();
        converter.render(&mut samples, volume, output);
        drop(samples);
        self.space.notify_all();
    }
}

fn encode_state(state: PlayState) -> u8 {
    match state {
        PlayState::Stopped => 0,
        PlayState::Paused => 1,
        PlayState::Playing => 2,
    }
}

fn decode_state(value: u8) -> PlayState {
    match value {
        2 => PlayState::Playing,
        1 => PlayState::Paused,
        _ => PlayState::Stopped,
    }
}

struct CpalStream {
    shared: Arc<SharedBuffer>,
    commands: Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CpalStream {
    fn open(spec: StreamSpec) -> Result<Self, OutputError> {
        let channels = spec.channels as usize;
        let buffered = spec.sample_rate as usize * channels * BUFFER_MILLIS / 1000;
        let capacity = buffered.max(spec.buffer_size_bytes / 2);
        let shared = Arc::new(SharedBuffer::new(capacity));

        let (command_tx, command_rx) = bounded::<StreamCommand>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), OutputError>>(1);

        let shared_for_thread = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("blade-audio".to_string())
            .spawn(move || Self::audio_thread_run(spec, shared_for_thread, command_rx, ready_tx))
            .map_err(|e| OutputError::Unavailable(format!("cannot spawn audio thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shared,
                commands: command_tx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(OutputError::Unavailable("audio thread exited".to_string())),
        }
    }

    fn audio_thread_run(
        spec: StreamSpec,
        shared: Arc<SharedBuffer>,
        commands: Receiver<StreamCommand>,
        ready: Sender<Result<(), OutputError>>,
    ) {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            let _ = ready.send(Err(OutputError::Unavailable("no output device found".to_string())));
            return;
        };

        let supported = match negotiate(&device, spec) {
            Ok(supported) => supported,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let config = supported.config();
        let converter = FrameConverter::new(spec.sample_rate, spec.channels, config.sample_rate, config.channels);

        let built = match supported.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, &shared, converter),
            SampleFormat::I32 => build_stream::<i32>(&device, &config, &shared, converter),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, &shared, converter),
            SampleFormat::F32 => build_stream::<f32>(&device, &config, &shared, converter),
            other => {
                let message = format!("unsupported device sample format {:?}", other);
                let _ = ready.send(Err(OutputError::Unavailable(message)));
                return;
            }
        };
        let stream = match built {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(OutputError::Unavailable(e.to_string())));
                return;
            }
        };

        if ready.send(Ok(())).is_err() {
            return;
        }
        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            device_rate = config.sample_rate,
            device_channels = config.channels,
            format = ?supported.sample_format(),
            "cpal stream opened"
        );

        while let Ok(command) = commands.recv() {
            match command {
                StreamCommand::Play => {
                    if let Err(e) = stream.play() {
                        tracing::warn!(error = %e, "Failed to start audio stream");
                        shared.dead.store(true, Ordering::Release);
                    }
                }
                StreamCommand::Pause => {
                    if let Err(e) = stream.pause() {
                        tracing::warn!(error = %e, "Failed to pause audio stream");
                    }
                }
                StreamCommand::Shutdown => break,
            }
        }
        drop(stream);
        tracing::trace!("cpal stream closed");
    }

    fn send(&self, command: StreamCommand) {
        if self.commands.send(command).is_err() {
            self.shared.dead.store(true, Ordering::Release);
        }
    }
}

/// Pick the device configuration for `spec`: one matching the track's rate
/// and channel count when the device offers it, the device default otherwise.
fn negotiate(device: &cpal::Device, spec: StreamSpec) -> Result<SupportedStreamConfig, OutputError> {
    let exact = device.supported_output_configs().ok().and_then(|mut ranges| {
        ranges.find(|range| {
            range.channels() == spec.channels
                && range.min_sample_rate() <= spec.sample_rate
                && spec.sample_rate <= range.max_sample_rate()
                && matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32)
        })
    });

    match exact {
        Some(range) => Ok(range.with_sample_rate(spec.sample_rate)),
        None => device
            .default_output_config()
            .map_err(|e| OutputError::Unavailable(e.to_string())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    shared: &Arc<SharedBuffer>,
    mut converter: FrameConverter,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let for_callback = Arc::clone(shared);
    let for_errors = Arc::clone(shared);
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| for_callback.fill(&mut converter, data),
        move |err| {
            tracing::error!(error = %err, "Audio output stream error");
            for_errors.dead.store(true, Ordering::Release);
            for_errors.space.notify_all();
        },
        None,
    )
}

impl OutputStream for CpalStream {
    fn write(&mut self, pcm: &[u8]) -> Result<usize, OutputError> {
        if self.shared.dead.load(Ordering::Acquire) {
            return Err(OutputError::DeadObject);
        }
        if pcm.len() % 2 != 0 {
            return Err(OutputError::BadValue);
        }

        let mut pending = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .peekable();
        let mut written = 0;

        let mut samples = self.shared.samples();
        while pending.peek().is_some() {
            if samples.len() >= self.shared.capacity {
                if self.shared.dead.load(Ordering::Acquire) {
                    return Err(OutputError::DeadObject);
                }
                if self.shared.state() != PlayState::Playing {
                    // Nothing drains a paused stream; the caller retries the rest
                    break;
                }
                samples = self
                    .shared
                    .space
                    .wait_timeout(samples, WRITE_WAIT)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                continue;
            }
            let free = self.shared.capacity - samples.len();
            for sample in pending.by_ref().take(free) {
                samples.push_back(sample);
                written += 2;
            }
        }
        Ok(written)
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared.volume.store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn play(&mut self) {
        self.shared.set_state(PlayState::Playing);
        self.send(StreamCommand::Play);
    }

    fn pause(&mut self) {
        self.shared.set_state(PlayState::Paused);
        self.send(StreamCommand::Pause);
    }

    fn stop(&mut self) {
        self.shared.set_state(PlayState::Stopped);
        self.send(StreamCommand::Pause);
        self.shared.samples().clear();
    }

    fn flush(&mut self) {
        self.shared.samples().clear();
        self.shared.space.notify_all();
    }

    fn release(&mut self) {
        self.shared.set_state(PlayState::Stopped);
        self.shared.dead.store(true, Ordering::Release);
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn play_state(&self) -> PlayState {
        self.shared.state()
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}
