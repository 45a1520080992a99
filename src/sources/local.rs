//! Local file player
//!
//! Each `play_song` spawns a decoder thread that feeds 16-bit PCM to the
//! player's own sink. A newer `play_song` supersedes the running decoder;
//! superseded decoders exit without posting anything. The decoder generation
//! doubles as the load id on posted events.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::audio::{lock_sink, write_all, OutputFormat, SharedSink};
use crate::library::{Song, SourceKind};
use crate::player::{PlayerEvent, PlayerEventKind, PlayerEventSender, SourcePlayer};

const PAUSE_POLL: Duration = Duration::from_millis(20);

/// State shared with the decoder thread
#[derive(Default)]
struct DecodeState {
    generation: AtomicU64,
    /// A decoder for the current generation is running
    active: AtomicBool,
    paused: AtomicBool,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    seek_request: Mutex<Option<u64>>,
}

impl DecodeState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn take_seek(&self) -> Option<u64> {
        self.seek_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn has_seek(&self) -> bool {
        self.seek_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    fn halt(&self) {
        self.paused.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
    }
}

pub struct LocalPlayer {
    music_dir: PathBuf,
    sink: SharedSink,
    events: PlayerEventSender,
    state: Arc<DecodeState>,
}

impl LocalPlayer {
    pub fn new(music_dir: impl Into<PathBuf>, sink: SharedSink, events: PlayerEventSender) -> Self {
        let state = DecodeState::default();
        state.paused.store(true, Ordering::Release);
        Self {
            music_dir: music_dir.into(),
            sink,
            events,
            state: Arc::new(state),
        }
    }

    fn resolve(&self, id: &str) -> PathBuf {
        let path = Path::new(id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.music_dir.join(path)
        }
    }
}

impl SourcePlayer for LocalPlayer {
    fn source(&self) -> SourceKind {
        SourceKind::Local
    }

    fn play(&mut self) {
        if !self.state.active.load(Ordering::Acquire) {
            return;
        }
        self.state.paused.store(false, Ordering::Release);
        lock_sink(&self.sink).resume();
    }

    fn pause(&mut self) {
        self.state.paused.store(true, Ordering::Release);
        lock_sink(&self.sink).pause();
    }

    fn play_song(&mut self, song: &Song) {
        let Some(id) = song.source_id(SourceKind::Local) else {
            tracing::debug!(song = %song.title, "Song has no local file");
            return;
        };
        let path = self.resolve(id);

        let generation = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.paused.store(false, Ordering::Release);
        self.state.position_ms.store(0, Ordering::Release);
        self.state.duration_ms.store(song.duration_ms.unwrap_or(0) as u64, Ordering::Release);
        self.state.take_seek();
        self.state.active.store(true, Ordering::Release);

        let job = DecodeJob {
            path,
            generation,
            state: Arc::clone(&self.state),
            sink: Arc::clone(&self.sink),
            events: self.events.clone(),
        };
        if let Err(e) = thread::Builder::new()
            .name("blade-decoder".to_string())
            .spawn(move || job.run())
        {
            tracing::error!(error = %e, "Failed to spawn decoder thread");
            self.state.halt();
            self.events.send(PlayerEvent::new(
                SourceKind::Local,
                generation,
                PlayerEventKind::Failed(format!("cannot start decoder: {}", e)),
            ));
        }
    }

    fn seek_to(&mut self, millis: u64) {
        if !self.state.active.load(Ordering::Acquire) {
            return;
        }
        *self
            .state
            .seek_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(millis);
    }

    fn current_position(&self) -> u64 {
        self.state.position_ms.load(Ordering::Acquire)
    }

    fn duration(&self) -> u64 {
        self.state.duration_ms.load(Ordering::Acquire)
    }

    fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::Acquire)
    }

    fn set_volume(&mut self, volume: f32) {
        lock_sink(&self.sink).set_volume(volume);
    }

    fn load_id(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }
}

struct OpenTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    n_frames: Option<u64>,
}

fn open_track(path: &Path) -> anyhow::Result<OpenTrack> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no audio track"))?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("unknown sample rate"))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;
    let n_frames = track.codec_params.n_frames;

    let decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    Ok(OpenTrack {
        format,
        decoder,
        track_id,
        sample_rate,
        channels,
        n_frames,
    })
}

struct DecodeJob {
    path: PathBuf,
    generation: u64,
    state: Arc<DecodeState>,
    sink: SharedSink,
    events: PlayerEventSender,
}

enum DecodeOutcome {
    Finished,
    Superseded,
    Failed(String),
}

impl DecodeJob {
    fn post(&self, kind: PlayerEventKind) {
        self.events.send(PlayerEvent::new(SourceKind::Local, self.generation, kind));
    }

    /// Stop this load and report why, unless a newer load took over
    fn fail(&self, message: String) {
        if self.state.is_current(self.generation) {
            self.state.halt();
            self.post(PlayerEventKind::Failed(message));
        }
    }

    fn run(self) {
        let mut track = match open_track(&self.path) {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot play local file");
                self.fail(format!("cannot open {}: {}", self.path.display(), e));
                return;
            }
        };

        if !self.state.is_current(self.generation) {
            return;
        }
        if let Some(frames) = track.n_frames {
            let duration_ms = frames * 1000 / track.sample_rate as u64;
            self.state.duration_ms.store(duration_ms, Ordering::Release);
        }
        if let Err(e) = lock_sink(&self.sink).start(OutputFormat::s16(track.sample_rate, track.channels)) {
            tracing::error!(path = %self.path.display(), error = %e, "Cannot start audio sink");
            self.fail(e.to_string());
            return;
        }

        tracing::debug!(
            path = %self.path.display(),
            sample_rate = track.sample_rate,
            channels = track.channels,
            "Decoding local file"
        );
        self.post(PlayerEventKind::Started);

        match self.decode(&mut track) {
            DecodeOutcome::Finished => {
                if self.state.is_current(self.generation) {
                    tracing::debug!(path = %self.path.display(), "Local file finished");
                    self.state.halt();
                    self.post(PlayerEventKind::TrackEnded);
                }
            }
            DecodeOutcome::Superseded => {}
            DecodeOutcome::Failed(message) => self.fail(message),
        }
    }

    fn decode(&self, track: &mut OpenTrack) -> DecodeOutcome {
        let rate = track.sample_rate as u64;
        let frame_bytes = 2 * track.channels.max(1) as u64;
        let mut frames_written: u64 = 0;
        let mut samples: Option<SampleBuffer<i16>> = None;

        loop {
            if !self.state.is_current(self.generation) {
                return DecodeOutcome::Superseded;
            }

            if let Some(millis) = self.state.take_seek() {
                let time = Time::new(millis / 1000, (millis % 1000) as f64 / 1000.0);
                match track.format.seek(
                    SeekMode::Accurate,
                    SeekTo::Time {
                        time,
                        track_id: Some(track.track_id),
                    },
                ) {
                    Ok(_) => {
                        track.decoder.reset();
                        lock_sink(&self.sink).flush();
                        frames_written = millis * rate / 1000;
                        self.state.position_ms.store(millis, Ordering::Release);
                    }
                    Err(e) => tracing::warn!(millis, error = %e, "Seek failed"),
                }
            }

            if self.state.paused.load(Ordering::Acquire) {
                thread::sleep(PAUSE_POLL);
                continue;
            }

            let packet = match track.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return DecodeOutcome::Finished;
                }
                Err(SymphoniaError::ResetRequired) => return DecodeOutcome::Finished,
                Err(e) => return DecodeOutcome::Failed(e.to_string()),
            };
            if packet.track_id() != track.track_id {
                continue;
            }

            let decoded = match track.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!(error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return DecodeOutcome::Failed(e.to_string()),
            };

            let needed = decoded.capacity() * decoded.spec().channels.count();
            if samples.as_ref().is_none_or(|buffer| buffer.capacity() < needed) {
                samples = Some(SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec()));
            }
            let Some(buffer) = samples.as_mut() else { continue };
            buffer.copy_interleaved_ref(decoded);
            let pcm: Vec<u8> = buffer.samples().iter().flat_map(|s| s.to_le_bytes()).collect();

            if !self.state.is_current(self.generation) {
                return DecodeOutcome::Superseded;
            }
            // A pending seek or a newer load abandons the rest of the packet
            let written = match write_all(&self.sink, &pcm, || {
                self.state.is_current(self.generation) && !self.state.has_seek()
            }) {
                Ok(written) => written as u64,
                Err(e) => {
                    tracing::error!(error = %e, "Audio write failed");
                    return DecodeOutcome::Failed(e.to_string());
                }
            };

            frames_written += written / frame_bytes;
            self.state.position_ms.store(frames_written * 1000 / rate, Ordering::Release);
        }
    }
}
