//! Playback status machine and position tracking

use std::time::Instant;

/// Where playback stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
    Ended,
}

/// Something that happened to playback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Load,
    Started,
    Pause,
    Resume,
    End,
    Stop,
}

impl PlaybackStatus {
    /// Apply `transition`. Transitions that make no sense from the current
    /// status (a late "started" after a stop, say) leave it unchanged.
    pub fn on(self, transition: Transition) -> Self {
        use PlaybackStatus::*;
        match (self, transition) {
            (_, Transition::Load) => Loading,
            (_, Transition::Stop) => Stopped,
            (Loading | Playing | Paused, Transition::Started) => Playing,
            (Loading | Playing, Transition::Pause) => Paused,
            (Paused, Transition::Resume) => Playing,
            (Loading | Playing | Paused, Transition::End) => Ended,
            (status, _) => status,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackStatus::Loading | PlaybackStatus::Playing)
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackStatus::Stopped => "Stopped",
            PlaybackStatus::Loading => "Loading",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Ended => "Ended",
        }
    }
}

/// Position reported by a backend, extrapolated while playing
#[derive(Clone, Debug)]
pub struct PlaybackTiming {
    pub position_ms: u64,
    pub last_update: Instant,
    pub is_playing: bool,
    pub duration_ms: u64,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            position_ms: 0,
            last_update: Instant::now(),
            is_playing: false,
            duration_ms: 0,
        }
    }
}

impl PlaybackTiming {
    pub fn current_position_ms(&self) -> u64 {
        if self.is_playing && self.duration_ms > 0 {
            let elapsed = self.last_update.elapsed().as_millis() as u64;
            self.position_ms.saturating_add(elapsed).min(self.duration_ms)
        } else {
            self.position_ms
        }
    }

    pub fn update_position(&mut self, position_ms: u64, is_playing: bool) {
        self.position_ms = position_ms;
        self.last_update = Instant::now();
        self.is_playing = is_playing;
    }

    /// Freeze the extrapolated position, e.g. on pause
    pub fn set_playing(&mut self, is_playing: bool) {
        self.position_ms = self.current_position_ms();
        self.last_update = Instant::now();
        self.is_playing = is_playing;
    }

    pub fn reset(&mut self, duration_ms: u64) {
        *self = Self {
            duration_ms,
            ..Self::default()
        };
    }
}
