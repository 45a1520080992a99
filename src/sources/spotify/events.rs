//! Translation of librespot player events into Blade player events

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use librespot::playback::player::{Player, PlayerEvent as LibrespotEvent, PlayerEventChannel};

use crate::library::SourceKind;
use crate::player::{PlaybackTiming, PlayerEvent, PlayerEventKind, PlayerEventSender};

/// The subset of librespot events the Spotify player reacts to
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BackendEvent {
    Playing { position_ms: u32 },
    Paused { position_ms: u32 },
    Seeked { position_ms: u32 },
    PositionChanged { position_ms: u32 },
    TrackChanged { name: String, duration_ms: u32 },
    EndOfTrack,
    Stopped,
    Unavailable,
}

impl BackendEvent {
    pub(crate) fn from_librespot(event: &LibrespotEvent) -> Option<Self> {
        let event = match event {
            LibrespotEvent::Playing { position_ms, .. } => Self::Playing { position_ms: *position_ms },
            LibrespotEvent::Paused { position_ms, .. } => Self::Paused { position_ms: *position_ms },
            LibrespotEvent::Seeked { position_ms, .. } => Self::Seeked { position_ms: *position_ms },
            LibrespotEvent::PositionChanged { position_ms, .. } => {
                Self::PositionChanged { position_ms: *position_ms }
            }
            LibrespotEvent::TrackChanged { audio_item } => Self::TrackChanged {
                name: audio_item.name.clone(),
                duration_ms: audio_item.duration_ms,
            },
            LibrespotEvent::EndOfTrack { .. } => Self::EndOfTrack,
            LibrespotEvent::Stopped { .. } => Self::Stopped,
            LibrespotEvent::Unavailable { .. } => Self::Unavailable,
            _ => return None,
        };
        Some(event)
    }
}

/// What to do after a backend event
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Reaction {
    pub post: Option<PlayerEvent>,
    pub pause_backend: bool,
}

impl Reaction {
    fn post(event: PlayerEvent) -> Self {
        Self {
            post: Some(event),
            pause_backend: false,
        }
    }
}

/// Playback state of the Spotify player as seen through its events
#[derive(Debug, Default)]
pub(crate) struct SpotifyState {
    pub timing: PlaybackTiming,
    pub paused: bool,
    started: bool,
    track_changes: u32,
    ended: bool,
    /// Incremented on every `on_load`; tags posted events
    load: u64,
}

pub(crate) type SharedState = Arc<Mutex<SpotifyState>>;

pub(crate) fn lock_state(state: &SharedState) -> MutexGuard<'_, SpotifyState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SpotifyState {
    /// A new track was handed to librespot
    pub fn on_load(&mut self, duration_ms: u64) {
        self.timing.reset(duration_ms);
        self.paused = false;
        self.started = false;
        self.track_changes = 0;
        self.ended = false;
        self.load += 1;
    }

    pub fn load(&self) -> u64 {
        self.load
    }

    fn event(&self, kind: PlayerEventKind) -> PlayerEvent {
        PlayerEvent::new(SourceKind::Spotify, self.load, kind)
    }

    /// The current load could not be handed to librespot
    pub fn fail(&mut self, message: String) -> PlayerEvent {
        self.paused = true;
        self.ended = true;
        self.timing.set_playing(false);
        self.event(PlayerEventKind::Failed(message))
    }

    fn end(&mut self) -> Option<PlayerEvent> {
        if self.ended {
            return None;
        }
        self.ended = true;
        self.paused = true;
        self.timing.set_playing(false);
        Some(self.event(PlayerEventKind::TrackEnded))
    }

    pub fn apply(&mut self, event: BackendEvent) -> Reaction {
        match event {
            BackendEvent::Playing { position_ms } => {
                self.timing.update_position(position_ms as u64, true);
                self.paused = false;
                if self.started {
                    Reaction::post(self.event(PlayerEventKind::Resumed))
                } else {
                    self.started = true;
                    Reaction::post(self.event(PlayerEventKind::Started))
                }
            }
            BackendEvent::Paused { position_ms } => {
                self.timing.update_position(position_ms as u64, false);
                self.paused = true;
                Reaction::post(self.event(PlayerEventKind::Paused))
            }
            BackendEvent::Seeked { position_ms } | BackendEvent::PositionChanged { position_ms } => {
                let is_playing = self.timing.is_playing;
                self.timing.update_position(position_ms as u64, is_playing);
                Reaction::default()
            }
            BackendEvent::TrackChanged { name, duration_ms } => {
                self.track_changes += 1;
                if self.track_changes > 1 {
                    tracing::debug!(track = %name, "librespot moved past the loaded track");
                    Reaction {
                        pause_backend: true,
                        post: self.end(),
                    }
                } else {
                    tracing::info!(track = %name, duration_ms, "Spotify track loaded");
                    self.timing.duration_ms = duration_ms as u64;
                    Reaction::default()
                }
            }
            BackendEvent::EndOfTrack => Reaction {
                post: self.end(),
                pause_backend: false,
            },
            BackendEvent::Stopped => {
                self.timing.update_position(0, false);
                self.paused = true;
                Reaction::default()
            }
            BackendEvent::Unavailable => {
                self.paused = true;
                Reaction::post(self.event(PlayerEventKind::Failed(
                    "track unavailable on Spotify".to_string(),
                )))
            }
        }
    }
}

/// Forward librespot events until the channel closes or the service is gone
pub(crate) async fn forward_events(
    mut channel: PlayerEventChannel,
    state: SharedState,
    player: Weak<Player>,
    events: PlayerEventSender,
) {
    tracing::info!("Starting librespot player event listener");
    while let Some(event) = channel.recv().await {
        let Some(event) = BackendEvent::from_librespot(&event) else {
            tracing::trace!("PlayerEvent: other event received");
            continue;
        };
        tracing::trace!(?event, "librespot event");

        let reaction = lock_state(&state).apply(event);
        if reaction.pause_backend {
            if let Some(player) = player.upgrade() {
                player.pause();
            }
        }
        if let Some(event) = reaction.post {
            if !events.send(event) {
                break;
            }
        }
    }
    tracing::debug!("librespot player event listener stopped");
}
