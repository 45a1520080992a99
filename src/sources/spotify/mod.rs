//! Spotify source player backed by librespot
//!
//! - `events`: librespot event translation and position tracking
//! - `client`: Web API client used to import the user's library

mod client;
mod events;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use librespot::core::authentication::Credentials;
use librespot::core::config::SessionConfig;
use librespot::core::session::Session;
use librespot::core::SpotifyUri;
use librespot::playback::audio_backend::Sink;
use librespot::playback::config::{Bitrate, PlayerConfig};
use librespot::playback::mixer::NoOpVolume;
use librespot::playback::player::Player;

use crate::audio::{lock_sink, BladeSink, SharedSink};
use crate::library::{Song, SourceKind};
use crate::player::{PlayerEventSender, SourcePlayer};
use events::{forward_events, lock_state, SharedState};

pub use client::SpotifyClient;

/// Rendering of a track id understood by librespot
pub fn spotify_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

pub fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Name this player shows up as
pub fn device_name(host: &str) -> String {
    format!("Blade ({})", host)
}

fn device_id(host: &str) -> String {
    format!("blade-{}", host)
}

pub fn bitrate(kbps: u16) -> Bitrate {
    match kbps {
        0..=96 => Bitrate::Bitrate96,
        97..=160 => Bitrate::Bitrate160,
        _ => Bitrate::Bitrate320,
    }
}

/// Non-reentrant flag: only one login may be in flight
#[derive(Debug, Default)]
pub struct LoginGuard {
    in_flight: AtomicBool,
}

/// Held for the duration of a login attempt
pub struct LoginTicket<'a> {
    guard: &'a LoginGuard,
}

impl LoginGuard {
    pub fn try_begin(&self) -> Option<LoginTicket<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoginTicket { guard: self })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Drop for LoginTicket<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

struct SessionInner {
    device_name: String,
    host: String,
    guard: LoginGuard,
    session: Mutex<Option<Session>>,
}

/// Logged-in librespot session, shared between the player and whoever logs in
#[derive(Clone)]
pub struct SpotifySession {
    inner: Arc<SessionInner>,
}

impl SpotifySession {
    pub fn new(device_name: Option<String>) -> Self {
        let host = host_name();
        Self {
            inner: Arc::new(SessionInner {
                device_name: device_name.unwrap_or_else(|| self::device_name(&host)),
                host,
                guard: LoginGuard::default(),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.inner.device_name
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.inner.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> Option<Session> {
        self.slot().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.slot().is_some()
    }

    /// Connect a new session with `credentials`. Returns false when another
    /// login is already in flight or the connection fails.
    pub async fn login(&self, credentials: Credentials) -> bool {
        let Some(_ticket) = self.inner.guard.try_begin() else {
            tracing::warn!("Spotify login already in progress");
            return false;
        };

        tracing::info!(device = %self.inner.device_name, "Connecting to Spotify with librespot");
        let config = SessionConfig {
            device_id: device_id(&self.inner.host),
            ..Default::default()
        };
        // No cache: credentials and audio files are not stored
        let session = Session::new(config, None);

        match session.connect(credentials, false).await {
            Ok(()) => {
                tracing::info!(user = %session.username(), "Spotify session connected");
                *self.slot() = Some(session);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Spotify login failed");
                false
            }
        }
    }
}

pub struct SpotifyPlayer {
    session: SpotifySession,
    bitrate: Bitrate,
    sink: SharedSink,
    events: PlayerEventSender,
    player: Option<Arc<Player>>,
    state: SharedState,
}

impl SpotifyPlayer {
    pub fn new(session: SpotifySession, bitrate: Bitrate, sink: SharedSink, events: PlayerEventSender) -> Self {
        Self {
            session,
            bitrate,
            sink,
            events,
            player: None,
            state: SharedState::default(),
        }
    }

    /// Create the librespot player and start translating its events.
    /// Returns false without a logged-in session.
    pub fn init(&mut self) -> bool {
        let Some(session) = self.session.current() else {
            tracing::debug!("Spotify is not logged in");
            return false;
        };

        let config = PlayerConfig {
            bitrate: self.bitrate,
            ..Default::default()
        };
        let sink = Arc::clone(&self.sink);
        let player = Player::new(config, session, Box::new(NoOpVolume), move || {
            Box::new(BladeSink::new(sink)) as Box<dyn Sink>
        });

        let channel = player.get_player_event_channel();
        tokio::spawn(forward_events(
            channel,
            Arc::clone(&self.state),
            Arc::downgrade(&player),
            self.events.clone(),
        ));

        tracing::debug!("librespot player created");
        self.player = Some(player);
        true
    }

    fn fail(&self, message: String) {
        let event = lock_state(&self.state).fail(message);
        self.events.send(event);
    }

    /// The librespot player, re-created when missing or invalid
    fn ensure_player(&mut self) -> Option<Arc<Player>> {
        let usable = self.player.as_ref().is_some_and(|p| !p.is_invalid());
        if !usable && !self.init() {
            return None;
        }
        self.player.clone()
    }
}

impl SourcePlayer for SpotifyPlayer {
    fn source(&self) -> SourceKind {
        SourceKind::Spotify
    }

    fn play(&mut self) {
        if let Some(player) = self.ensure_player() {
            player.play();
        }
    }

    fn pause(&mut self) {
        if let Some(player) = self.ensure_player() {
            player.pause();
        }
    }

    fn play_song(&mut self, song: &Song) {
        let Some(id) = song.source_id(SourceKind::Spotify) else {
            tracing::debug!(song = %song.title, "Song is not on Spotify");
            return;
        };
        lock_state(&self.state).on_load(song.duration_ms.unwrap_or(0) as u64);

        let uri = spotify_uri(id);
        let track = match SpotifyUri::from_uri(&uri) {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "Invalid Spotify track id");
                self.fail(format!("invalid Spotify track {}: {}", uri, e));
                return;
            }
        };
        let Some(player) = self.ensure_player() else {
            self.fail("Spotify is not logged in".to_string());
            return;
        };

        tracing::debug!(uri = %uri, "Loading Spotify track");
        player.load(track, true, 0);
    }

    fn seek_to(&mut self, millis: u64) {
        if let Some(player) = self.player.as_ref() {
            player.seek(millis.min(u32::MAX as u64) as u32);
        }
    }

    fn current_position(&self) -> u64 {
        if self.player.is_none() {
            return 0;
        }
        lock_state(&self.state).timing.current_position_ms()
    }

    fn duration(&self) -> u64 {
        if self.player.is_none() {
            return 0;
        }
        lock_state(&self.state).timing.duration_ms
    }

    fn is_paused(&self) -> bool {
        self.player.is_some() && lock_state(&self.state).paused
    }

    fn set_volume(&mut self, volume: f32) {
        lock_sink(&self.sink).set_volume(volume);
    }

    fn load_id(&self) -> u64 {
        lock_state(&self.state).load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::MockDevice;
    use crate::audio::PcmSink;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::player::{PlayerEvent, PlayerEventKind, ServiceCommand, ServiceHandle};

    fn player() -> (SpotifyPlayer, UnboundedReceiver<ServiceCommand>) {
        let (handle, rx) = ServiceHandle::new();
        let sink = PcmSink::shared(Arc::new(MockDevice::default()));
        let player = SpotifyPlayer::new(SpotifySession::new(None), Bitrate::Bitrate320, sink, handle.event_sender());
        (player, rx)
    }

    fn posted(rx: &mut UnboundedReceiver<ServiceCommand>) -> Option<PlayerEvent> {
        match rx.try_recv() {
            Ok(ServiceCommand::PlayerEvent(event)) => Some(event),
            _ => None,
        }
    }

    #[test]
    fn track_ids_become_librespot_uris() {
        assert_eq!(spotify_uri("4uLU6hMCjMI75M1A2tKUQC"), "spotify:track:4uLU6hMCjMI75M1A2tKUQC");
    }

    #[test]
    fn device_is_named_after_the_host() {
        assert_eq!(device_name("studio"), "Blade (studio)");
        assert_eq!(SpotifySession::new(Some("Kitchen".into())).device_name(), "Kitchen");
    }

    #[test]
    fn bitrates_round_up_to_what_spotify_serves() {
        assert!(matches!(bitrate(96), Bitrate::Bitrate96));
        assert!(matches!(bitrate(160), Bitrate::Bitrate160));
        assert!(matches!(bitrate(320), Bitrate::Bitrate320));
        assert!(matches!(bitrate(256), Bitrate::Bitrate320));
    }

    #[test]
    fn second_login_is_rejected_while_one_is_in_flight() {
        let guard = LoginGuard::default();
        let first = guard.try_begin();
        assert!(first.is_some());
        assert!(guard.try_begin().is_none());
        assert!(guard.is_in_flight());

        drop(first);
        assert!(!guard.is_in_flight());
        assert!(guard.try_begin().is_some());
    }

    #[tokio::test]
    async fn concurrent_login_returns_false_without_disturbing_the_first() {
        let session = SpotifySession::new(None);
        let ticket = session.inner.guard.try_begin();
        assert!(ticket.is_some());

        let credentials = Credentials::with_access_token("token");
        assert!(!session.login(credentials).await);
        assert!(session.inner.guard.is_in_flight());
        assert!(!session.is_logged_in());
    }

    #[test]
    fn without_a_session_loads_fail_and_controls_are_noops() {
        let (mut player, mut rx) = player();
        let song = Song::new("Song", "Artist", "Album").with_source(SourceKind::Spotify, "4uLU6hMCjMI75M1A2tKUQC");

        player.play_song(&song);
        assert_eq!(
            posted(&mut rx),
            Some(PlayerEvent::new(
                SourceKind::Spotify,
                1,
                PlayerEventKind::Failed("Spotify is not logged in".into())
            ))
        );
        assert_eq!(player.load_id(), 1);

        player.play();
        player.pause();
        player.seek_to(1_000);

        assert!(player.player.is_none());
        assert_eq!(player.current_position(), 0);
        assert_eq!(player.duration(), 0);
        assert!(!player.is_paused());
        assert_eq!(posted(&mut rx), None);
    }

    #[test]
    fn invalid_track_ids_fail_the_load() {
        let (mut player, mut rx) = player();
        player.play_song(&Song::new("Broken", "Artist", "Album").with_source(SourceKind::Spotify, "xyz"));

        let event = posted(&mut rx).unwrap();
        assert_eq!((event.source, event.load), (SourceKind::Spotify, 1));
        assert!(matches!(event.kind, PlayerEventKind::Failed(ref message) if message.contains("spotify:track:xyz")));
    }

    #[test]
    fn songs_without_a_spotify_id_are_ignored() {
        let (mut player, mut rx) = player();
        player.play_song(&Song::new("Local", "Artist", "Album").with_source(SourceKind::Local, "/music/a.flac"));
        assert!(player.player.is_none());
        assert_eq!(player.load_id(), 0);
        assert_eq!(posted(&mut rx), None);
    }
}
