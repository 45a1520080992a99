//! Media service: owns the playback coordinator and the media session
//!
//! Everything that changes playback goes through one queue consumed by the
//! service task: transport commands from the UI, media buttons, playlist
//! changes and events posted by backend players.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::library::Song;
use super::coordinator::PlaybackCoordinator;
use super::events::{PlayerEvent, PlayerEventSender};
use super::state::PlaybackStatus;

/// Browse root handed to media clients
pub const MEDIA_ROOT_ID: &str = "MEDIA_ROOT";

const PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    PlayPause,
    SkipToNext,
    SkipToPrevious,
    SeekTo(u64),
    Stop,
    SetVolume(f32),
}

/// Hardware / keyboard media keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaButton {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
    Stop,
}

impl MediaButton {
    pub fn command(self) -> TransportCommand {
        match self {
            MediaButton::Play => TransportCommand::Play,
            MediaButton::Pause => TransportCommand::Pause,
            MediaButton::PlayPause => TransportCommand::PlayPause,
            MediaButton::Next => TransportCommand::SkipToNext,
            MediaButton::Previous => TransportCommand::SkipToPrevious,
            MediaButton::Stop => TransportCommand::Stop,
        }
    }
}

#[derive(Debug)]
pub enum ServiceCommand {
    Transport(TransportCommand),
    MediaButton(MediaButton),
    SetPlaylist {
        songs: Vec<Song>,
        index: usize,
        play: bool,
    },
    SetIndex(usize),
    UpdateIndexForReorder(usize),
    PlayerEvent(PlayerEvent),
    Shutdown,
}

/// Transport actions the session currently advertises
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportAction {
    Prepare,
    Play,
    Pause,
    PlayPause,
    SkipToNext,
    SkipToPrevious,
    SeekTo,
    Stop,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub status: PlaybackStatus,
    pub position_ms: u64,
    pub actions: Vec<TransportAction>,
}

/// Session as seen by media clients
#[derive(Clone, Debug)]
pub struct MediaSession {
    state: SessionState,
    handles_queue_commands: bool,
}

impl MediaSession {
    pub fn new() -> Self {
        Self {
            state: SessionState {
                status: PlaybackStatus::Stopped,
                position_ms: 0,
                actions: vec![TransportAction::Prepare],
            },
            handles_queue_commands: true,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handles_queue_commands(&self) -> bool {
        self.handles_queue_commands
    }

    pub fn update(&mut self, status: PlaybackStatus, position_ms: u64) {
        use TransportAction::*;
        let toggle = if status.is_playing() { Pause } else { Play };
        self.state = SessionState {
            status,
            position_ms,
            actions: vec![toggle, PlayPause, SkipToNext, SkipToPrevious, SeekTo, Stop],
        };
    }
}

impl Default for MediaSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowserRoot {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub playable: bool,
}

/// What the UI renders in the now-playing bar
#[derive(Clone, Debug, Default)]
pub struct NowPlaying {
    pub song: Option<Song>,
    pub status: PlaybackStatus,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub index: usize,
    pub playlist_len: usize,
    pub volume: f32,
}

/// Cloneable entry point to the media service
#[derive(Clone)]
pub struct ServiceHandle {
    tx: UnboundedSender<ServiceCommand>,
    now_playing: Arc<Mutex<NowPlaying>>,
}

impl ServiceHandle {
    pub fn new() -> (Self, UnboundedReceiver<ServiceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            tx,
            now_playing: Arc::new(Mutex::new(NowPlaying::default())),
        };
        (handle, rx)
    }

    pub fn event_sender(&self) -> PlayerEventSender {
        PlayerEventSender::new(self.tx.clone())
    }

    pub fn now_playing(&self) -> Arc<Mutex<NowPlaying>> {
        Arc::clone(&self.now_playing)
    }

    pub fn send(&self, command: ServiceCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Media service is not running");
        }
    }

    pub fn transport(&self, command: TransportCommand) {
        self.send(ServiceCommand::Transport(command));
    }

    pub fn media_button(&self, button: MediaButton) {
        self.send(ServiceCommand::MediaButton(button));
    }

    /// Replace the playlist and start playing `songs[index]`
    pub fn play_playlist(&self, songs: Vec<Song>, index: usize) {
        self.send(ServiceCommand::SetPlaylist {
            songs,
            index,
            play: true,
        });
    }

    pub fn set_index(&self, index: usize) {
        self.send(ServiceCommand::SetIndex(index));
    }

    pub fn update_index_for_reorder(&self, index: usize) {
        self.send(ServiceCommand::UpdateIndexForReorder(index));
    }

    pub fn shutdown(&self) {
        self.send(ServiceCommand::Shutdown);
    }
}

pub struct MediaService {
    coordinator: PlaybackCoordinator,
    session: MediaSession,
    started: bool,
    inbox: UnboundedReceiver<ServiceCommand>,
    now_playing: Arc<Mutex<NowPlaying>>,
}

impl MediaService {
    pub fn new(
        coordinator: PlaybackCoordinator,
        handle: &ServiceHandle,
        inbox: UnboundedReceiver<ServiceCommand>,
    ) -> Self {
        Self {
            coordinator,
            session: MediaSession::new(),
            started: false,
            inbox,
            now_playing: handle.now_playing(),
        }
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    pub fn session(&self) -> &MediaSession {
        &self.session
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Move the service to the foreground. Only the first call does anything.
    pub fn start_if_not_started(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        tracing::info!("Media service started");
        true
    }

    pub fn get_root(&self, client: &str) -> BrowserRoot {
        tracing::debug!(client, "Browse root requested");
        BrowserRoot {
            id: MEDIA_ROOT_ID.to_string(),
        }
    }

    pub fn load_children(&self, parent_id: &str) -> Vec<MediaItem> {
        tracing::debug!(parent_id, "Browsing is not supported, no children");
        Vec::new()
    }

    fn transport(&mut self, command: TransportCommand) {
        tracing::debug!(?command, "Transport command");
        match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Pause => self.coordinator.pause(),
            TransportCommand::PlayPause => {
                self.start_if_not_started();
                self.coordinator.toggle();
            }
            TransportCommand::SkipToNext => {
                self.start_if_not_started();
                self.coordinator.skip_to_next();
            }
            TransportCommand::SkipToPrevious => {
                self.start_if_not_started();
                self.coordinator.skip_to_previous();
            }
            TransportCommand::SeekTo(millis) => self.coordinator.seek_to(millis),
            TransportCommand::Stop => self.coordinator.stop(),
            TransportCommand::SetVolume(volume) => self.coordinator.set_volume(volume),
        }
    }

    fn play(&mut self) {
        self.start_if_not_started();
        self.coordinator.play();
    }

    /// Apply one command. Returns false when the service should shut down.
    pub fn handle(&mut self, command: ServiceCommand) -> bool {
        match command {
            ServiceCommand::Transport(command) => self.transport(command),
            ServiceCommand::MediaButton(button) => self.transport(button.command()),
            ServiceCommand::SetPlaylist { songs, index, play } => {
                self.coordinator.set_playlist(songs);
                if index != 0 {
                    if let Err(e) = self.coordinator.set_index(index) {
                        tracing::warn!(error = %e, "Ignoring playlist start index");
                    }
                }
                if play {
                    self.play();
                }
            }
            ServiceCommand::SetIndex(index) => {
                if let Err(e) = self.coordinator.set_index(index) {
                    tracing::warn!(error = %e, "Ignoring index change");
                }
            }
            ServiceCommand::UpdateIndexForReorder(index) => self.coordinator.update_index_for_reorder(index),
            ServiceCommand::PlayerEvent(event) => {
                tracing::debug!(?event, "Player event");
                self.coordinator.handle_player_event(event);
            }
            ServiceCommand::Shutdown => return false,
        }

        self.session
            .update(self.coordinator.status(), self.coordinator.position());
        true
    }

    pub fn snapshot(&self) -> NowPlaying {
        NowPlaying {
            song: self.coordinator.current_song().cloned(),
            status: self.coordinator.status(),
            position_ms: self.coordinator.position(),
            duration_ms: self.coordinator.duration(),
            index: self.coordinator.index(),
            playlist_len: self.coordinator.playlist().len(),
            volume: self.coordinator.volume(),
        }
    }

    async fn publish(&mut self) {
        let snapshot = self.snapshot();
        *self.now_playing.lock().await = snapshot;
    }

    /// Consume the queue until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(PUBLISH_INTERVAL);
        loop {
            tokio::select! {
                command = self.inbox.recv() => {
                    let Some(command) = command else { break };
                    let keep_running = self.handle(command);
                    self.publish().await;
                    if !keep_running {
                        break;
                    }
                }
                _ = tick.tick() => self.publish().await,
            }
        }

        self.coordinator.stop();
        self.publish().await;
        tracing::info!("Media service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::SourceKind;
    use crate::player::PlayerEventKind;
    use crate::player::testing::{Call, CallLog, MockPlayer};

    fn service(log: &CallLog) -> (MediaService, ServiceHandle) {
        let (handle, inbox) = ServiceHandle::new();
        let coordinator = PlaybackCoordinator::new(vec![
            Box::new(MockPlayer::new(SourceKind::Local, log)),
            Box::new(MockPlayer::new(SourceKind::Spotify, log)),
        ]);
        (MediaService::new(coordinator, &handle, inbox), handle)
    }

    fn songs() -> Vec<Song> {
        vec![
            Song::new("one", "A", "X").with_source(SourceKind::Local, "/music/one.flac"),
            Song::new("two", "B", "Y").with_source(SourceKind::Spotify, "4uLU6hMCjMI75M1A2tKUQC"),
        ]
    }

    #[test]
    fn session_starts_stopped_with_prepare_only() {
        let log = CallLog::default();
        let (service, _handle) = service(&log);
        let state = service.session().state();

        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.position_ms, 0);
        assert_eq!(state.actions, vec![TransportAction::Prepare]);
        assert!(service.session().handles_queue_commands());
    }

    #[test]
    fn service_starts_only_once() {
        let log = CallLog::default();
        let (mut service, _handle) = service(&log);

        assert!(service.start_if_not_started());
        assert!(!service.start_if_not_started());
        assert!(service.is_started());
    }

    #[test]
    fn first_play_starts_the_service() {
        let log = CallLog::default();
        let (mut service, _handle) = service(&log);
        service.handle(ServiceCommand::SetPlaylist {
            songs: songs(),
            index: 1,
            play: false,
        });
        assert!(!service.is_started());

        service.handle(ServiceCommand::Transport(TransportCommand::Play));
        assert!(service.is_started());
        assert_eq!(
            log.lock().unwrap().last(),
            Some(&(SourceKind::Spotify, Call::PlaySong("two".into())))
        );
        assert!(service.session().state().actions.contains(&TransportAction::Pause));
    }

    #[test]
    fn media_buttons_map_to_transport_commands() {
        assert_eq!(MediaButton::Play.command(), TransportCommand::Play);
        assert_eq!(MediaButton::Pause.command(), TransportCommand::Pause);
        assert_eq!(MediaButton::PlayPause.command(), TransportCommand::PlayPause);
        assert_eq!(MediaButton::Next.command(), TransportCommand::SkipToNext);
        assert_eq!(MediaButton::Previous.command(), TransportCommand::SkipToPrevious);
        assert_eq!(MediaButton::Stop.command(), TransportCommand::Stop);
    }

    #[test]
    fn play_pause_button_toggles() {
        let log = CallLog::default();
        let (mut service, _handle) = service(&log);
        service.handle(ServiceCommand::SetPlaylist {
            songs: songs(),
            index: 0,
            play: true,
        });

        service.handle(ServiceCommand::MediaButton(MediaButton::PlayPause));
        assert_eq!(service.coordinator().status(), PlaybackStatus::Paused);
        service.handle(ServiceCommand::MediaButton(MediaButton::PlayPause));
        assert_eq!(service.coordinator().status(), PlaybackStatus::Playing);
    }

    #[test]
    fn play_pause_on_a_stopped_service_starts_it() {
        let log = CallLog::default();
        let (mut service, _handle) = service(&log);
        service.handle(ServiceCommand::SetPlaylist {
            songs: songs(),
            index: 0,
            play: false,
        });

        service.handle(ServiceCommand::Transport(TransportCommand::PlayPause));
        assert!(service.is_started());
        assert_eq!(service.coordinator().status(), PlaybackStatus::Loading);
        assert_eq!(
            log.lock().unwrap().last(),
            Some(&(SourceKind::Local, Call::PlaySong("one".into())))
        );
    }

    #[test]
    fn browsing_is_a_stub() {
        let log = CallLog::default();
        let (service, _handle) = service(&log);

        assert_eq!(service.get_root("blade").id, MEDIA_ROOT_ID);
        assert!(service.load_children(MEDIA_ROOT_ID).is_empty());
        assert!(service.load_children("anything").is_empty());
    }

    #[test]
    fn bad_start_index_keeps_the_first_song() {
        let log = CallLog::default();
        let (mut service, _handle) = service(&log);
        service.handle(ServiceCommand::SetPlaylist {
            songs: songs(),
            index: 9,
            play: false,
        });
        assert_eq!(service.coordinator().index(), 0);
    }

    #[tokio::test]
    async fn queue_drives_playback_until_shutdown() {
        let log = CallLog::default();
        let (service, handle) = service(&log);
        let events = handle.event_sender();

        handle.play_playlist(songs(), 0);
        events.send(PlayerEvent::new(SourceKind::Local, 1, PlayerEventKind::Started));
        events.send(PlayerEvent::new(SourceKind::Local, 1, PlayerEventKind::TrackEnded));
        handle.transport(TransportCommand::SetVolume(0.5));
        handle.shutdown();

        service.run().await;

        let now_playing = handle.now_playing().lock().await.clone();
        assert_eq!(now_playing.index, 1);
        assert_eq!(now_playing.status, PlaybackStatus::Stopped);
        assert_eq!(now_playing.volume, 0.5);
        assert_eq!(now_playing.song.map(|s| s.title), Some("two".to_string()));

        let calls = log.lock().unwrap().clone();
        assert!(calls.contains(&(SourceKind::Spotify, Call::PlaySong("two".into()))));
    }

    #[tokio::test]
    async fn events_after_shutdown_are_dropped() {
        let log = CallLog::default();
        let (service, handle) = service(&log);
        let events = handle.event_sender();
        handle.shutdown();
        service.run().await;

        assert!(!events.send(PlayerEvent::new(SourceKind::Local, 1, PlayerEventKind::TrackEnded)));
    }
}
