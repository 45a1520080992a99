//! Playback coordinator: the current playlist, the position in it, and the
//! source player currently producing audio.

use thiserror::Error;

use crate::library::{Song, SourceKind};
use super::events::{PlayerEvent, PlayerEventKind};
use super::state::{PlaybackStatus, Transition};
use super::SourcePlayer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Index {index} out of bounds for a playlist of {len} songs")]
    IndexOutOfBounds { index: usize, len: usize },
}

pub struct PlaybackCoordinator {
    players: Vec<Box<dyn SourcePlayer>>,
    playlist: Vec<Song>,
    index: usize,
    current: Option<SourceKind>,
    /// Load id of the active player's current song
    load: u64,
    status: PlaybackStatus,
    volume: f32,
}

impl PlaybackCoordinator {
    pub fn new(players: Vec<Box<dyn SourcePlayer>>) -> Self {
        Self {
            players,
            playlist: Vec::new(),
            index: 0,
            current: None,
            load: 0,
            status: PlaybackStatus::Stopped,
            volume: 1.0,
        }
    }

    fn player_mut(&mut self, source: SourceKind) -> Option<&mut Box<dyn SourcePlayer>> {
        self.players.iter_mut().find(|p| p.source() == source)
    }

    fn player(&self, source: SourceKind) -> Option<&dyn SourcePlayer> {
        self.players.iter().find(|p| p.source() == source).map(|p| p.as_ref())
    }

    fn has_player(&self, source: SourceKind) -> bool {
        self.player(source).is_some()
    }

    fn active_player_mut(&mut self) -> Option<&mut Box<dyn SourcePlayer>> {
        let source = self.current?;
        self.player_mut(source)
    }

    fn active_player(&self) -> Option<&dyn SourcePlayer> {
        self.current.and_then(|source| self.player(source))
    }

    /// Pause the active player and forget it
    fn release_current(&mut self) {
        if let Some(player) = self.active_player_mut() {
            player.pause();
        }
        self.current = None;
    }

    // ========================================================================
    // Playlist & index
    // ========================================================================

    pub fn set_playlist(&mut self, songs: Vec<Song>) {
        self.release_current();
        tracing::debug!(songs = songs.len(), "Playlist replaced");
        self.playlist = songs;
        self.index = 0;
        self.status = PlaybackStatus::Stopped;
    }

    pub fn set_index(&mut self, index: usize) -> Result<(), PlaybackError> {
        if index >= self.playlist.len() {
            return Err(PlaybackError::IndexOutOfBounds {
                index,
                len: self.playlist.len(),
            });
        }
        self.release_current();
        self.index = index;
        self.status = PlaybackStatus::Stopped;
        Ok(())
    }

    /// Move the index without touching playback, for when the playing song
    /// moved inside the playlist
    pub fn update_index_for_reorder(&mut self, index: usize) {
        self.index = index;
    }

    pub fn playlist(&self) -> &[Song] {
        &self.playlist
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.playlist.get(self.index)
    }

    pub fn current_source(&self) -> Option<SourceKind> {
        self.current
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Play the current song, or resume it if a player is already active.
    /// Returns false when there is nothing that can be played.
    pub fn play(&mut self) -> bool {
        if let Some(player) = self.active_player_mut() {
            player.play();
            self.status = self.status.on(Transition::Resume);
            return true;
        }

        let Some(song) = self.current_song().cloned() else {
            tracing::debug!("Nothing to play, playlist is empty");
            return false;
        };

        let Some(source) = song
            .sources()
            .iter()
            .map(|info| info.source)
            .find(|source| self.has_player(*source))
        else {
            tracing::warn!(song = %song.title, "No registered player can play this song");
            return false;
        };

        tracing::info!(song = %song.title, index = self.index, source = %source, "Playing song");
        self.current = Some(source);
        if let Some(player) = self.player_mut(source) {
            player.play_song(&song);
            self.load = player.load_id();
        }
        self.status = self.status.on(Transition::Load);
        true
    }

    pub fn pause(&mut self) {
        if let Some(player) = self.active_player_mut() {
            player.pause();
            self.status = self.status.on(Transition::Pause);
        }
    }

    /// Pause while playing (or loading), play otherwise
    pub fn toggle(&mut self) -> bool {
        if self.status.is_playing() {
            self.pause();
            true
        } else {
            self.play()
        }
    }

    pub fn skip_to_next(&mut self) -> bool {
        if self.playlist.is_empty() {
            return false;
        }
        let next = (self.index + 1) % self.playlist.len();
        self.set_index(next).is_ok() && self.play()
    }

    pub fn skip_to_previous(&mut self) -> bool {
        if self.playlist.is_empty() {
            return false;
        }
        let len = self.playlist.len();
        let previous = (self.index + len - 1) % len;
        self.set_index(previous).is_ok() && self.play()
    }

    pub fn seek_to(&mut self, millis: u64) {
        if let Some(player) = self.active_player_mut() {
            player.seek_to(millis);
        }
    }

    pub fn stop(&mut self) {
        self.release_current();
        self.status = self.status.on(Transition::Stop);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        let volume = self.volume;
        for player in &mut self.players {
            player.set_volume(volume);
        }
    }

    pub fn position(&self) -> u64 {
        self.active_player().map(|p| p.current_position()).unwrap_or(0)
    }

    pub fn duration(&self) -> u64 {
        self.active_player().map(|p| p.duration()).unwrap_or(0)
    }

    pub fn is_paused(&self) -> bool {
        self.active_player().map(|p| p.is_paused()).unwrap_or(false)
    }

    // ========================================================================
    // Backend events
    // ========================================================================

    /// The current song finished: advance, or wrap to the start and stop
    /// after the last one.
    pub fn notify_playback_end(&mut self) {
        if self.playlist.is_empty() {
            return;
        }

        if self.index + 1 >= self.playlist.len() {
            tracing::info!("Reached the end of the playlist");
            self.release_current();
            self.index = 0;
            self.status = PlaybackStatus::Ended;
        } else if self.set_index(self.index + 1).is_ok() {
            self.play();
        }
    }

    /// Apply an event from the active player. Events from other players, or
    /// from a load the active player has since replaced, are dropped.
    pub fn handle_player_event(&mut self, event: PlayerEvent) {
        if self.current != Some(event.source) {
            tracing::trace!(?event, "Ignoring event from inactive player");
            return;
        }
        if event.load != self.load {
            tracing::trace!(?event, current = self.load, "Ignoring event from a previous load");
            return;
        }

        match event.kind {
            PlayerEventKind::Started => self.status = self.status.on(Transition::Started),
            PlayerEventKind::Paused => self.status = self.status.on(Transition::Pause),
            PlayerEventKind::Resumed => self.status = self.status.on(Transition::Resume),
            PlayerEventKind::TrackEnded => self.notify_playback_end(),
            PlayerEventKind::Failed(message) => {
                tracing::error!(source = %event.source, error = %message, "Playback failed");
                self.release_current();
                self.status = self.status.on(Transition::Stop);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::{Call, CallLog, MockPlayer};

    fn song(title: &str, sources: &[SourceKind]) -> Song {
        sources.iter().fold(Song::new(title, "Artist", "Album"), |song, source| {
            song.with_source(*source, format!("{}-{}", source, title))
        })
    }

    fn coordinator(log: &CallLog) -> PlaybackCoordinator {
        PlaybackCoordinator::new(vec![
            Box::new(MockPlayer::new(SourceKind::Local, log)),
            Box::new(MockPlayer::new(SourceKind::Spotify, log)),
        ])
    }

    fn mixed_playlist() -> Vec<Song> {
        vec![
            song("one", &[SourceKind::Local]),
            song("two", &[SourceKind::Spotify]),
            song("three", &[SourceKind::Spotify, SourceKind::Local]),
        ]
    }

    fn calls(log: &CallLog) -> Vec<(SourceKind, Call)> {
        log.lock().unwrap().clone()
    }

    fn event(source: SourceKind, load: u64, kind: PlayerEventKind) -> PlayerEvent {
        PlayerEvent::new(source, load, kind)
    }

    #[test]
    fn set_index_then_index_returns_it() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());

        for i in 0..3 {
            coordinator.set_index(i).unwrap();
            assert_eq!(coordinator.index(), i);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected_without_side_effects() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.set_index(1).unwrap();
        coordinator.play();
        log.lock().unwrap().clear();

        let err = coordinator.set_index(3).unwrap_err();
        assert_eq!(err, PlaybackError::IndexOutOfBounds { index: 3, len: 3 });
        assert_eq!(coordinator.index(), 1);
        assert_eq!(coordinator.current_source(), Some(SourceKind::Spotify));
        assert!(calls(&log).is_empty());
    }

    #[test]
    fn previous_player_is_paused_before_the_next_one_starts() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();

        coordinator.set_index(1).unwrap();
        coordinator.play();

        assert_eq!(
            calls(&log),
            vec![
                (SourceKind::Local, Call::PlaySong("one".into())),
                (SourceKind::Local, Call::Pause),
                (SourceKind::Spotify, Call::PlaySong("two".into())),
            ]
        );
    }

    #[test]
    fn set_playlist_releases_the_active_player() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();

        coordinator.set_playlist(vec![song("four", &[SourceKind::Spotify])]);
        assert_eq!(calls(&log).last(), Some(&(SourceKind::Local, Call::Pause)));
        assert_eq!(coordinator.current_source(), None);
        assert_eq!(coordinator.index(), 0);
        assert_eq!(coordinator.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn playback_end_advances_and_plays_the_next_song() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();

        coordinator.notify_playback_end();
        assert_eq!(coordinator.index(), 1);
        assert_eq!(coordinator.status(), PlaybackStatus::Loading);
        assert_eq!(
            calls(&log).last(),
            Some(&(SourceKind::Spotify, Call::PlaySong("two".into())))
        );
    }

    #[test]
    fn playback_end_on_last_song_wraps_without_playing() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.set_index(2).unwrap();
        coordinator.play();
        log.lock().unwrap().clear();

        coordinator.notify_playback_end();
        assert_eq!(coordinator.index(), 0);
        assert_eq!(coordinator.status(), PlaybackStatus::Ended);
        assert_eq!(coordinator.current_source(), None);
        assert!(
            calls(&log)
                .iter()
                .all(|(_, call)| !matches!(call, Call::Play | Call::PlaySong(_)))
        );
    }

    #[test]
    fn first_source_with_a_player_wins() {
        let log = CallLog::default();
        let mut coordinator = PlaybackCoordinator::new(vec![Box::new(MockPlayer::new(SourceKind::Local, &log))]);
        coordinator.set_playlist(mixed_playlist());
        coordinator.set_index(2).unwrap();

        assert!(coordinator.play());
        assert_eq!(coordinator.current_source(), Some(SourceKind::Local));
    }

    #[test]
    fn unplayable_song_does_not_start_anything() {
        let log = CallLog::default();
        let mut coordinator = PlaybackCoordinator::new(vec![Box::new(MockPlayer::new(SourceKind::Local, &log))]);
        coordinator.set_playlist(vec![song("remote only", &[SourceKind::Spotify])]);

        assert!(!coordinator.play());
        assert_eq!(coordinator.current_source(), None);
        assert!(calls(&log).is_empty());
    }

    #[test]
    fn empty_playlist_is_accepted_and_inert() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(Vec::new());

        assert!(!coordinator.play());
        assert!(!coordinator.skip_to_next());
        coordinator.notify_playback_end();
        assert_eq!(coordinator.index(), 0);
        assert!(coordinator.set_index(0).is_err());
    }

    #[test]
    fn second_play_resumes_the_active_player() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();
        coordinator.handle_player_event(event(SourceKind::Local, 1, PlayerEventKind::Started));
        coordinator.pause();
        assert_eq!(coordinator.status(), PlaybackStatus::Paused);
        assert!(coordinator.is_paused());

        coordinator.play();
        assert_eq!(coordinator.status(), PlaybackStatus::Playing);
        assert_eq!(calls(&log).last(), Some(&(SourceKind::Local, Call::Play)));
    }

    #[test]
    fn skipping_wraps_around_both_ways() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());

        assert!(coordinator.skip_to_previous());
        assert_eq!(coordinator.index(), 2);
        assert!(coordinator.skip_to_next());
        assert_eq!(coordinator.index(), 0);
    }

    #[test]
    fn events_from_inactive_players_are_ignored() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();

        coordinator.handle_player_event(event(SourceKind::Spotify, 1, PlayerEventKind::TrackEnded));
        assert_eq!(coordinator.index(), 0);

        coordinator.handle_player_event(event(SourceKind::Local, 1, PlayerEventKind::TrackEnded));
        assert_eq!(coordinator.index(), 1);
    }

    #[test]
    fn events_from_a_replaced_load_are_ignored() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(vec![
            song("one", &[SourceKind::Local]),
            song("two", &[SourceKind::Local]),
            song("three", &[SourceKind::Local]),
        ]);
        coordinator.play();
        coordinator.set_index(1).unwrap();
        coordinator.play();

        // End of "one" arrives after "two" was loaded on the same player
        coordinator.handle_player_event(event(SourceKind::Local, 1, PlayerEventKind::TrackEnded));
        assert_eq!(coordinator.index(), 1);
        assert_eq!(coordinator.status(), PlaybackStatus::Loading);

        coordinator.handle_player_event(event(SourceKind::Local, 1, PlayerEventKind::Failed("gone".into())));
        assert_eq!(coordinator.current_source(), Some(SourceKind::Local));

        coordinator.handle_player_event(event(SourceKind::Local, 2, PlayerEventKind::TrackEnded));
        assert_eq!(coordinator.index(), 2);
    }

    #[test]
    fn toggle_pauses_while_playing_and_plays_otherwise() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        assert!(!coordinator.toggle());

        coordinator.set_playlist(mixed_playlist());
        assert!(coordinator.toggle());
        assert_eq!(coordinator.status(), PlaybackStatus::Loading);
        coordinator.handle_player_event(event(SourceKind::Local, 1, PlayerEventKind::Started));

        assert!(coordinator.toggle());
        assert_eq!(coordinator.status(), PlaybackStatus::Paused);
        assert!(coordinator.toggle());
        assert_eq!(coordinator.status(), PlaybackStatus::Playing);
        assert_eq!(calls(&log).last(), Some(&(SourceKind::Local, Call::Play)));
    }

    #[test]
    fn reorder_moves_the_index_without_pausing() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();
        log.lock().unwrap().clear();

        coordinator.update_index_for_reorder(2);
        assert_eq!(coordinator.index(), 2);
        assert_eq!(coordinator.current_source(), Some(SourceKind::Local));
        assert!(calls(&log).is_empty());
    }

    #[test]
    fn failure_stops_playback() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_playlist(mixed_playlist());
        coordinator.play();

        coordinator.handle_player_event(event(SourceKind::Local, 1, PlayerEventKind::Failed("device lost".into())));
        assert_eq!(coordinator.status(), PlaybackStatus::Stopped);
        assert_eq!(coordinator.current_source(), None);
    }

    #[test]
    fn volume_reaches_every_player() {
        let log = CallLog::default();
        let mut coordinator = coordinator(&log);
        coordinator.set_volume(1.7);

        assert_eq!(coordinator.volume(), 1.0);
        assert_eq!(
            calls(&log),
            vec![
                (SourceKind::Local, Call::Volume(1.0)),
                (SourceKind::Spotify, Call::Volume(1.0)),
            ]
        );
    }

    #[test]
    fn accessors_default_without_active_player() {
        let log = CallLog::default();
        let coordinator = coordinator(&log);
        assert_eq!(coordinator.position(), 0);
        assert_eq!(coordinator.duration(), 0);
        assert!(!coordinator.is_paused());
    }
}
