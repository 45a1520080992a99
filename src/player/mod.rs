//! Player module - playback coordination across sources
//!
//! - `state`: playback status machine and position tracking
//! - `events`: messages backends post back to the media service
//! - `coordinator`: playlist, index and the active source player
//! - `service`: the media service task and its handle

mod coordinator;
mod events;
mod service;
mod state;

pub use coordinator::{PlaybackCoordinator, PlaybackError};
pub use events::{PlayerEvent, PlayerEventKind, PlayerEventSender};
pub use service::{
    BrowserRoot, MediaButton, MediaItem, MediaService, MediaSession, NowPlaying, ServiceCommand,
    ServiceHandle, SessionState, TransportAction, TransportCommand, MEDIA_ROOT_ID,
};
pub use state::{PlaybackStatus, PlaybackTiming, Transition};

use crate::library::{Song, SourceKind};

/// Transport controls against one playback backend.
///
/// Backend objects behind an implementation may be missing (not logged in,
/// not created yet, torn down); accessors then fall back to 0 / false and
/// controls re-create what they need or do nothing.
pub trait SourcePlayer: Send {
    fn source(&self) -> SourceKind;

    fn play(&mut self);

    fn pause(&mut self);

    /// Start `song` from the beginning. Songs without an identifier for this
    /// backend are ignored.
    fn play_song(&mut self, song: &Song);

    fn seek_to(&mut self, millis: u64);

    fn current_position(&self) -> u64;

    fn duration(&self) -> u64;

    fn is_paused(&self) -> bool;

    fn set_volume(&mut self, volume: f32);

    /// Id of the most recent `play_song` load. Every event the player posts
    /// carries the id of the load it belongs to.
    fn load_id(&self) -> u64;
}
