//! Events posted by source players
//!
//! Backends run on their own threads; they never touch coordinator state and
//! only report what happened through the media service queue.

use tokio::sync::mpsc::UnboundedSender;

use crate::library::SourceKind;
use super::service::ServiceCommand;

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEventKind {
    /// Audio is coming out for the loaded song
    Started,
    /// The backend paused on its own (remote control, device loss)
    Paused,
    /// The backend resumed on its own
    Resumed,
    /// The current song finished
    TrackEnded,
    /// The backend gave up on the current song
    Failed(String),
}

/// Something a source player reports about one of its loads.
///
/// `load` is the id the player handed out for the `play_song` call the event
/// belongs to (see [`super::SourcePlayer::load_id`]).
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerEvent {
    pub source: SourceKind,
    pub load: u64,
    pub kind: PlayerEventKind,
}

impl PlayerEvent {
    pub fn new(source: SourceKind, load: u64, kind: PlayerEventKind) -> Self {
        Self { source, load, kind }
    }
}

/// Posting end of the media service queue handed to source players
#[derive(Clone, Debug)]
pub struct PlayerEventSender {
    tx: UnboundedSender<ServiceCommand>,
}

impl PlayerEventSender {
    pub(crate) fn new(tx: UnboundedSender<ServiceCommand>) -> Self {
        Self { tx }
    }

    /// Post `event`. Returns false once the service has shut down.
    pub fn send(&self, event: PlayerEvent) -> bool {
        match self.tx.send(ServiceCommand::PlayerEvent(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(event = ?e.0, "Media service gone, dropping player event");
                false
            }
        }
    }
}
