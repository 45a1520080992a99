//! Playback control methods
//!
//! Controls never touch a backend directly; they are queued on the media
//! service, which owns the coordinator.

use crate::player::{MediaButton, TransportCommand};

use super::AppController;

/// Step for the seek keys
pub(crate) const SEEK_STEP_MS: u64 = 5_000;
/// Step for the volume keys
pub(crate) const VOLUME_STEP: f32 = 0.05;

impl AppController {
    pub fn toggle_playback(&self) {
        tracing::debug!("Toggling playback");
        self.service.transport(TransportCommand::PlayPause);
    }

    pub fn next_track(&self) {
        tracing::debug!("Skipping to next track");
        self.service.transport(TransportCommand::SkipToNext);
    }

    pub fn previous_track(&self) {
        tracing::debug!("Skipping to previous track");
        self.service.transport(TransportCommand::SkipToPrevious);
    }

    pub fn stop(&self) {
        self.service.transport(TransportCommand::Stop);
    }

    pub fn media_button(&self, button: MediaButton) {
        tracing::debug!(?button, "Media button pressed");
        self.service.media_button(button);
    }

    pub async fn seek_forward(&self) {
        let now = self.service.now_playing().lock().await.clone();
        let mut target = now.position_ms.saturating_add(SEEK_STEP_MS);
        if now.duration_ms > 0 {
            target = target.min(now.duration_ms);
        }
        self.service.transport(TransportCommand::SeekTo(target));
    }

    pub async fn seek_backward(&self) {
        let position = self.service.now_playing().lock().await.position_ms;
        self.service
            .transport(TransportCommand::SeekTo(position.saturating_sub(SEEK_STEP_MS)));
    }

    pub async fn volume_up(&self) {
        self.change_volume(VOLUME_STEP).await;
    }

    pub async fn volume_down(&self) {
        self.change_volume(-VOLUME_STEP).await;
    }

    async fn change_volume(&self, delta: f32) {
        let now_playing = self.service.now_playing();
        let mut now = now_playing.lock().await;
        let volume = (now.volume + delta).clamp(0.0, 1.0);
        // Stored now so presses between publishes accumulate
        now.volume = volume;
        drop(now);

        tracing::debug!(volume, "Changing volume");
        self.service.transport(TransportCommand::SetVolume(volume));
    }
}
