//! Playback information rendered in the now-playing bar

use crate::player::{NowPlaying, PlaybackStatus};

/// Metadata about the current song
#[derive(Clone, Debug, PartialEq)]
pub struct TrackMetadata {
    pub name: String,
    pub artist: String,
    pub album: String,
    /// Backends able to play the song, e.g. "local, spotify"
    pub sources: String,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            name: "No track playing".to_string(),
            artist: String::new(),
            album: String::new(),
            sources: String::new(),
        }
    }
}

/// Complete playback information for rendering the UI
#[derive(Clone, Debug, Default)]
pub struct PlaybackInfo {
    pub track: TrackMetadata,
    pub status: PlaybackStatus,
    pub progress_ms: u64,
    pub duration_ms: u64,
    /// 1-based position in the playlist, 0 when there is none
    pub position: usize,
    pub playlist_len: usize,
    pub volume: f32,
    pub device_name: String,
}

impl PlaybackInfo {
    pub fn from_now_playing(now: &NowPlaying, device_name: &str) -> Self {
        let track = match &now.song {
            Some(song) => TrackMetadata {
                name: song.title.clone(),
                artist: song.artist.clone(),
                album: song.album.clone(),
                sources: song
                    .sources()
                    .iter()
                    .map(|s| s.source.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            },
            None => TrackMetadata::default(),
        };

        // Backends that cannot report a duration fall back to the library's
        let duration_ms = match now.duration_ms {
            0 => now.song.as_ref().and_then(|s| s.duration_ms).unwrap_or(0) as u64,
            d => d,
        };

        Self {
            track,
            status: now.status,
            progress_ms: if duration_ms > 0 { now.position_ms.min(duration_ms) } else { now.position_ms },
            duration_ms,
            position: if now.playlist_len == 0 { 0 } else { now.index + 1 },
            playlist_len: now.playlist_len,
            volume: now.volume,
            device_name: device_name.to_string(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status.is_playing()
    }

    pub fn volume_percent(&self) -> u8 {
        (self.volume.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// Bottom line of the now-playing bar: status, sources, playlist position, volume
    pub fn controls_line(&self) -> String {
        let mut line = format!(" {} |", self.status.label());
        if !self.track.sources.is_empty() {
            line.push_str(&format!(" {} |", self.track.sources));
        }
        line.push_str(&format!(
            " {}/{} | Vol: {}% ",
            self.position,
            self.playlist_len,
            self.volume_percent()
        ));
        line
    }
}
