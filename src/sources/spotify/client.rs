//! Spotify Web API client used to import the user's library

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use tokio::sync::RwLock;
use rspotify::{
    model::{FullTrack, PlayableItem},
    prelude::*,
    AuthCodeSpotify,
};

use crate::auth::{self, AuthResult};
use crate::library::{Library, Playlist, Song, SourceKind};

/// Upper bound on saved tracks fetched in one import
const SAVED_TRACKS_LIMIT: usize = 5000;

/// Spotify API client with token refresh support
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
    cache_dir: PathBuf,
    refresh_token: Arc<RwLock<String>>,
    token_expires_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl SpotifyClient {
    pub fn new(client: AuthCodeSpotify, auth: &AuthResult, cache_dir: PathBuf) -> Self {
        Self {
            client: Arc::new(client),
            cache_dir,
            refresh_token: Arc::new(RwLock::new(auth.refresh_token.clone())),
            token_expires_at: Arc::new(RwLock::new(Some(auth.expires_at))),
        }
    }

    pub async fn token_needs_refresh(&self) -> bool {
        let expires_at = self.token_expires_at.read().await;
        if let Some(exp) = *expires_at {
            // Refresh if less than 5 minutes remaining
            (exp - Utc::now()).num_seconds() < 300
        } else {
            false
        }
    }

    pub async fn refresh_token_if_needed(&self) -> Result<bool> {
        if !self.token_needs_refresh().await {
            return Ok(false);
        }

        let refresh_token = self.refresh_token.read().await.clone();
        tracing::info!("Token expiring soon, refreshing...");

        let refreshed = auth::refresh_access_token(&refresh_token).await?;
        if let Ok(mut guard) = self.client.token.lock().await {
            *guard = Some(refreshed.rspotify_token());
        }
        auth::save_refresh_token(&self.cache_dir, &refreshed.refresh_token);
        *self.refresh_token.write().await = refreshed.refresh_token;
        *self.token_expires_at.write().await = Some(refreshed.expires_at);

        tracing::info!(expires_at = %refreshed.expires_at, "Access token refreshed");
        Ok(true)
    }

    pub async fn saved_tracks(&self) -> Result<Vec<Song>> {
        let saved: Vec<_> = self
            .client
            .current_user_saved_tracks(None)
            .take(SAVED_TRACKS_LIMIT)
            .try_collect()
            .await?;

        Ok(saved.iter().filter_map(|saved| song_from_track(&saved.track)).collect())
    }

    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        let simplified: Vec<_> = self.client.current_user_playlists().try_collect().await?;

        let mut playlists = Vec::with_capacity(simplified.len());
        for playlist in simplified {
            let items: Vec<_> = self
                .client
                .playlist_items(playlist.id.clone(), None, None)
                .try_collect()
                .await?;

            let songs: Vec<Song> = items
                .iter()
                .filter_map(|item| match &item.track {
                    Some(PlayableItem::Track(track)) => song_from_track(track),
                    _ => None,
                })
                .collect();

            tracing::debug!(playlist = %playlist.name, songs = songs.len(), "Fetched Spotify playlist");
            playlists.push(Playlist::new(playlist.name, songs));
        }
        Ok(playlists)
    }

    /// Merge the user's saved tracks and playlists into `library`.
    /// Returns the number of songs fetched.
    pub async fn import_into(&self, library: &mut Library) -> Result<usize> {
        let songs = self.saved_tracks().await?;
        let playlists = self.playlists().await?;

        let mut fetched = songs.len();
        for song in songs {
            library.add_song(song);
        }
        for playlist in playlists {
            fetched += playlist.songs.len();
            for song in &playlist.songs {
                library.add_song(song.clone());
            }
            library.add_playlist(playlist);
        }
        library.rebuild();

        tracing::info!(songs = fetched, "Spotify library imported");
        Ok(fetched)
    }
}

fn song_from_track(track: &FullTrack) -> Option<Song> {
    let id = track.id.as_ref()?.id().to_string();
    let artist = track.artists.first().map(|a| a.name.clone()).unwrap_or_default();

    Some(
        Song::new(track.name.clone(), artist, track.album.name.clone())
            .with_source(SourceKind::Spotify, id)
            .with_duration(track.duration.num_milliseconds().max(0) as u32)
            .with_track_number(track.track_number),
    )
}
