//! Library data types: songs and the collections that hold them

use std::fmt;
use serde::{Deserialize, Serialize};

/// A playback backend able to play some subset of the library
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Spotify,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Spotify => "spotify",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Backend-specific identifier of a song
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInformation {
    pub source: SourceKind,
    pub id: String,
}

/// Case-insensitive identity used to merge the same song coming from several sources
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongKey {
    title: String,
    artist: String,
    album: String,
}

/// A song and every backend that can play it.
///
/// `sources` is kept in priority order and holds at most one entry per backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(default)]
    sources: Vec<SourceInformation>,
}

impl Song {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration_ms: None,
            track_number: None,
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: SourceKind, id: impl Into<String>) -> Self {
        self.add_source(source, id);
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_track_number(mut self, track_number: u32) -> Self {
        self.track_number = Some(track_number);
        self
    }

    /// Add an identifier for `source`. Returns false if the song already has one.
    pub fn add_source(&mut self, source: SourceKind, id: impl Into<String>) -> bool {
        if self.is_playable_by(source) {
            return false;
        }
        self.sources.push(SourceInformation { source, id: id.into() });
        true
    }

    pub fn sources(&self) -> &[SourceInformation] {
        &self.sources
    }

    /// The identifier this song has for `source`, if any
    pub fn source_id(&self, source: SourceKind) -> Option<&str> {
        self.sources
            .iter()
            .find(|info| info.source == source)
            .map(|info| info.id.as_str())
    }

    pub fn is_playable_by(&self, source: SourceKind) -> bool {
        self.source_id(source).is_some()
    }

    pub fn key(&self) -> SongKey {
        SongKey {
            title: self.title.trim().to_lowercase(),
            artist: self.artist.trim().to_lowercase(),
            album: self.album.trim().to_lowercase(),
        }
    }

    /// Fold another copy of the same song into this one
    pub(crate) fn merge(&mut self, other: Song) {
        for info in other.sources {
            self.add_source(info.source, info.id);
        }
        if self.duration_ms.is_none() {
            self.duration_ms = other.duration_ms;
        }
        if self.track_number.is_none() {
            self.track_number = other.track_number;
        }
    }

    /// Drop duplicate backend entries, keeping the first one of each
    pub(crate) fn dedup_sources(&mut self) {
        let sources = std::mem::take(&mut self.sources);
        for info in sources {
            self.add_source(info.source, info.id);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Album {
    pub name: String,
    pub artist: String,
    pub songs: Vec<Song>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Artist {
    pub name: String,
    pub albums: Vec<Album>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Playlist {
    pub name: String,
    pub songs: Vec<Song>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, songs: Vec<Song>) -> Self {
        Self { name: name.into(), songs }
    }
}

/// Anything the library screen can list
#[derive(Clone, Debug, PartialEq)]
pub enum LibraryObject {
    Artist(Artist),
    Album(Album),
    Song(Song),
    Playlist(Playlist),
}

impl LibraryObject {
    pub fn name(&self) -> &str {
        match self {
            LibraryObject::Artist(artist) => &artist.name,
            LibraryObject::Album(album) => &album.name,
            LibraryObject::Song(song) => &song.title,
            LibraryObject::Playlist(playlist) => &playlist.name,
        }
    }

    /// Secondary line shown next to the name
    pub fn subtitle(&self) -> String {
        match self {
            LibraryObject::Artist(artist) => format!("{} albums", artist.albums.len()),
            LibraryObject::Album(album) => album.artist.clone(),
            LibraryObject::Song(song) => format!("{} - {}", song.artist, song.album),
            LibraryObject::Playlist(playlist) => format!("{} songs", playlist.songs.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_lookup_is_by_backend_tag() {
        let song = Song::new("Song 2", "Blur", "Blur")
            .with_source(SourceKind::Local, "/music/blur/song2.flac")
            .with_source(SourceKind::Spotify, "1FTSo4v6BOZH9QxKc3MbVM");

        assert_eq!(song.source_id(SourceKind::Spotify), Some("1FTSo4v6BOZH9QxKc3MbVM"));
        assert_eq!(song.source_id(SourceKind::Local), Some("/music/blur/song2.flac"));
        assert_eq!(song.sources()[0].source, SourceKind::Local);
    }

    #[test]
    fn one_identifier_per_backend() {
        let mut song = Song::new("Intro", "The xx", "xx").with_source(SourceKind::Spotify, "a");
        assert!(!song.add_source(SourceKind::Spotify, "b"));
        assert_eq!(song.source_id(SourceKind::Spotify), Some("a"));
        assert_eq!(song.sources().len(), 1);
    }

    #[test]
    fn key_ignores_case_and_padding() {
        let a = Song::new("Teardrop ", "Massive Attack", "Mezzanine");
        let b = Song::new("teardrop", "MASSIVE ATTACK", "mezzanine");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn merge_unions_sources_in_first_seen_order() {
        let mut a = Song::new("Teardrop", "Massive Attack", "Mezzanine")
            .with_source(SourceKind::Local, "teardrop.mp3");
        let b = Song::new("Teardrop", "Massive Attack", "Mezzanine")
            .with_source(SourceKind::Spotify, "67Hna13dNDkZvBpTXRIaOJ")
            .with_duration(330_000);
        a.merge(b);

        let kinds: Vec<_> = a.sources().iter().map(|s| s.source).collect();
        assert_eq!(kinds, vec![SourceKind::Local, SourceKind::Spotify]);
        assert_eq!(a.duration_ms, Some(330_000));
    }
}
