//! Library module - songs from every source behind one model
//!
//! - `model`: Song, Album, Artist, Playlist and the per-source identifiers
//! - `store`: JSON persistence of the library file

mod model;
mod store;

use std::collections::HashMap;

pub use model::{Album, Artist, LibraryObject, Playlist, Song, SongKey, SourceInformation, SourceKind};
pub use store::{LibraryError, LibraryStore};

/// In-memory library. Artists and albums are derived from the songs.
#[derive(Clone, Debug, Default)]
pub struct Library {
    songs: Vec<Song>,
    playlists: Vec<Playlist>,
    albums: Vec<Album>,
    artists: Vec<Artist>,
    index: HashMap<SongKey, usize>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a song, merging it into an existing entry when the same song is
    /// already known from another source. Returns the song's position.
    ///
    /// Call [`Library::rebuild`] once a batch of songs has been added.
    pub fn add_song(&mut self, mut song: Song) -> usize {
        song.dedup_sources();
        let key = song.key();
        if let Some(&position) = self.index.get(&key) {
            self.songs[position].merge(song);
            return position;
        }
        let position = self.songs.len();
        self.index.insert(key, position);
        self.songs.push(song);
        position
    }

    pub fn add_playlist(&mut self, playlist: Playlist) {
        match self.playlists.iter_mut().find(|p| p.name == playlist.name) {
            Some(existing) => *existing = playlist,
            None => self.playlists.push(playlist),
        }
    }

    /// Recompute albums and artists, and point playlist entries at the merged songs
    pub fn rebuild(&mut self) {
        for playlist in &mut self.playlists {
            for song in &mut playlist.songs {
                if let Some(&position) = self.index.get(&song.key()) {
                    *song = self.songs[position].clone();
                }
            }
        }

        let mut albums: HashMap<(String, String), Album> = HashMap::new();
        for song in &self.songs {
            let key = (song.artist.to_lowercase(), song.album.to_lowercase());
            albums
                .entry(key)
                .or_insert_with(|| Album {
                    name: song.album.clone(),
                    artist: song.artist.clone(),
                    songs: Vec::new(),
                })
                .songs
                .push(song.clone());
        }

        let mut albums: Vec<Album> = albums.into_values().collect();
        for album in &mut albums {
            album.songs.sort_by(|a, b| {
                a.track_number
                    .unwrap_or(u32::MAX)
                    .cmp(&b.track_number.unwrap_or(u32::MAX))
                    .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            });
        }
        albums.sort_by_key(|a| (a.name.to_lowercase(), a.artist.to_lowercase()));

        let mut artists: HashMap<String, Artist> = HashMap::new();
        for album in &albums {
            artists
                .entry(album.artist.to_lowercase())
                .or_insert_with(|| Artist {
                    name: album.artist.clone(),
                    albums: Vec::new(),
                })
                .albums
                .push(album.clone());
        }
        let mut artists: Vec<Artist> = artists.into_values().collect();
        artists.sort_by_key(|a| a.name.to_lowercase());

        self.albums = albums;
        self.artists = artists;
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Songs sorted by title, as listed on the library screen
    pub fn sorted_songs(&self) -> Vec<Song> {
        let mut songs = self.songs.clone();
        songs.sort_by_key(|s| s.title.to_lowercase());
        songs
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn position_of(&self, song: &Song) -> Option<usize> {
        self.index.get(&song.key()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_library() -> Library {
        let mut library = Library::new();
        library.add_song(
            Song::new("Angel", "Massive Attack", "Mezzanine")
                .with_track_number(2)
                .with_source(SourceKind::Local, "angel.flac"),
        );
        library.add_song(
            Song::new("Teardrop", "Massive Attack", "Mezzanine")
                .with_track_number(1)
                .with_source(SourceKind::Local, "teardrop.flac"),
        );
        library.add_song(
            Song::new("teardrop", "massive attack", "mezzanine")
                .with_source(SourceKind::Spotify, "67Hna13dNDkZvBpTXRIaOJ"),
        );
        library.add_song(Song::new("Glory Box", "Portishead", "Dummy").with_source(SourceKind::Spotify, "3Ty7OTBNSigG"));
        library.add_playlist(Playlist::new(
            "Trip hop",
            vec![Song::new("Teardrop", "Massive Attack", "Mezzanine")],
        ));
        library.rebuild();
        library
    }

    #[test]
    fn same_song_from_two_sources_is_merged() {
        let library = sample_library();
        assert_eq!(library.songs().len(), 3);

        let teardrop = &library.songs()[1];
        assert_eq!(teardrop.source_id(SourceKind::Local), Some("teardrop.flac"));
        assert_eq!(teardrop.source_id(SourceKind::Spotify), Some("67Hna13dNDkZvBpTXRIaOJ"));
    }

    #[test]
    fn albums_and_artists_are_derived_and_sorted() {
        let library = sample_library();

        let names: Vec<_> = library.artists().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Massive Attack", "Portishead"]);

        let mezzanine = &library.artists()[0].albums[0];
        assert_eq!(mezzanine.name, "Mezzanine");
        let titles: Vec<_> = mezzanine.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Teardrop", "Angel"]);
    }

    #[test]
    fn playlist_entries_point_at_merged_songs() {
        let library = sample_library();
        let song = &library.playlists()[0].songs[0];
        assert!(song.is_playable_by(SourceKind::Local));
        assert!(song.is_playable_by(SourceKind::Spotify));
    }

    #[test]
    fn re_adding_a_playlist_replaces_it() {
        let mut library = sample_library();
        library.add_playlist(Playlist::new("Trip hop", Vec::new()));
        assert_eq!(library.playlists().len(), 1);
        assert!(library.playlists()[0].songs.is_empty());
    }
}
