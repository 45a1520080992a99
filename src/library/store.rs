//! Library file persistence
//!
//! The library is kept as JSON in `<cache_dir>/library.json`. Playlists refer to
//! songs by their position in the `songs` list of the same file. A file that
//! cannot be loaded is moved aside before anything new is saved over it.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Library, Playlist, Song};

pub const LIBRARY_FILE_NAME: &str = "library.json";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Failed to access library file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid library file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode library for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Playlist '{playlist}' refers to missing song #{index}")]
    MissingSong { playlist: String, index: usize },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    songs: Vec<Song>,
    #[serde(default)]
    playlists: Vec<PlaylistEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlaylistEntry {
    name: String,
    #[serde(default)]
    songs: Vec<usize>,
}

/// Reads and writes the library file
#[derive(Clone, Debug)]
pub struct LibraryStore {
    path: PathBuf,
}

impl LibraryStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(LIBRARY_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the library. A missing file is an empty library.
    pub fn load(&self) -> Result<Library, LibraryError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No library file yet, starting empty");
            return Ok(Library::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| LibraryError::Io {
            path: self.path.clone(),
            source,
        })?;
        let file: LibraryFile = serde_json::from_str(&content).map_err(|source| LibraryError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let mut library = Library::new();
        let positions: Vec<usize> = file.songs.into_iter().map(|song| library.add_song(song)).collect();

        for entry in file.playlists {
            let mut songs = Vec::with_capacity(entry.songs.len());
            for index in entry.songs {
                let position = positions.get(index).copied().ok_or_else(|| LibraryError::MissingSong {
                    playlist: entry.name.clone(),
                    index,
                })?;
                songs.push(library.songs()[position].clone());
            }
            library.add_playlist(Playlist::new(entry.name, songs));
        }

        library.rebuild();
        tracing::info!(
            songs = library.songs().len(),
            playlists = library.playlists().len(),
            "Library loaded"
        );
        Ok(library)
    }

    /// Move an existing library file to a timestamped `.bak` next to it so a
    /// later `save` cannot overwrite it. Returns the backup path, or `None`
    /// when there is no file.
    pub fn quarantine(&self) -> Result<Option<PathBuf>, LibraryError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let mut backup = self.path.with_extension(format!("json.{}.bak", stamp));
        let mut n = 1;
        while backup.exists() {
            backup = self.path.with_extension(format!("json.{}-{}.bak", stamp, n));
            n += 1;
        }

        fs::rename(&self.path, &backup).map_err(|source| LibraryError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::warn!(backup = %backup.display(), "Moved unreadable library file aside");
        Ok(Some(backup))
    }

    /// Write the library. The file is replaced in one rename so a failed
    /// write leaves the previous one intact.
    pub fn save(&self, library: &Library) -> Result<(), LibraryError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| LibraryError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let playlists = library
            .playlists()
            .iter()
            .map(|playlist| PlaylistEntry {
                name: playlist.name.clone(),
                songs: playlist
                    .songs
                    .iter()
                    .filter_map(|song| library.position_of(song))
                    .collect(),
            })
            .collect();
        let file = LibraryFile {
            songs: library.songs().to_vec(),
            playlists,
        };

        let content = serde_json::to_string_pretty(&file).map_err(|source| LibraryError::Encode {
            path: self.path.clone(),
            source,
        })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|source| LibraryError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| LibraryError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "Library saved");
        Ok(())
    }
}
