//! Library screens and the drill-down navigation stack

use crate::library::{Library, LibraryObject, Song};
use super::types::Category;

/// One library screen: a titled list of library objects
#[derive(Clone, Debug, PartialEq)]
pub struct ContentView {
    pub title: String,
    pub items: Vec<LibraryObject>,
    pub selected_index: usize,
}

impl ContentView {
    pub fn new(title: impl Into<String>, items: Vec<LibraryObject>) -> Self {
        Self {
            title: title.into(),
            items,
            selected_index: 0,
        }
    }

    pub fn category(library: &Library, category: Category) -> Self {
        let items = match category {
            Category::Artists => library.artists().iter().cloned().map(LibraryObject::Artist).collect(),
            Category::Albums => library.albums().iter().cloned().map(LibraryObject::Album).collect(),
            Category::Songs => library.sorted_songs().into_iter().map(LibraryObject::Song).collect(),
            Category::Playlists => library.playlists().iter().cloned().map(LibraryObject::Playlist).collect(),
        };
        Self::new(category.name(), items)
    }

    pub fn selected(&self) -> Option<&LibraryObject> {
        self.items.get(self.selected_index)
    }

    /// Songs listed on this screen, in display order
    pub fn songs(&self) -> Vec<Song> {
        self.items
            .iter()
            .filter_map(|item| match item {
                LibraryObject::Song(song) => Some(song.clone()),
                _ => None,
            })
            .collect()
    }
}

/// What opening the selected item leads to
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// A deeper screen was pushed
    Opened,
    /// Play `songs` starting at `index`
    Play { songs: Vec<Song>, index: usize },
    Nothing,
}

/// Stack of screens; the last one is displayed
#[derive(Clone, Debug, Default)]
pub struct ContentState {
    stack: Vec<ContentView>,
}

impl ContentState {
    pub fn current(&self) -> Option<&ContentView> {
        self.stack.last()
    }

    fn current_mut(&mut self) -> Option<&mut ContentView> {
        self.stack.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Replace the whole stack with a top-level screen
    pub fn show(&mut self, view: ContentView) {
        self.stack = vec![view];
    }

    pub fn push(&mut self, view: ContentView) {
        self.stack.push(view);
    }

    /// Pop one screen. The top-level screen stays.
    pub fn navigate_back(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    pub fn move_up(&mut self) {
        if let Some(view) = self.current_mut() {
            view.selected_index = view.selected_index.saturating_sub(1);
        }
    }

    pub fn move_down(&mut self) {
        if let Some(view) = self.current_mut() {
            if view.selected_index + 1 < view.items.len() {
                view.selected_index += 1;
            }
        }
    }

    /// Open the selected item: drill into containers, play songs
    pub fn open_selected(&mut self) -> Selection {
        let Some(view) = self.current() else {
            return Selection::Nothing;
        };
        let Some(item) = view.selected().cloned() else {
            return Selection::Nothing;
        };

        match item {
            LibraryObject::Artist(artist) => {
                let albums = artist.albums.into_iter().map(LibraryObject::Album).collect();
                self.push(ContentView::new(artist.name, albums));
                Selection::Opened
            }
            LibraryObject::Album(album) => {
                let songs = album.songs.into_iter().map(LibraryObject::Song).collect();
                self.push(ContentView::new(album.name, songs));
                Selection::Opened
            }
            LibraryObject::Playlist(playlist) => {
                let songs = playlist.songs.into_iter().map(LibraryObject::Song).collect();
                self.push(ContentView::new(playlist.name, songs));
                Selection::Opened
            }
            LibraryObject::Song(song) => {
                let songs = view.songs();
                let index = songs.iter().position(|s| *s == song).unwrap_or(0);
                Selection::Play { songs, index }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{Playlist, SourceKind};

    fn library() -> Library {
        let mut library = Library::new();
        for (title, album, n) in [("Intro", "First", 1), ("Outro", "First", 2), ("Single", "Second", 1)] {
            library.add_song(
                Song::new(title, "Band", album)
                    .with_source(SourceKind::Local, format!("{}.flac", title))
                    .with_track_number(n),
            );
        }
        library.add_playlist(Playlist::new(
            "Mix",
            vec![Song::new("Single", "Band", "Second"), Song::new("Intro", "Band", "First")],
        ));
        library.rebuild();
        library
    }

    #[test]
    fn artist_drills_down_to_album_songs_and_back() {
        let library = library();
        let mut content = ContentState::default();
        content.show(ContentView::category(&library, Category::Artists));

        assert_eq!(content.open_selected(), Selection::Opened);
        assert_eq!(content.current().unwrap().title, "Band");
        assert_eq!(content.current().unwrap().items.len(), 2);

        assert_eq!(content.open_selected(), Selection::Opened);
        let album = content.current().unwrap();
        assert_eq!(album.title, "First");
        assert_eq!(album.songs().iter().map(|s| s.title.as_str()).collect::<Vec<_>>(), ["Intro", "Outro"]);

        assert!(content.navigate_back());
        assert!(content.navigate_back());
        assert!(!content.navigate_back());
        assert_eq!(content.depth(), 1);
    }

    #[test]
    fn selecting_a_song_plays_the_displayed_list_from_it() {
        let library = library();
        let mut content = ContentState::default();
        content.show(ContentView::category(&library, Category::Playlists));
        content.open_selected();
        content.move_down();

        match content.open_selected() {
            Selection::Play { songs, index } => {
                assert_eq!(index, 1);
                assert_eq!(songs[index].title, "Intro");
                assert!(songs[index].is_playable_by(SourceKind::Local));
            }
            other => panic!("expected playback, got {:?}", other),
        }
    }

    #[test]
    fn selection_stays_inside_the_list() {
        let library = library();
        let mut content = ContentState::default();
        content.show(ContentView::category(&library, Category::Songs));

        content.move_up();
        assert_eq!(content.current().unwrap().selected_index, 0);
        for _ in 0..10 {
            content.move_down();
        }
        assert_eq!(content.current().unwrap().selected_index, 2);
    }

    #[test]
    fn empty_screens_open_nothing() {
        let mut content = ContentState::default();
        assert_eq!(content.open_selected(), Selection::Nothing);

        content.show(ContentView::category(&Library::new(), Category::Albums));
        assert_eq!(content.open_selected(), Selection::Nothing);
    }
}
