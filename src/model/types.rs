//! Core type definitions for the UI

use std::time::Instant;

/// Which section of the UI is currently active/focused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSection {
    Categories,
    MainContent,
}

impl ActiveSection {
    pub fn next(self) -> Self {
        match self {
            ActiveSection::Categories => ActiveSection::MainContent,
            ActiveSection::MainContent => ActiveSection::Categories,
        }
    }
}

/// Top-level library screens
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Artists,
    Albums,
    Songs,
    Playlists,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Artists, Category::Albums, Category::Songs, Category::Playlists];

    pub fn name(self) -> &'static str {
        match self {
            Category::Artists => "Artists",
            Category::Albums => "Albums",
            Category::Songs => "Songs",
            Category::Playlists => "Playlists",
        }
    }
}

/// UI state for the application
#[derive(Clone, Debug)]
pub struct UiState {
    pub active_section: ActiveSection,
    pub category_selected: usize,
    pub error_message: Option<String>,
    pub error_timestamp: Option<Instant>,
    pub show_help_popup: bool,
}

impl UiState {
    pub fn selected_category(&self) -> Category {
        Category::ALL[self.category_selected.min(Category::ALL.len() - 1)]
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_section: ActiveSection::Categories,
            category_selected: 0,
            error_message: None,
            error_timestamp: None,
            show_help_popup: false,
        }
    }
}
