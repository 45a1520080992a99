//! Model module - Application state and data types
//!
//! - `types`: Core type definitions (sections, categories, UI state)
//! - `playback`: What the now-playing bar shows
//! - `content`: Library screens and the navigation stack
//! - `app_model`: Main application model with state management methods

mod types;
mod playback;
mod content;
mod app_model;

pub use types::{ActiveSection, Category, UiState};
pub use playback::{PlaybackInfo, TrackMetadata};
pub use content::{ContentState, ContentView, Selection};
pub use app_model::AppModel;
