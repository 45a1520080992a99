//! Main application model with state management

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::library::Library;
use crate::player::NowPlaying;
use super::types::{ActiveSection, Category, UiState};
use super::playback::PlaybackInfo;
use super::content::{ContentState, ContentView, Selection};

const ERROR_DISPLAY_TIME: Duration = Duration::from_secs(5);

/// Main application model containing all state
pub struct AppModel {
    library: Arc<RwLock<Library>>,
    now_playing: Arc<Mutex<NowPlaying>>,
    device_name: String,
    pub ui_state: Arc<Mutex<UiState>>,
    pub content_state: Arc<Mutex<ContentState>>,
    pub should_quit: Arc<Mutex<bool>>,
}

impl AppModel {
    pub fn new(library: Library, now_playing: Arc<Mutex<NowPlaying>>, device_name: String) -> Self {
        let ui_state = UiState::default();
        let mut content_state = ContentState::default();
        content_state.show(ContentView::category(&library, ui_state.selected_category()));

        Self {
            library: Arc::new(RwLock::new(library)),
            now_playing,
            device_name,
            ui_state: Arc::new(Mutex::new(ui_state)),
            content_state: Arc::new(Mutex::new(content_state)),
            should_quit: Arc::new(Mutex::new(false)),
        }
    }

    pub fn library(&self) -> Arc<RwLock<Library>> {
        Arc::clone(&self.library)
    }

    // ========================================================================
    // Library
    // ========================================================================

    /// Swap in a freshly imported library and rebuild the category screen
    pub async fn replace_library(&self, library: Library) {
        let category = self.ui_state.lock().await.selected_category();
        let view = ContentView::category(&library, category);
        *self.library.write().await = library;
        self.content_state.lock().await.show(view);
    }

    pub async fn select_category(&self, index: usize) {
        let category = {
            let mut state = self.ui_state.lock().await;
            state.category_selected = index.min(Category::ALL.len() - 1);
            state.selected_category()
        };
        let view = ContentView::category(&*self.library.read().await, category);
        self.content_state.lock().await.show(view);
    }

    pub async fn open_selected(&self) -> Selection {
        self.content_state.lock().await.open_selected()
    }

    pub async fn navigate_back(&self) -> bool {
        self.content_state.lock().await.navigate_back()
    }

    pub async fn get_content_state(&self) -> ContentState {
        self.content_state.lock().await.clone()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub async fn get_playback_info(&self) -> PlaybackInfo {
        let now = self.now_playing.lock().await;
        PlaybackInfo::from_now_playing(&now, &self.device_name)
    }

    // ========================================================================
    // UI State
    // ========================================================================

    pub async fn should_quit(&self) -> bool {
        *self.should_quit.lock().await
    }

    pub async fn set_should_quit(&self, quit: bool) {
        *self.should_quit.lock().await = quit;
    }

    pub async fn get_ui_state(&self) -> UiState {
        self.ui_state.lock().await.clone()
    }

    pub async fn cycle_section(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.next();
    }

    pub async fn set_active_section(&self, section: ActiveSection) {
        self.ui_state.lock().await.active_section = section;
    }

    pub async fn move_selection_up(&self) {
        let state = self.ui_state.lock().await.clone();
        match state.active_section {
            ActiveSection::Categories => {
                if state.category_selected > 0 {
                    self.select_category(state.category_selected - 1).await;
                }
            }
            ActiveSection::MainContent => self.content_state.lock().await.move_up(),
        }
    }

    pub async fn move_selection_down(&self) {
        let state = self.ui_state.lock().await.clone();
        match state.active_section {
            ActiveSection::Categories => {
                if state.category_selected + 1 < Category::ALL.len() {
                    self.select_category(state.category_selected + 1).await;
                }
            }
            ActiveSection::MainContent => self.content_state.lock().await.move_down(),
        }
    }

    pub async fn set_error(&self, message: String) {
        let mut state = self.ui_state.lock().await;
        state.error_message = Some(message);
        state.error_timestamp = Some(Instant::now());
    }

    pub async fn clear_error(&self) {
        let mut state = self.ui_state.lock().await;
        state.error_message = None;
        state.error_timestamp = None;
    }

    pub async fn has_error(&self) -> bool {
        self.ui_state.lock().await.error_message.is_some()
    }

    pub async fn auto_clear_old_errors(&self) {
        let mut state = self.ui_state.lock().await;
        if let Some(timestamp) = state.error_timestamp {
            if timestamp.elapsed() >= ERROR_DISPLAY_TIME {
                state.error_message = None;
                state.error_timestamp = None;
            }
        }
    }

    pub async fn show_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = true;
    }

    pub async fn hide_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = false;
    }

    pub async fn is_help_popup_open(&self) -> bool {
        self.ui_state.lock().await.show_help_popup
    }
}
