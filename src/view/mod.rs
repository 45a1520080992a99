//! View module - UI rendering
//!
//! - `utils`: Shared utility functions (formatting, scrollable lists)
//! - `layout`: Top bar and category sidebar
//! - `content`: The current library screen
//! - `progress`: Progress bar rendering
//! - `overlays`: Modal overlays (error, help)

mod utils;
mod layout;
mod content;
mod progress;
mod overlays;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::library::Song;
use crate::model::{ContentState, PlaybackInfo, UiState};

pub struct AppView;

impl AppView {
    pub fn render(
        frame: &mut Frame,
        playback: &PlaybackInfo,
        current_song: Option<&Song>,
        ui_state: &UiState,
        content_state: &ContentState,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Location + device
                Constraint::Min(0),    // Sidebar + library screen
                Constraint::Length(3), // Progress bar with playback info
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], content_state, &playback.device_name);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(70),
            ])
            .split(chunks[1]);

        layout::render_sidebar(frame, main_chunks[0], ui_state);
        content::render_main_content(frame, main_chunks[1], ui_state, content_state, current_song);

        progress::render_progress_bar(frame, chunks[2], playback);

        if ui_state.error_message.is_some() {
            overlays::render_error_notification(frame, ui_state);
        }

        if ui_state.show_help_popup {
            overlays::render_help_popup(frame);
        }
    }
}
