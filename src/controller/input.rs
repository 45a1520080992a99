//! Key event handling

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MediaKeyCode};

use crate::player::MediaButton;
use super::AppController;

/// Media keys the terminal reports, mapped to session buttons
fn media_button(code: MediaKeyCode) -> Option<MediaButton> {
    match code {
        MediaKeyCode::Play => Some(MediaButton::Play),
        MediaKeyCode::Pause => Some(MediaButton::Pause),
        MediaKeyCode::PlayPause => Some(MediaButton::PlayPause),
        MediaKeyCode::TrackNext => Some(MediaButton::Next),
        MediaKeyCode::TrackPrevious => Some(MediaButton::Previous),
        MediaKeyCode::Stop => Some(MediaButton::Stop),
        _ => None,
    }
}

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        // Media keys work regardless of popups
        if let KeyCode::Media(code) = key.code {
            if let Some(button) = media_button(code) {
                self.media_button(button);
            }
            return Ok(());
        }

        let model = self.model.lock().await;

        // Handle error message first (blocks all other interactions)
        if model.has_error().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                model.clear_error().await;
            }
            return Ok(());
        }

        if model.is_help_popup_open().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('H')) {
                model.hide_help_popup().await;
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                model.set_should_quit(true).await;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                model.cycle_section().await;
            }
            KeyCode::Up => {
                model.move_selection_up().await;
            }
            KeyCode::Down => {
                model.move_selection_down().await;
            }
            KeyCode::Enter => {
                drop(model);
                self.activate_selection().await;
            }
            KeyCode::Backspace | KeyCode::Esc => {
                drop(model);
                self.navigate_back().await;
            }
            KeyCode::Char(' ') => {
                drop(model);
                self.toggle_playback();
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                drop(model);
                self.next_track();
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                drop(model);
                self.previous_track();
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                drop(model);
                self.stop();
            }
            KeyCode::Right => {
                drop(model);
                self.seek_forward().await;
            }
            KeyCode::Left => {
                drop(model);
                self.seek_backward().await;
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                drop(model);
                self.volume_up().await;
            }
            KeyCode::Char('-') => {
                drop(model);
                self.volume_down().await;
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                model.show_help_popup().await;
            }
            _ => {}
        }
        Ok(())
    }
}
