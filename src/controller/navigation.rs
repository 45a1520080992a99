//! Library navigation

use crate::model::{ActiveSection, Selection};

use super::AppController;

impl AppController {
    /// Enter on the focused list: a category moves focus to its screen,
    /// a container drills down, a song starts playback of its list.
    pub async fn activate_selection(&self) {
        let model = self.model.lock().await;
        let ui_state = model.get_ui_state().await;

        if ui_state.active_section == ActiveSection::Categories {
            model.set_active_section(ActiveSection::MainContent).await;
            return;
        }

        match model.open_selected().await {
            Selection::Play { songs, index } => {
                drop(model);
                self.play_songs(songs, index);
            }
            Selection::Opened => tracing::debug!("Opened library item"),
            Selection::Nothing => {}
        }
    }

    pub async fn navigate_back(&self) {
        let model = self.model.lock().await;
        if !model.navigate_back().await {
            model.set_active_section(ActiveSection::Categories).await;
        }
    }

    fn play_songs(&self, songs: Vec<crate::library::Song>, index: usize) {
        tracing::info!(
            song = songs.get(index).map(|s| s.title.as_str()).unwrap_or_default(),
            playlist_len = songs.len(),
            "Playing from library"
        );
        self.service.play_playlist(songs, index);
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::testing;
    use crate::model::ActiveSection;
    use crate::player::ServiceCommand;

    #[tokio::test]
    async fn selecting_a_song_plays_its_album_from_there() {
        let (controller, mut rx) = testing::controller(testing::library());

        // Artists screen -> Radiohead -> OK Computer -> second track
        controller.activate_selection().await;
        controller.activate_selection().await;
        controller.activate_selection().await;
        controller.model.lock().await.content_state.lock().await.move_down();
        controller.activate_selection().await;

        match rx.try_recv() {
            Ok(ServiceCommand::SetPlaylist { songs, index, play }) => {
                assert_eq!(songs.len(), 3);
                assert_eq!(index, 1);
                assert_eq!(songs[index].title, "Paranoid Android");
                assert!(play);
            }
            other => panic!("expected a playlist, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn back_from_the_top_screen_returns_to_categories() {
        let (controller, _rx) = testing::controller(testing::library());
        controller.activate_selection().await;
        controller.activate_selection().await;

        controller.navigate_back().await;
        let model = controller.model.lock().await;
        assert_eq!(model.get_ui_state().await.active_section, ActiveSection::MainContent);
        assert_eq!(model.get_content_state().await.depth(), 1);
        drop(model);

        controller.navigate_back().await;
        let ui_state = controller.model.lock().await.get_ui_state().await;
        assert_eq!(ui_state.active_section, ActiveSection::Categories);
    }
}
