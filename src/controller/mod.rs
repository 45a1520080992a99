//! Controller module - Application logic and event handling
//!
//! - `input`: Key event handling
//! - `playback`: Transport controls sent to the media service
//! - `navigation`: Library screen navigation

mod input;
mod playback;
mod navigation;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::model::AppModel;
use crate::player::ServiceHandle;

#[derive(Clone)]
pub struct AppController {
    pub(crate) model: Arc<Mutex<AppModel>>,
    pub(crate) service: ServiceHandle,
}

impl AppController {
    pub fn new(model: Arc<Mutex<AppModel>>, service: ServiceHandle) -> Self {
        Self { model, service }
    }

    /// Show `error` in the error popup
    pub async fn report_error(&self, error: &anyhow::Error) {
        tracing::error!(error = %error, "Reporting error to the user");
        let message = Self::format_error(error);
        self.model.lock().await.set_error(message).await;
    }

    pub(crate) fn format_error(error: &anyhow::Error) -> String {
        let error_str = format!("{:#}", error);

        if error_str.contains("Invalid library file") || error_str.contains("refers to missing song") {
            // The outermost message says where the old file went, when it moved
            let outer = error.to_string();
            if outer.starts_with("Invalid library file") || outer.starts_with("Playlist") {
                "The library file is damaged; starting with an empty library.".to_string()
            } else {
                format!("The library file is damaged; starting with an empty library. {}.", outer)
            }
        } else if error_str.contains("401") {
            "Spotify authentication expired. Please restart the app.".to_string()
        } else if error_str.contains("403") {
            "Spotify refused the request. Check your Premium status.".to_string()
        } else if error_str.contains("429") {
            "Rate limited by Spotify. Please wait a moment.".to_string()
        } else {
            format!("Error: {}", error_str)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::library::{Library, Song, SourceKind};
    use crate::player::ServiceCommand;
    use super::*;

    pub(crate) fn library() -> Library {
        let mut library = Library::new();
        for (title, n) in [("Airbag", 1), ("Paranoid Android", 2), ("Subterranean Homesick Alien", 3)] {
            library.add_song(
                Song::new(title, "Radiohead", "OK Computer")
                    .with_source(SourceKind::Local, format!("ok/{}.flac", n))
                    .with_track_number(n),
            );
        }
        library.rebuild();
        library
    }

    pub(crate) fn controller(library: Library) -> (AppController, UnboundedReceiver<ServiceCommand>) {
        let (service, rx) = ServiceHandle::new();
        let model = AppModel::new(library, service.now_playing(), "Blade (test)".to_string());
        (AppController::new(Arc::new(Mutex::new(model)), service), rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotify_status_codes_get_friendly_messages() {
        let error = anyhow::anyhow!("http error: status code 429");
        assert!(AppController::format_error(&error).starts_with("Rate limited"));

        let error = anyhow::anyhow!("disk on fire");
        assert_eq!(AppController::format_error(&error), "Error: disk on fire");
    }

    #[test]
    fn damaged_library_message_names_the_backup() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let error = anyhow::Error::from(crate::library::LibraryError::Parse {
            path: "cache/library.json".into(),
            source,
        });
        assert_eq!(
            AppController::format_error(&error),
            "The library file is damaged; starting with an empty library."
        );

        let error = error.context("Old library kept as cache/library.json.20261019-140129.bak");
        assert_eq!(
            AppController::format_error(&error),
            "The library file is damaged; starting with an empty library. \
             Old library kept as cache/library.json.20261019-140129.bak."
        );
    }
}
