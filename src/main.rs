mod audio;
mod auth;
mod config;
mod controller;
mod library;
mod logging;
mod model;
mod player;
mod sources;
mod view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use std::time::{Duration, Instant};
use clap::Parser;
use tokio::sync::Mutex;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use rspotify::{AuthCodeSpotify, Config, Token};

use audio::{CpalOutput, OutputDevice, PcmSink};
use auth::AuthResult;
use config::{AppConfig, DEFAULT_CONFIG_PATH};
use controller::AppController;
use library::{Library, LibraryStore};
use model::AppModel;
use player::{PlaybackCoordinator, MediaService, ServiceHandle, SourcePlayer, TransportCommand};
use sources::{LocalPlayer, SpotifyClient, SpotifyPlayer, SpotifySession};
use view::AppView;

const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Terminal music player for local files and Spotify
#[derive(Parser, Debug)]
#[command(name = "blade", version, about)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, env = "BLADE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!(config = %args.config.display(), "=== Blade Starting ===");

    let store = LibraryStore::new(&config.cache_dir);
    // `store` is dropped from the import when the old file could not be kept
    let (library, load_error, store) = match store.load() {
        Ok(library) => (library, None, Some(store)),
        Err(e) => {
            tracing::error!(error = %e, "Could not load library, starting empty");
            let error = anyhow::Error::from(e);
            match store.quarantine() {
                Ok(Some(backup)) => {
                    let error = error.context(format!("Old library kept as {}", backup.display()));
                    (Library::new(), Some(error), Some(store))
                }
                Ok(None) => (Library::new(), Some(error), Some(store)),
                Err(move_error) => {
                    tracing::error!(error = %move_error, "Library file left in place; imports will not be saved");
                    (Library::new(), Some(error), None)
                }
            }
        }
    };
    tracing::info!(songs = library.songs().len(), playlists = library.playlists().len(), "Library loaded");

    // Authorise before the TUI takes the terminal: the browser flow prints to it
    let spotify_auth = if config.spotify.enabled {
        match auth::perform_oauth_flow(&config.cache_dir).await {
            Ok(auth) => Some(auth),
            Err(e) => {
                tracing::error!(error = %e, "Spotify authorisation failed, continuing without Spotify");
                None
            }
        }
    } else {
        None
    };

    // Playback: one device, one sink per backend, one coordinator
    let (service, inbox) = ServiceHandle::new();
    let device: Arc<dyn OutputDevice> = Arc::new(CpalOutput);

    let mut players: Vec<Box<dyn SourcePlayer>> = vec![Box::new(LocalPlayer::new(
        &config.music_dir,
        PcmSink::shared(Arc::clone(&device)),
        service.event_sender(),
    ))];

    let session = SpotifySession::new(config.device_name.clone());
    if spotify_auth.is_some() {
        players.push(Box::new(SpotifyPlayer::new(
            session.clone(),
            sources::spotify::bitrate(config.spotify.bitrate),
            PcmSink::shared(Arc::clone(&device)),
            service.event_sender(),
        )));
    }

    let media_service = MediaService::new(PlaybackCoordinator::new(players), &service, inbox);
    let service_task = tokio::spawn(media_service.run());
    service.transport(TransportCommand::SetVolume(config.volume));

    let app_model = AppModel::new(library, service.now_playing(), session.device_name().to_string());
    let model = Arc::new(Mutex::new(app_model));
    let controller = AppController::new(Arc::clone(&model), service.clone());

    if let Some(e) = load_error {
        controller.report_error(&e).await;
    }

    let spotify_client: Arc<Mutex<Option<SpotifyClient>>> = Arc::new(Mutex::new(None));
    if let Some(auth) = spotify_auth {
        let init = SpotifyInit {
            auth,
            session,
            store,
            cache_dir: config.cache_dir.clone(),
            controller: controller.clone(),
            client_slot: Arc::clone(&spotify_client),
        };
        tokio::spawn(init.run());
    }

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, model, controller, spotify_client).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    service.shutdown();
    if let Err(e) = service_task.await {
        tracing::error!(error = %e, "Media service task failed");
    }

    tracing::info!("Blade shutting down");
    Ok(())
}

/// Background Spotify start-up: librespot login, then the library import
struct SpotifyInit {
    auth: AuthResult,
    session: SpotifySession,
    store: Option<LibraryStore>,
    cache_dir: PathBuf,
    controller: AppController,
    client_slot: Arc<Mutex<Option<SpotifyClient>>>,
}

impl SpotifyInit {
    async fn run(self) {
        if !self.session.login(self.auth.librespot_credentials.clone()).await {
            let error = anyhow::anyhow!("Could not connect to Spotify; Spotify songs will not play");
            self.controller.report_error(&error).await;
        }

        let client = SpotifyClient::new(setup_rspotify(self.auth.rspotify_token()).await, &self.auth, self.cache_dir);
        *self.client_slot.lock().await = Some(client.clone());

        let library = {
            let model = self.controller.model.lock().await;
            model.library()
        };
        let mut merged = library.read().await.clone();

        match client.import_into(&mut merged).await {
            Ok(_) => {
                match &self.store {
                    Some(store) => {
                        if let Err(e) = store.save(&merged) {
                            tracing::error!(error = %e, "Could not save library");
                        }
                    }
                    None => tracing::warn!("Not saving the imported library over the unreadable file"),
                }
                self.controller.model.lock().await.replace_library(merged).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Spotify library import failed, keeping cached library");
                self.controller.report_error(&e).await;
            }
        }
    }
}

async fn setup_rspotify(access_token: Token) -> AuthCodeSpotify {
    let spotify = AuthCodeSpotify::with_config(
        Default::default(),
        Default::default(),
        Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        },
    );

    if let Ok(mut token) = spotify.token.lock().await {
        *token = Some(access_token);
    }
    tracing::debug!("rspotify token set");
    spotify
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<Mutex<AppModel>>,
    controller: AppController,
    spotify_client: Arc<Mutex<Option<SpotifyClient>>>,
) -> io::Result<()> {
    let mut last_token_check = Instant::now();

    loop {
        if last_token_check.elapsed() >= TOKEN_CHECK_INTERVAL {
            last_token_check = Instant::now();

            if let Some(spotify) = spotify_client.lock().await.clone() {
                tokio::spawn(async move {
                    if let Err(e) = spotify.refresh_token_if_needed().await {
                        tracing::warn!("Token refresh check failed: {}", e);
                    }
                });
            }
        }

        // Get current state
        let (playback, current_song, ui_state, content_state, should_quit) = {
            let model_guard = model.lock().await;

            model_guard.auto_clear_old_errors().await;

            (
                model_guard.get_playback_info().await,
                controller.service.now_playing().lock().await.song.clone(),
                model_guard.get_ui_state().await,
                model_guard.get_content_state().await,
                model_guard.should_quit().await,
            )
        };

        terminal.draw(|f| {
            AppView::render(f, &playback, current_song.as_ref(), &ui_state, &content_state);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    controller.report_error(&e).await;
                }
            }
        }

        if should_quit {
            break;
        }
    }

    Ok(())
}
