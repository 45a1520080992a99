//! Sources module - one source player per playback backend
//!
//! - `local`: audio files decoded with symphonia
//! - `spotify`: librespot session, player and Web API import

pub mod local;
pub mod spotify;

pub use local::LocalPlayer;
pub use spotify::{SpotifyClient, SpotifyPlayer, SpotifySession};
