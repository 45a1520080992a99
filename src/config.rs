//! Application configuration
//!
//! Loaded from a JSON file (missing file means defaults), then overridden by
//! `BLADE_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = ".config/blade.json";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub spotify: SpotifySettings,

    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Overrides the "Blade (<host>)" device name
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpotifySettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Streaming bitrate in kbit/s: 96, 160 or 320
    #[serde(default = "default_bitrate")]
    pub bitrate: u16,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bitrate: default_bitrate(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            cache_dir: default_cache_dir(),
            log_dir: default_log_dir(),
            spotify: SpotifySettings::default(),
            volume: default_volume(),
            device_name: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` and the process environment
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.volume = config.volume.clamp(0.0, 1.0);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply `BLADE_*` overrides looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("BLADE_MUSIC_DIR") {
            self.music_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("BLADE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("BLADE_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(flag) = var("BLADE_SPOTIFY") {
            self.spotify.enabled = !matches!(flag.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
    }
}

// Default values
fn default_music_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".logs")
}

fn default_enabled() -> bool {
    true
}

fn default_bitrate() -> u16 {
    320
}

fn default_volume() -> f32 {
    1.0
}
