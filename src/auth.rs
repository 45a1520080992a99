use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use chrono::{DateTime, Utc};
use anyhow::{Context, Result};
use std::collections::HashSet;

use rspotify::Token;
use librespot::core::authentication::Credentials;
use librespot_oauth::{OAuthClient, OAuthClientBuilder, OAuthToken};

const SPOTIFY_CLIENT_ID: &str = "492e1e45ea814fa3ac555fe1576aaf5b";
const SPOTIFY_REDIRECT_URI: &str = "http://127.0.0.1:8898/login";
pub const SCOPES: &str =
    "streaming user-read-playback-state user-modify-playback-state user-read-currently-playing playlist-read-private playlist-read-collaborative user-library-read";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Blade</title></head>
<body><h1>Blade is connected to Spotify</h1><script>window.close();</script></body>
</html>
"#;
const REFRESH_TOKEN_FILE: &str = "refresh_token";

#[derive(Clone)]
pub struct AuthResult {
    pub librespot_credentials: Credentials,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthResult {
    fn from_token(token: OAuthToken) -> Self {
        Self {
            librespot_credentials: Credentials::with_access_token(token.access_token.clone()),
            expires_at: expiry(token.expires_at),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        }
    }

    pub fn rspotify_token(&self) -> Token {
        rspotify_token(self.access_token.clone(), self.expires_at)
    }
}

pub fn rspotify_token(access_token: String, expires_at: DateTime<Utc>) -> Token {
    Token {
        access_token,
        expires_in: chrono::Duration::seconds(3600),
        expires_at: Some(expires_at),
        scopes: SCOPES
            .split_whitespace()
            .map(|s| s.to_string())
            .collect::<HashSet<String>>(),
        refresh_token: None,
    }
}

fn expiry(expires_at: Instant) -> DateTime<Utc> {
    let remaining = expires_at.saturating_duration_since(Instant::now());
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::seconds(3600))
}

pub fn refresh_token_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(REFRESH_TOKEN_FILE)
}

/// Persist the refresh token so the next start skips the browser
pub fn save_refresh_token(cache_dir: &Path, refresh_token: &str) {
    let result = fs::create_dir_all(cache_dir).and_then(|_| fs::write(refresh_token_path(cache_dir), refresh_token));
    match result {
        Ok(()) => tracing::debug!("Saved refresh token to disk"),
        Err(e) => tracing::warn!(error = %e, "Could not save refresh token"),
    }
}

fn oauth_client(open_in_browser: bool) -> Result<OAuthClient> {
    let mut builder = OAuthClientBuilder::new(
        SPOTIFY_CLIENT_ID,
        SPOTIFY_REDIRECT_URI,
        SCOPES.split_whitespace().collect(),
    );
    if open_in_browser {
        builder = builder.open_in_browser().with_custom_message(RESPONSE);
    }
    builder.build().context("Failed to build OAuth client")
}

async fn perform_browser_auth() -> Result<OAuthToken> {
    tracing::info!("Starting browser-based OAuth flow");
    let token = oauth_client(true)?
        .get_access_token_async()
        .await
        .context("Failed to get token")?;
    tracing::info!("Browser authentication completed successfully");
    Ok(token)
}

/// Exchange `refresh_token` for a fresh access token
pub async fn refresh_access_token(refresh_token: &str) -> Result<AuthResult> {
    let token = oauth_client(false)?
        .refresh_token_async(refresh_token)
        .await
        .context("Failed to refresh token")?;
    tracing::debug!("Token refreshed successfully");
    Ok(AuthResult::from_token(token))
}

/// Authorise Blade with Spotify: refresh the stored token, or fall back to
/// the browser flow when there is none or it was revoked.
pub async fn perform_oauth_flow(cache_dir: &Path) -> Result<AuthResult> {
    let stored_refresh_token = fs::read_to_string(refresh_token_path(cache_dir))
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let auth = match stored_refresh_token {
        Some(refresh_token) => {
            tracing::info!("Found stored refresh token");
            match refresh_access_token(&refresh_token).await {
                Ok(auth) => auth,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored refresh token failed, re-authenticating");
                    AuthResult::from_token(perform_browser_auth().await?)
                }
            }
        }
        None => {
            tracing::info!("No stored refresh token, starting browser authentication");
            AuthResult::from_token(perform_browser_auth().await?)
        }
    };

    save_refresh_token(cache_dir, &auth.refresh_token);
    Ok(auth)
}
