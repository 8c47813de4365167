use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Token set for OAuth2 authentication.
///
/// Either field may be absent: the access token can be missing or stale at
/// any time, and the refresh token only exists after a completed sign-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token for API requests
    pub access_token: Option<String>,

    /// Refresh token for token renewal; kept until explicit sign-out
    pub refresh_token: Option<String>,
}

/// File-backed store for OAuth tokens.
///
/// The only writer of token values. Both tokens live in a single JSON file
/// so `clear()` removes them in one observable step.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store at the default location under the user config directory.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("calview");

        Ok(Self {
            path: config_dir.join("tokens.json"),
        })
    }

    /// Store backed by an explicit file path (used by tests).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the current token set. Missing file or fields are reported as
    /// absent values, never as an error.
    pub fn get(&self) -> TokenSet {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(_) => return TokenSet::default(),
        };

        match serde_json::from_str(&json) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Discarding unreadable token file: {}", e);
                TokenSet::default()
            }
        }
    }

    /// Overwrite only the access token, leaving the refresh token in place.
    pub fn set_access_token(&self, access_token: &str) -> Result<()> {
        let mut tokens = self.get();
        tokens.access_token = Some(access_token.to_string());
        self.write(&tokens)
    }

    /// Store a freshly exchanged token pair. An absent refresh token leaves
    /// any previously stored one untouched.
    pub fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let mut tokens = self.get();
        tokens.access_token = Some(access_token.to_string());
        if let Some(refresh) = refresh_token {
            tokens.refresh_token = Some(refresh.to_string());
        }
        self.write(&tokens)
    }

    /// Remove both tokens (sign-out). Single file removal, so no reader can
    /// observe one token cleared and the other not.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to delete token file")?;
            tracing::info!("Cleared stored tokens");
        }
        Ok(())
    }

    /// Whether a sign-in has completed (a refresh token is present).
    pub fn is_signed_in(&self) -> bool {
        self.get().refresh_token.is_some()
    }

    fn write(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create tokens directory")?;
        }

        let json = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

        fs::write(&self.path, json).context("Failed to write token file")?;
        tracing::debug!("Stored tokens at {:?}", self.path);
        Ok(())
    }
}
