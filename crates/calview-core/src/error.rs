//! Centralized error types for the Calview application.
//!
//! Domain crates (auth, calendar) define their own error enums; everything
//! funnels into `AppError` at the application boundary so the UI layer can
//! show a single user-friendly message.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found")]
    NotFound,

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Google OAuth credentials are not configured")]
    CredentialsMissing,
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound => "Configuration file is missing.",
            ConfigError::ParseError(_) => "Configuration file is invalid.",
            ConfigError::InvalidValue { .. } => "A configuration value is invalid.",
            ConfigError::CredentialsMissing => {
                "Google OAuth is not set up. Add client credentials to the config file."
            }
        }
    }
}
