//! Calendar-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    /// No usable refresh token, or the single refresh attempt failed.
    #[error("Authentication required")]
    AuthRequired,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl CalendarError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired => "Please sign in to your Google account".to_string(),
            Self::Api { status, .. } => format!("Calendar request failed ({})", status),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }

    /// Whether the caller should route the user back to sign-in.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }
}
