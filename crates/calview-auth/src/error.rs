//! Auth-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token endpoint returned {status}: {message}")]
    TokenEndpoint { status: u16, message: String },

    #[error("Authorization was denied: {0}")]
    Provider(String),

    #[error("OAuth callback is missing the authorization code")]
    MissingCode,

    #[error("OAuth state parameter mismatch")]
    StateMismatch,

    #[error("OAuth callback channel closed before a code arrived")]
    CallbackClosed,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::TokenEndpoint { .. } => {
                "Google rejected the sign-in request. Please try again.".to_string()
            }
            Self::Provider(reason) => format!("Sign-in was denied: {}", reason),
            Self::MissingCode | Self::CallbackClosed => {
                "Sign-in did not complete. Please try again.".to_string()
            }
            Self::StateMismatch => "Sign-in response could not be verified.".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Internal(_) => "An unexpected error occurred during sign-in.".to_string(),
        }
    }
}
