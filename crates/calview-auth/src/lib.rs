//! Google OAuth2 credential lifecycle for Calview.
//!
//! Covers the authorization-code flow, token refresh, persistent token
//! storage, and idempotent callback processing.

pub mod callback;
pub mod error;
pub mod google;
pub mod storage;

pub use callback::{authenticate, CallbackOutcome, CallbackParams, CallbackProcessor};
pub use error::AuthError;
pub use google::GoogleAuthProvider;
pub use storage::{TokenSet, TokenStore};
