//! Google OAuth2 token-endpoint client for Calendar access.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::storage::{TokenSet, TokenStore};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Token endpoint response. Extra fields (expires_in, scope) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// JSON body for the authorization-code exchange.
#[derive(Debug, Serialize)]
struct CodeExchangeRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'static str,
}

/// JSON body for the refresh-token exchange.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct GoogleAuthProvider {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
}

impl GoogleAuthProvider {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http: reqwest::Client::new(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Override provider endpoints (used by tests with a mock server).
    pub fn with_endpoints(mut self, auth_url: &str, token_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.token_url = token_url.to_string();
        self
    }

    /// Authorization URL the browser navigates to. The `state` value should
    /// be verified when the callback arrives.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&include_granted_scopes=true&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens and persist them.
    ///
    /// On any failure the store is left untouched.
    #[tracing::instrument(skip(self, store, code), level = "info")]
    pub async fn exchange_code(
        &self,
        store: &TokenStore,
        code: &str,
    ) -> Result<TokenSet, AuthError> {
        let body = CodeExchangeRequest {
            code,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: &self.redirect_uri,
            grant_type: "authorization_code",
        };

        let response = self.http.post(&self.token_url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::error!("Code exchange failed with {}: {}", status, message);
            return Err(AuthError::TokenEndpoint { status, message });
        }

        let tokens: GoogleTokenResponse = response.json().await?;
        store.set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())?;

        tracing::info!("Authorization code exchanged and tokens stored");
        Ok(TokenSet {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
        })
    }

    /// Obtain a new access token from a refresh token and persist it.
    ///
    /// Only the access token is written; the refresh token is never rotated
    /// here. On failure the store is left untouched.
    #[tracing::instrument(skip(self, store, refresh_token), level = "info")]
    pub async fn refresh_access_token(
        &self,
        store: &TokenStore,
        refresh_token: &str,
    ) -> Result<String, AuthError> {
        let body = RefreshRequest {
            refresh_token,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            grant_type: "refresh_token",
        };

        let response = self.http.post(&self.token_url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::error!("Token refresh failed with {}: {}", status, message);
            return Err(AuthError::TokenEndpoint { status, message });
        }

        let tokens: GoogleTokenResponse = response.json().await?;
        store.set_access_token(&tokens.access_token)?;

        tracing::info!("Access token refreshed");
        Ok(tokens.access_token)
    }
}
