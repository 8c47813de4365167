//! Authenticated request wrapper with a single transparent refresh-retry.

use calview_auth::{GoogleAuthProvider, TokenStore};

use crate::error::CalendarError;

/// Wraps outbound API calls with bearer authentication and exactly one
/// 401-triggered token refresh per logical call.
#[derive(Debug, Clone)]
pub struct AuthFetcher {
    http: reqwest::Client,
    store: TokenStore,
    provider: GoogleAuthProvider,
}

impl AuthFetcher {
    pub fn new(store: TokenStore, provider: GoogleAuthProvider) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            provider,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Build, authenticate, and send a request.
    ///
    /// The builder may be invoked twice: once with the current access token
    /// and, after a 401 and a successful refresh, once more with the new
    /// token. A second 401 surfaces as `AuthRequired`; the refresh budget is
    /// never spent more than once per call.
    pub async fn call<F>(&self, build: F) -> Result<reqwest::Response, CalendarError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut retried = false;
        let mut access = match self.store.get().access_token {
            Some(token) => token,
            None => {
                // No access token at all: spend the refresh budget up front.
                retried = true;
                self.refresh().await?
            }
        };

        loop {
            let response = build(&self.http).bearer_auth(&access).send().await?;
            let status = response.status();

            if status.as_u16() == 401 {
                if retried {
                    return Err(CalendarError::AuthRequired);
                }
                retried = true;
                access = self.refresh().await?;
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(CalendarError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }

    async fn refresh(&self) -> Result<String, CalendarError> {
        let refresh_token = self
            .store
            .get()
            .refresh_token
            .ok_or(CalendarError::AuthRequired)?;

        self.provider
            .refresh_access_token(&self.store, &refresh_token)
            .await
            .map_err(|e| {
                tracing::warn!("Token refresh failed: {}", e);
                CalendarError::AuthRequired
            })
    }
}
