//! OAuth callback processing and the interactive sign-in flow.
//!
//! Callback processing is idempotent: the same authorization code arriving
//! twice (page re-render, duplicate delivery) triggers exactly one token
//! exchange.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use warp::Filter;

use crate::error::AuthError;
use crate::google::GoogleAuthProvider;
use crate::storage::{TokenSet, TokenStore};

/// Query parameters carried by the OAuth redirect.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Parse from a raw query string (`code=...&state=...`).
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            code: map.get("code").cloned(),
            error: map.get("error").cloned(),
            state: map.get("state").cloned(),
        }
    }
}

/// Outcome of processing one callback arrival.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Tokens were exchanged and stored.
    SignedIn(TokenSet),
    /// This code was already exchanged; nothing was done.
    AlreadyProcessed,
    /// The provider reported an error; the store was not touched.
    Denied(String),
}

/// Exchanges callback codes exactly once each.
pub struct CallbackProcessor {
    provider: GoogleAuthProvider,
    store: TokenStore,
    processed: Mutex<HashSet<String>>,
}

impl CallbackProcessor {
    pub fn new(provider: GoogleAuthProvider, store: TokenStore) -> Self {
        Self {
            provider,
            store,
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Process one callback arrival.
    ///
    /// A provider `error` parameter is logged and reported without touching
    /// the store. A repeated `code` is a no-op.
    pub async fn process(&self, params: &CallbackParams) -> Result<CallbackOutcome, AuthError> {
        if let Some(error) = &params.error {
            tracing::warn!("OAuth provider returned error: {}", error);
            return Ok(CallbackOutcome::Denied(error.clone()));
        }

        let code = params.code.as_deref().ok_or(AuthError::MissingCode)?;

        // Claim the code before awaiting so a concurrent duplicate arrival
        // cannot start a second exchange.
        if !self.processed.lock().insert(code.to_string()) {
            tracing::debug!("Ignoring already-processed authorization code");
            return Ok(CallbackOutcome::AlreadyProcessed);
        }

        match self.provider.exchange_code(&self.store, code).await {
            Ok(tokens) => Ok(CallbackOutcome::SignedIn(tokens)),
            Err(e) => {
                // Unclaim so the user can retry after a transient failure.
                self.processed.lock().remove(code);
                Err(e)
            }
        }
    }
}

/// Perform the full sign-in flow: open the browser at the authorization URL,
/// receive the redirect on a local callback server, verify the state
/// parameter, and exchange the code.
pub async fn authenticate(
    provider: &GoogleAuthProvider,
    store: &TokenStore,
    port: u16,
) -> Result<TokenSet, AuthError> {
    let expected_state = uuid::Uuid::new_v4().to_string();
    let auth_url = provider.authorization_url(&expected_state);

    tracing::info!("Opening browser for OAuth2 authorization...");

    // Local callback server; the first arrival wins the oneshot sender.
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let routes = warp::get()
        .and(warp::path("callback"))
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::any().map(move || tx.clone()))
        .map(
            |query: HashMap<String, String>,
             tx: Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>| {
                if let Some(sender) = tx.lock().take() {
                    let _ = sender.send(CallbackParams::from_map(&query));
                }

                warp::reply::html(
                    "<html><body><h1>Authorization complete</h1>\
                     <p>You can close this window and return to Calview.</p></body></html>",
                )
            },
        );

    let server = warp::serve(routes).bind(([127, 0, 0, 1], port));
    tokio::spawn(server);

    webbrowser::open(&auth_url).context("Failed to open browser")?;

    let params = rx.await.map_err(|_| AuthError::CallbackClosed)?;

    if params.error.is_none() && params.state.as_deref() != Some(expected_state.as_str()) {
        return Err(AuthError::StateMismatch);
    }

    let processor = CallbackProcessor::new(provider.clone(), store.clone());
    match processor.process(&params).await? {
        CallbackOutcome::SignedIn(tokens) => Ok(tokens),
        CallbackOutcome::Denied(reason) => Err(AuthError::Provider(reason)),
        // Unreachable with a fresh processor, but the stored tokens are valid.
        CallbackOutcome::AlreadyProcessed => Ok(store.get()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_store() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("tokens.json"));
        (dir, store)
    }

    fn provider(server: &MockServer) -> GoogleAuthProvider {
        GoogleAuthProvider::new(
            "test_client_id".to_string(),
            "test_client_secret".to_string(),
            "http://localhost:8080/callback".to_string(),
        )
        .with_endpoints(&server.uri(), &format!("{}/token", server.uri()))
    }

    #[test]
    fn test_params_from_query() {
        let params = CallbackParams::from_query("code=abc123&state=xyz");
        assert_eq!(params.code.as_deref(), Some("abc123"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.error.is_none());

        let params = CallbackParams::from_query("error=access_denied");
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert!(params.code.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_exchanged_exactly_once() {
        let server = MockServer::start().await;
        let (_dir, store) = temp_store();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access_1",
                "refresh_token": "refresh_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let processor = CallbackProcessor::new(provider(&server), store);
        let params = CallbackParams::from_query("code=abc123&state=xyz");

        let first = processor.process(&params).await.unwrap();
        assert!(matches!(first, CallbackOutcome::SignedIn(_)));

        let second = processor.process(&params).await.unwrap();
        assert!(matches!(second, CallbackOutcome::AlreadyProcessed));
    }

    #[tokio::test]
    async fn test_provider_error_is_denied_without_exchange() {
        let server = MockServer::start().await;
        let (_dir, store) = temp_store();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let processor = CallbackProcessor::new(provider(&server), store.clone());
        let params = CallbackParams::from_query("error=access_denied");

        let outcome = processor.process(&params).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Denied(reason) if reason == "access_denied"));
        assert!(store.get().access_token.is_none());
    }

    #[tokio::test]
    async fn test_missing_code_is_an_error() {
        let server = MockServer::start().await;
        let (_dir, store) = temp_store();

        let processor = CallbackProcessor::new(provider(&server), store);
        let result = processor.process(&CallbackParams::default()).await;

        assert!(matches!(result, Err(AuthError::MissingCode)));
    }

    #[tokio::test]
    async fn test_failed_exchange_can_be_retried() {
        let server = MockServer::start().await;
        let (_dir, store) = temp_store();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access_1",
                "refresh_token": "refresh_1"
            })))
            .mount(&server)
            .await;

        let processor = CallbackProcessor::new(provider(&server), store);
        let params = CallbackParams::from_query("code=abc123");

        assert!(processor.process(&params).await.is_err());

        let retry = processor.process(&params).await.unwrap();
        assert!(matches!(retry, CallbackOutcome::SignedIn(_)));
    }
}
