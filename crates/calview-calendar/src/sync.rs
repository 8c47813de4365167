//! Event sync engine.
//!
//! Pages through the event listings of the selected calendars, normalizes
//! the results, and rebuilds the persisted event cache wholesale.

use std::collections::HashSet;

use tracing::instrument;

use crate::cache::StateStore;
use crate::directory::CALENDAR_API_BASE;
use crate::error::CalendarError;
use crate::fetch::AuthFetcher;
use crate::types::{EventListResponse, NormalizedEvent};

/// Fixed page size requested from the events endpoint.
const MAX_RESULTS: u32 = 2500;

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// The new event cache: selection order, page-fetch order within a
    /// calendar.
    pub events: Vec<NormalizedEvent>,
    /// True when any page failed with an auth error, so the caller can route
    /// the user back to sign-in.
    pub auth_required: bool,
    /// Calendars whose pagination was cut short. Events fetched before the
    /// failure are kept.
    pub failed_calendars: Vec<String>,
}

pub struct SyncEngine {
    fetcher: AuthFetcher,
    state: StateStore,
    base_url: String,
}

impl SyncEngine {
    pub fn new(fetcher: AuthFetcher, state: StateStore) -> Self {
        Self {
            fetcher,
            state,
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (used by tests with a mock server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Sync the selected calendars, strictly sequentially.
    ///
    /// A duplicated id in the selection is synced once (first occurrence).
    /// A failed page aborts pagination for that calendar only; accumulated
    /// events are kept and the remaining calendars still sync. The resulting
    /// cache fully replaces the previous one.
    ///
    /// Not safe to invoke concurrently with itself; callers serialize
    /// invocations (one per explicit selection change or refresh).
    #[instrument(skip(self), level = "info")]
    pub async fn sync(&self, selected_ids: &[String]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for calendar_id in selected_ids {
            if !seen.insert(calendar_id.as_str()) {
                tracing::debug!("Skipping duplicate selection entry {}", calendar_id);
                continue;
            }

            if let Err(e) = self
                .fetch_calendar_events(calendar_id, &mut report.events)
                .await
            {
                tracing::warn!("Sync aborted for calendar {}: {}", calendar_id, e);
                if e.is_auth_required() {
                    report.auth_required = true;
                }
                report.failed_calendars.push(calendar_id.clone());
            }
        }

        if let Err(e) = self.state.save_events(&report.events) {
            tracing::warn!("Failed to persist event cache: {}", e);
        }

        tracing::info!(
            "Synced {} events from {} calendars ({} failed)",
            report.events.len(),
            selected_ids.len(),
            report.failed_calendars.len()
        );
        report
    }

    /// Event cache from the last completed sync.
    pub fn cached(&self) -> Vec<NormalizedEvent> {
        self.state.load_events()
    }

    /// Page through one calendar's events, appending normalized events in
    /// receipt order until the provider reports no continuation token.
    async fn fetch_calendar_events(
        &self,
        calendar_id: &str,
        out: &mut Vec<NormalizedEvent>,
    ) -> Result<(), CalendarError> {
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/calendars/{}/events?maxResults={}",
                self.base_url,
                urlencoding::encode(calendar_id),
                MAX_RESULTS,
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self.fetcher.call(|http| http.get(&url)).await?;

            let page: EventListResponse = match response.json().await {
                Ok(page) => page,
                Err(e) => {
                    // Unexpected payload shape: treat as an empty final page.
                    tracing::warn!("Malformed event page for {}: {}", calendar_id, e);
                    return Ok(());
                }
            };

            out.extend(page.items.into_iter().filter_map(NormalizedEvent::from_api));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use calview_auth::{GoogleAuthProvider, TokenStore};
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(server: &MockServer, dir: &tempfile::TempDir) -> (SyncEngine, StateStore) {
        let tokens = TokenStore::with_path(dir.path().join("tokens.json"));
        tokens.set_tokens("test_token", Some("refresh_1")).unwrap();

        let provider = GoogleAuthProvider::new(
            "client_id".to_string(),
            "client_secret".to_string(),
            "http://localhost:8080/callback".to_string(),
        )
        .with_endpoints(&server.uri(), &format!("{}/token", server.uri()));

        let state = StateStore::with_dir(dir.path().join("state"));
        let fetcher = AuthFetcher::new(tokens, provider);
        let engine = SyncEngine::new(fetcher, state.clone()).with_base_url(&server.uri());
        (engine, state)
    }

    fn event_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "summary": format!("Event {}", id),
            "start": {"dateTime": "2024-05-01T10:00:00Z"},
            "end": {"dateTime": "2024-05-01T11:00:00Z"}
        })
    }

    fn ids(report: &SyncReport) -> Vec<&str> {
        report.events.iter().map(|e| e.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_pagination_follows_continuation_tokens() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/cal/events"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("e1"), event_json("e2")],
                "nextPageToken": "t2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/cal/events"))
            .and(query_param("pageToken", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("e3"), event_json("e4")],
                "nextPageToken": "t3"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/cal/events"))
            .and(query_param("pageToken", "t3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("e5"), event_json("e6")]
            })))
            .mount(&server)
            .await;

        let report = engine.sync(&["cal".to_string()]).await;

        assert_eq!(ids(&report), vec!["e1", "e2", "e3", "e4", "e5", "e6"]);
        assert!(report.failed_calendars.is_empty());
    }

    #[tokio::test]
    async fn test_requests_fixed_page_size() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/cal/events"))
            .and(query_param("maxResults", "2500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("e1")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = engine.sync(&["cal".to_string()]).await;
        assert_eq!(report.events.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_earlier_pages_and_later_calendars() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        // Calendar A: first page succeeds, second fails
        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("a1"), event_json("a2")],
                "nextPageToken": "t2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .and(query_param("pageToken", "t2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        // Calendar B: fully succeeds
        Mock::given(method("GET"))
            .and(path("/calendars/b/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("b1")]
            })))
            .mount(&server)
            .await;

        let report = engine.sync(&["a".to_string(), "b".to_string()]).await;

        assert_eq!(ids(&report), vec!["a1", "a2", "b1"]);
        assert_eq!(report.failed_calendars, vec!["a".to_string()]);
        assert!(!report.auth_required);
    }

    #[tokio::test]
    async fn test_auth_failure_is_reported() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/b/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("b1")]
            })))
            .mount(&server)
            .await;

        let report = engine.sync(&["a".to_string(), "b".to_string()]).await;

        // Sync continues past the auth failure and still reports it
        assert!(report.auth_required);
        assert_eq!(report.failed_calendars, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_selection_synced_once() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("a1")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = engine
            .sync(&["a".to_string(), "a".to_string(), "a".to_string()])
            .await;

        assert_eq!(ids(&report), vec!["a1"]);
    }

    #[tokio::test]
    async fn test_sync_replaces_persisted_cache() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("a1")]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("a2")]
            })))
            .mount(&server)
            .await;

        engine.sync(&["a".to_string()]).await;
        assert_eq!(state.load_events()[0].id, "a1");

        engine.sync(&["a".to_string()]).await;
        let cached = state.load_events();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "a2");
        assert_eq!(engine.cached().len(), 1);
    }

    #[tokio::test]
    async fn test_normalization_example() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "e1",
                    "summary": "",
                    "start": {"date": "2024-05-01"},
                    "end": {"date": "2024-05-02"}
                }]
            })))
            .mount(&server)
            .await;

        let report = engine.sync(&["a".to_string()]).await;

        let event = &report.events[0];
        assert_eq!(event.id, "e1");
        assert_eq!(event.title, crate::types::NO_TITLE_PLACEHOLDER);
        assert!(event.all_day);
    }

    #[tokio::test]
    async fn test_malformed_page_ends_calendar_without_failing() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (engine, _state) = engine(&server, &dir);

        Mock::given(method("GET"))
            .and(path("/calendars/a/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let report = engine.sync(&["a".to_string()]).await;

        assert!(report.events.is_empty());
        assert!(report.failed_calendars.is_empty());
    }
}
