//! Calendar directory client.

use tracing::instrument;

use crate::cache::StateStore;
use crate::fetch::AuthFetcher;
use crate::types::{CalendarDescriptor, CalendarListResponse};

pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Lists the user's available calendars, sorted by display name.
pub struct DirectoryClient {
    fetcher: AuthFetcher,
    state: StateStore,
    base_url: String,
}

impl DirectoryClient {
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

    /// Fetch the calendar directory.
    ///
    /// Sorted ascending by display name, case-insensitively; calendars
    /// without a name sort first. On any failure this logs, returns an empty
    /// list, and leaves the previously persisted snapshot in place. A
    /// successful fetch replaces the snapshot wholesale.
    #[instrument(skip(self), level = "info")]
    pub async fn list(&self) -> Vec<CalendarDescriptor> {
        let url = format!("{}/users/me/calendarList", self.base_url);

        let response = match self.fetcher.call(|http| http.get(&url)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Calendar list fetch failed: {}", e);
                return Vec::new();
            }
        };

        let resp: CalendarListResponse = match response.json().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Malformed calendar list payload: {}", e);
                return Vec::new();
            }
        };

        let mut calendars: Vec<CalendarDescriptor> =
            resp.items.into_iter().map(CalendarDescriptor::from).collect();
        calendars.sort_by_key(|c| c.display_name.to_lowercase());

        if let Err(e) = self.state.save_directory(&calendars) {
            tracing::warn!("Failed to persist calendar directory: {}", e);
        }

        calendars
    }

    /// Most recent successful snapshot, for display while a fetch fails.
    pub fn cached(&self) -> Vec<CalendarDescriptor> {
        self.state.load_directory()
    }
}
