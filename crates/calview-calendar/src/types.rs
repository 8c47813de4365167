//! Calendar API types and the normalized presentation shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Title used when the source event carries no summary.
pub const NO_TITLE_PLACEHOLDER: &str = "(no title)";

/// Event time - a specific instant or an all-day date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

/// Presentation-ready event, derived deterministically from one API event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub id: String,
    pub title: String,
    pub start: EventTime,
    pub end: EventTime,
    pub all_day: bool,
}

/// One entry of the user's calendar directory. Immutable snapshot; the whole
/// listing is replaced on each successful directory fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDescriptor {
    pub id: String,
    pub display_name: String,
}

// API Response Types

/// Google Calendar API event record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

/// API response for event list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
}

/// API response for calendar list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListResponse {
    #[serde(default)]
    pub items: Vec<ApiCalendar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCalendar {
    pub id: String,
    pub summary: Option<String>,
}

impl NormalizedEvent {
    /// Convert an API event to the normalized shape.
    ///
    /// `all_day` is true iff the start carries a date and no dateTime. An
    /// event without a parseable start is dropped (returns None) so the
    /// result stays deterministic.
    pub fn from_api(api: ApiEvent) -> Option<Self> {
        let (start, all_day) = api.start.as_ref().and_then(parse_event_time)?;
        let end = api
            .end
            .as_ref()
            .and_then(parse_event_time)
            .map(|(t, _)| t)
            .unwrap_or_else(|| start.clone());

        let title = match api.summary {
            Some(s) if !s.is_empty() => s,
            _ => NO_TITLE_PLACEHOLDER.to_string(),
        };

        Some(Self {
            id: api.id,
            title,
            start,
            end,
            all_day,
        })
    }
}

impl From<ApiCalendar> for CalendarDescriptor {
    fn from(api: ApiCalendar) -> Self {
        Self {
            id: api.id,
            display_name: api.summary.unwrap_or_default(),
        }
    }
}

fn parse_event_time(api: &ApiEventTime) -> Option<(EventTime, bool)> {
    if let Some(dt_str) = &api.date_time {
        if let Ok(dt) = DateTime::parse_from_rfc3339(dt_str) {
            return Some((EventTime::DateTime(dt.with_timezone(&Utc)), false));
        }
    }
    if let Some(date_str) = &api.date {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            return Some((EventTime::Date(date), true));
        }
    }
    None
}
