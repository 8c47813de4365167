//! Google Calendar event synchronization for Calview.
//!
//! Provides the authenticated fetcher, calendar directory client, event sync
//! engine, and the persisted JSON state store they share.

pub mod cache;
pub mod directory;
pub mod error;
pub mod fetch;
pub mod sync;
pub mod types;

pub use cache::StateStore;
pub use directory::DirectoryClient;
pub use error::CalendarError;
pub use fetch::AuthFetcher;
pub use sync::{SyncEngine, SyncReport};
pub use types::{CalendarDescriptor, EventTime, NormalizedEvent, NO_TITLE_PLACEHOLDER};
