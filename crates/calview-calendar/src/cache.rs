//! JSON-file store for calendar state.
//!
//! One file per key under the config directory: calendar directory snapshot,
//! selected-calendar set, and the normalized event cache. Every save fully
//! replaces the file; loads of missing or unreadable files yield the empty
//! value.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::types::{CalendarDescriptor, NormalizedEvent};

const DIRECTORY_FILE: &str = "calendars.json";
const SELECTION_FILE: &str = "selection.json";
const EVENTS_FILE: &str = "events.json";

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store under the default config directory.
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("calview");
        Ok(Self { dir })
    }

    /// Store under an explicit directory (used by tests).
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Most recent successful directory snapshot.
    pub fn load_directory(&self) -> Vec<CalendarDescriptor> {
        self.load(DIRECTORY_FILE)
    }

    /// Replace the directory snapshot wholesale.
    pub fn save_directory(&self, calendars: &[CalendarDescriptor]) -> Result<()> {
        self.save(DIRECTORY_FILE, &calendars)
    }

    /// Calendar ids the user has chosen to display, in selection order.
    pub fn load_selection(&self) -> Vec<String> {
        self.load(SELECTION_FILE)
    }

    pub fn save_selection(&self, ids: &[String]) -> Result<()> {
        self.save(SELECTION_FILE, &ids)
    }

    /// Event cache from the last completed sync.
    pub fn load_events(&self) -> Vec<NormalizedEvent> {
        self.load(EVENTS_FILE)
    }

    /// Replace the event cache wholesale. Never merged incrementally.
    pub fn save_events(&self, events: &[NormalizedEvent]) -> Result<()> {
        self.save(EVENTS_FILE, &events)
    }

    /// Remove all persisted calendar state.
    pub fn clear(&self) -> Result<()> {
        for name in [DIRECTORY_FILE, SELECTION_FILE, EVENTS_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete state file {}", name))?;
            }
        }
        Ok(())
    }

    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let json = match fs::read_to_string(self.dir.join(name)) {
            Ok(json) => json,
            Err(_) => return T::default(),
        };

        match serde_json::from_str(&json) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Discarding unreadable state file {}: {}", name, e);
                T::default()
            }
        }
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create state directory")?;

        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize state for {}", name))?;

        fs::write(self.dir.join(name), json)
            .with_context(|| format!("Failed to write state file {}", name))?;
        Ok(())
    }
}
