//! Normalized event records.
//!
//! [`CalendarEvent`] is what the expander produces on every sync run and what
//! the UI reads back from the store. It is never edited in place: the store
//! rows are written by the reconciler only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::EpactaMetadata;

/// A materialized calendar event (one per physical occurrence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// UID for single events, `uid_<occurrence start millis>` for occurrences.
    pub id: String,
    pub title: String,
    /// Text to display: the override when present, else the upstream text.
    pub description: String,
    /// Latest upstream text, never replaced by a manual edit.
    pub raw_description: String,
    pub description_override: Option<String>,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    /// Derived from `description`; only set for Epacta calendars.
    pub metadata: Option<EpactaMetadata>,
    pub calendar_id: String,
}

impl CalendarEvent {
    /// Identifier of one occurrence of a recurring event.
    pub fn occurrence_id(uid: &str, occurrence_start: DateTime<Utc>) -> String {
        format!("{}_{}", uid, occurrence_start.timestamp_millis())
    }

    pub fn is_overridden(&self) -> bool {
        self.description_override.is_some()
    }

    /// End of the event, falling back to its start for instantaneous events.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end.unwrap_or(self.start)
    }
}
