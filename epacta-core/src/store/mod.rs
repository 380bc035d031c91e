//! Persisted event cache.
//!
//! [`EventStore`] is the small capability set the reconciler needs from the
//! storage layer. Rows are unique per [`EventKey`] (`calendar_id`,
//! `external_uid`); the upsert payload deliberately has no override column so
//! a refresh can never clobber a manual correction.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EpactaResult;
use crate::event::CalendarEvent;
use crate::metadata::EpactaMetadata;

/// Unique key of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub calendar_id: String,
    pub external_uid: String,
}

impl EventKey {
    pub fn new(calendar_id: impl Into<String>, external_uid: impl Into<String>) -> Self {
        EventKey {
            calendar_id: calendar_id.into(),
            external_uid: external_uid.into(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.calendar_id, self.external_uid)
    }
}

/// A persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub calendar_id: String,
    pub external_uid: String,
    pub title: String,
    /// Latest upstream description.
    pub description: String,
    pub description_override: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub location: String,
    pub metadata: Option<EpactaMetadata>,
}

impl StoredEvent {
    pub fn key(&self) -> EventKey {
        EventKey::new(&self.calendar_id, &self.external_uid)
    }

    /// Override when present, upstream text otherwise.
    pub fn effective_description(&self) -> &str {
        self.description_override
            .as_deref()
            .unwrap_or(&self.description)
    }
}

impl From<StoredEvent> for CalendarEvent {
    fn from(row: StoredEvent) -> Self {
        CalendarEvent {
            id: row.external_uid,
            title: row.title,
            description: row
                .description_override
                .clone()
                .unwrap_or_else(|| row.description.clone()),
            raw_description: row.description,
            description_override: row.description_override,
            location: row.location,
            start: row.start_time,
            end: row.end_time,
            all_day: row.all_day,
            metadata: row.metadata,
            calendar_id: row.calendar_id,
        }
    }
}

/// The columns the reconciler reads back before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideProjection {
    pub external_uid: String,
    pub description_override: Option<String>,
}

/// Upsert payload: every column except `description_override`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpsert {
    pub calendar_id: String,
    pub external_uid: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub location: String,
    pub metadata: Option<EpactaMetadata>,
}

impl EventUpsert {
    /// Payload for a freshly expanded event, with the metadata to persist.
    pub fn from_event(event: &CalendarEvent, metadata: Option<EpactaMetadata>) -> Self {
        EventUpsert {
            calendar_id: event.calendar_id.clone(),
            external_uid: event.id.clone(),
            title: event.title.clone(),
            description: event.raw_description.clone(),
            start_time: event.start,
            end_time: event.end,
            all_day: event.all_day,
            location: event.location.clone(),
            metadata,
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(&self.calendar_id, &self.external_uid)
    }

    /// Apply on top of an existing row, keeping its override.
    pub fn merge(self, existing: Option<&StoredEvent>) -> StoredEvent {
        StoredEvent {
            description_override: existing.and_then(|e| e.description_override.clone()),
            calendar_id: self.calendar_id,
            external_uid: self.external_uid,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            all_day: self.all_day,
            location: self.location,
            metadata: self.metadata,
        }
    }
}

/// Storage capabilities used by the reconciler and the override edit path.
///
/// Errors are returned as-is to the caller of the reconciler.
pub trait EventStore {
    /// `external_uid` and `description_override` of every row of a calendar.
    fn list_by_calendar(&self, calendar_id: &str) -> EpactaResult<Vec<OverrideProjection>>;

    /// Insert or replace rows by key, leaving existing overrides untouched.
    fn upsert_batch(&mut self, rows: &[EventUpsert]) -> EpactaResult<()>;

    /// Delete rows of `calendar_id` whose UID is not in `keep`. Returns the count.
    fn delete_where_uid_not_in(
        &mut self,
        calendar_id: &str,
        keep: &HashSet<String>,
    ) -> EpactaResult<usize>;

    fn fetch(&self, key: &EventKey) -> EpactaResult<Option<StoredEvent>>;

    /// Write override and metadata of one existing row in a single operation.
    fn write_override(
        &mut self,
        key: &EventKey,
        description_override: Option<&str>,
        metadata: Option<&EpactaMetadata>,
    ) -> EpactaResult<()>;

    /// Full rows of a calendar ordered by start, for read-back.
    fn events(&self, calendar_id: &str) -> EpactaResult<Vec<StoredEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(description_override: Option<&str>) -> StoredEvent {
        StoredEvent {
            calendar_id: "cal".to_string(),
            external_uid: "uid".to_string(),
            title: "Misa".to_string(),
            description: "bl / upstream".to_string(),
            description_override: description_override.map(String::from),
            start_time: Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap(),
            end_time: None,
            all_day: false,
            location: String::new(),
            metadata: None,
        }
    }

    #[test]
    fn test_read_model_uses_override_for_display() {
        let event = CalendarEvent::from(row(Some("ro / corregido")));
        assert_eq!(event.id, "uid");
        assert_eq!(event.description, "ro / corregido");
        assert_eq!(event.raw_description, "bl / upstream");
        assert!(event.is_overridden());

        let event = CalendarEvent::from(row(None));
        assert_eq!(event.description, "bl / upstream");
        assert!(!event.is_overridden());
    }

    #[test]
    fn test_merge_keeps_existing_override() {
        let existing = row(Some("ro / corregido"));
        let fresh = CalendarEvent::from(row(None));
        let upsert = EventUpsert::from_event(&fresh, None);

        let merged = upsert.clone().merge(Some(&existing));
        assert_eq!(merged.description_override.as_deref(), Some("ro / corregido"));

        let inserted = upsert.merge(None);
        assert_eq!(inserted.description_override, None);
        assert_eq!(inserted.key(), EventKey::new("cal", "uid"));
    }

    #[test]
    fn test_persisted_shape_uses_iso_timestamps() {
        let json = serde_json::to_value(row(None)).unwrap();
        assert_eq!(json["start_time"], "2026-01-01T10:00:00Z");
        assert_eq!(json["description_override"], serde_json::Value::Null);
        assert_eq!(json["all_day"], false);
    }
}
