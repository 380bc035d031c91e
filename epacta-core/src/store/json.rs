//! File-backed store: one JSON document per calendar.
//!
//! Layout: `<root>/<encoded calendar id>.json`, a sorted array of rows. Every write
//! goes to a temp file first and is renamed into place, so a crash mid-write
//! leaves the previous document intact.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{EpactaError, EpactaResult};
use crate::metadata::EpactaMetadata;
use crate::store::{EventKey, EventStore, EventUpsert, OverrideProjection, StoredEvent};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

/// Rows of one calendar keyed by external UID.
type CalendarRows = BTreeMap<String, StoredEvent>;

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, calendar_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", file_stem(calendar_id)))
    }

    fn load(&self, calendar_id: &str) -> EpactaResult<CalendarRows> {
        let path = self.path(calendar_id);

        if !path.exists() {
            return Ok(CalendarRows::new());
        }

        let content = std::fs::read_to_string(&path)?;
        let rows: Vec<StoredEvent> = serde_json::from_str(&content).map_err(|e| {
            EpactaError::Store(format!("Corrupt event file {}: {e}", path.display()))
        })?;

        // Saving would drop rows of another calendar, so refuse to load them.
        if let Some(foreign) = rows.iter().find(|row| row.calendar_id != calendar_id) {
            return Err(EpactaError::Store(format!(
                "{} holds rows of calendar '{}', expected '{calendar_id}'",
                path.display(),
                foreign.calendar_id
            )));
        }

        Ok(rows
            .into_iter()
            .map(|row| (row.external_uid.clone(), row))
            .collect())
    }

    fn save(&self, calendar_id: &str, rows: &CalendarRows) -> EpactaResult<()> {
        std::fs::create_dir_all(&self.root)?;

        let path = self.path(calendar_id);
        let temp = path.with_extension("json.tmp");

        // Sorted by start for readable diffs
        let mut sorted: Vec<&StoredEvent> = rows.values().collect();
        sorted.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.external_uid.cmp(&b.external_uid))
        });
        let content = serde_json::to_string_pretty(&sorted)?;

        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &path)?;
        Ok(())
    }
}

/// Encode a calendar id as a file stem.
///
/// Lowercase ASCII letters, digits, `-` and `_` are kept; every other byte
/// (uppercase letters and `%` included) becomes `%XX`. Distinct ids map to
/// distinct stems, also on case-insensitive filesystems.
fn file_stem(calendar_id: &str) -> String {
    let mut stem = String::with_capacity(calendar_id.len());
    for byte in calendar_id.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => stem.push(char::from(byte)),
            _ => stem.push_str(&format!("%{byte:02X}")),
        }
    }
    stem
}

impl EventStore for JsonFileStore {
    fn list_by_calendar(&self, calendar_id: &str) -> EpactaResult<Vec<OverrideProjection>> {
        Ok(self
            .load(calendar_id)?
            .into_values()
            .map(|row| OverrideProjection {
                external_uid: row.external_uid,
                description_override: row.description_override,
            })
            .collect())
    }

    fn upsert_batch(&mut self, rows: &[EventUpsert]) -> EpactaResult<()> {
        let mut by_calendar: BTreeMap<&str, Vec<&EventUpsert>> = BTreeMap::new();
        for row in rows {
            by_calendar.entry(row.calendar_id.as_str()).or_default().push(row);
        }

        for (calendar_id, upserts) in by_calendar {
            let mut stored = self.load(calendar_id)?;
            for upsert in upserts {
                let merged = upsert.clone().merge(stored.get(&upsert.external_uid));
                stored.insert(merged.external_uid.clone(), merged);
            }
            self.save(calendar_id, &stored)?;
        }

        Ok(())
    }

    fn delete_where_uid_not_in(
        &mut self,
        calendar_id: &str,
        keep: &HashSet<String>,
    ) -> EpactaResult<usize> {
        let mut stored = self.load(calendar_id)?;
        let before = stored.len();
        stored.retain(|uid, _| keep.contains(uid));
        let deleted = before - stored.len();

        if deleted > 0 {
            self.save(calendar_id, &stored)?;
        }
        Ok(deleted)
    }

    fn fetch(&self, key: &EventKey) -> EpactaResult<Option<StoredEvent>> {
        Ok(self.load(&key.calendar_id)?.remove(&key.external_uid))
    }

    fn write_override(
        &mut self,
        key: &EventKey,
        description_override: Option<&str>,
        metadata: Option<&EpactaMetadata>,
    ) -> EpactaResult<()> {
        let mut stored = self.load(&key.calendar_id)?;
        let row = stored
            .get_mut(&key.external_uid)
            .ok_or_else(|| EpactaError::EventNotFound(key.clone()))?;
        row.description_override = description_override.map(String::from);
        row.metadata = metadata.cloned();
        self.save(&key.calendar_id, &stored)
    }

    fn events(&self, calendar_id: &str) -> EpactaResult<Vec<StoredEvent>> {
        let mut events: Vec<StoredEvent> = self.load(calendar_id)?.into_values().collect();
        events.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.external_uid.cmp(&b.external_uid))
        });
        Ok(events)
    }
}
