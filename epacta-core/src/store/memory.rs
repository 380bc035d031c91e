//! In-memory store, ordered by key.

use std::collections::{BTreeMap, HashSet};

use crate::error::{EpactaError, EpactaResult};
use crate::metadata::EpactaMetadata;
use crate::store::{EventKey, EventStore, EventUpsert, OverrideProjection, StoredEvent};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    rows: BTreeMap<EventKey, StoredEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &StoredEvent> {
        self.rows.values()
    }

    fn calendar_rows<'a>(&'a self, calendar_id: &'a str) -> impl Iterator<Item = &'a StoredEvent> {
        self.rows
            .values()
            .filter(move |row| row.calendar_id == calendar_id)
    }
}

impl EventStore for MemoryStore {
    fn list_by_calendar(&self, calendar_id: &str) -> EpactaResult<Vec<OverrideProjection>> {
        Ok(self
            .calendar_rows(calendar_id)
            .map(|row| OverrideProjection {
                external_uid: row.external_uid.clone(),
                description_override: row.description_override.clone(),
            })
            .collect())
    }

    fn upsert_batch(&mut self, rows: &[EventUpsert]) -> EpactaResult<()> {
        for row in rows {
            let key = row.key();
            let merged = row.clone().merge(self.rows.get(&key));
            self.rows.insert(key, merged);
        }
        Ok(())
    }

    fn delete_where_uid_not_in(
        &mut self,
        calendar_id: &str,
        keep: &HashSet<String>,
    ) -> EpactaResult<usize> {
        let before = self.rows.len();
        self.rows
            .retain(|key, _| key.calendar_id != calendar_id || keep.contains(&key.external_uid));
        Ok(before - self.rows.len())
    }

    fn fetch(&self, key: &EventKey) -> EpactaResult<Option<StoredEvent>> {
        Ok(self.rows.get(key).cloned())
    }

    fn write_override(
        &mut self,
        key: &EventKey,
        description_override: Option<&str>,
        metadata: Option<&EpactaMetadata>,
    ) -> EpactaResult<()> {
        let row = self
            .rows
            .get_mut(key)
            .ok_or_else(|| EpactaError::EventNotFound(key.clone()))?;
        row.description_override = description_override.map(String::from);
        row.metadata = metadata.cloned();
        Ok(())
    }

    fn events(&self, calendar_id: &str) -> EpactaResult<Vec<StoredEvent>> {
        let mut events: Vec<StoredEvent> = self.calendar_rows(calendar_id).cloned().collect();
        events.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.external_uid.cmp(&b.external_uid))
        });
        Ok(events)
    }
}
