//! Cache reconciliation and manual override edits.
//!
//! Callers must not run two reconciliations of the same calendar at once:
//! the delete step relies on the upserts of the same run having landed.
//! Different calendars are independent.

use std::collections::{HashMap, HashSet};

use crate::annotation;
use crate::constants::DEFAULT_BATCH_SIZE;
use crate::error::{EpactaError, EpactaResult};
use crate::event::CalendarEvent;
use crate::store::{EventKey, EventStore, EventUpsert, StoredEvent};
use crate::sync::ReconcileStats;

/// Writes expanded feeds into an [`EventStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReconciler {
    batch_size: usize,
    /// Derive metadata from override text. Off for plain calendars.
    epacta_feed: bool,
}

impl Default for SyncReconciler {
    fn default() -> Self {
        SyncReconciler {
            batch_size: DEFAULT_BATCH_SIZE,
            epacta_feed: true,
        }
    }
}

impl SyncReconciler {
    pub fn new(batch_size: usize) -> Self {
        SyncReconciler {
            batch_size: batch_size.max(1),
            epacta_feed: true,
        }
    }

    /// Whether the calendar follows the Epacta convention. Overrides of a
    /// plain calendar are stored but never parsed.
    pub fn with_epacta_feed(mut self, epacta_feed: bool) -> Self {
        self.epacta_feed = epacta_feed;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_epacta_feed(&self) -> bool {
        self.epacta_feed
    }

    /// Bring the rows of `calendar_id` in line with `fresh`.
    ///
    /// Rows are upserted in batches, keeping any manual override and
    /// re-deriving metadata from it; rows whose UID is no longer in `fresh`
    /// are deleted. The first store error aborts the run and is returned
    /// unchanged. Running twice with the same input is a no-op the second time.
    #[tracing::instrument(skip(self, fresh, store), fields(fresh = fresh.len()))]
    pub fn reconcile<S: EventStore + ?Sized>(
        &self,
        calendar_id: &str,
        fresh: &[CalendarEvent],
        store: &mut S,
    ) -> EpactaResult<ReconcileStats> {
        let overrides: HashMap<String, Option<String>> = store
            .list_by_calendar(calendar_id)?
            .into_iter()
            .map(|row| (row.external_uid, row.description_override))
            .collect();

        // Taken before any write so the delete sees the whole fresh set.
        let fresh_uids: HashSet<String> = fresh.iter().map(|e| e.id.clone()).collect();

        let mut stats = ReconcileStats::default();

        let rows: Vec<EventUpsert> = fresh
            .iter()
            .map(|event| {
                let metadata = match overrides.get(&event.id) {
                    Some(Some(text)) => {
                        stats.preserved_overrides += 1;
                        self.epacta_feed.then(|| annotation::parse(text))
                    }
                    _ => event.metadata.clone(),
                };

                if overrides.contains_key(&event.id) {
                    stats.updated += 1;
                } else {
                    stats.created += 1;
                }

                let mut row = EventUpsert::from_event(event, metadata);
                row.calendar_id = calendar_id.to_string();
                row
            })
            .collect();

        for (i, batch) in rows.chunks(self.batch_size).enumerate() {
            tracing::trace!(batch = i, size = batch.len(), "Upserting batch");
            store.upsert_batch(batch)?;
        }

        stats.deleted = store.delete_where_uid_not_in(calendar_id, &fresh_uids)?;

        tracing::info!(
            calendar_id,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            overrides = stats.preserved_overrides,
            "Reconciled calendar"
        );

        Ok(stats)
    }

    /// Set (`Some`) or discard (`None`) the manual description of one row.
    ///
    /// Metadata is re-derived from the resulting effective description and
    /// written together with the override. A blank text counts as discard.
    #[tracing::instrument(skip(self, key, text, store), fields(key = %key))]
    pub fn set_override<S: EventStore + ?Sized>(
        &self,
        key: &EventKey,
        text: Option<&str>,
        store: &mut S,
    ) -> EpactaResult<StoredEvent> {
        let mut row = store
            .fetch(key)?
            .ok_or_else(|| EpactaError::EventNotFound(key.clone()))?;

        let text = text.filter(|t| !t.trim().is_empty());
        let metadata = self
            .epacta_feed
            .then(|| annotation::parse(text.unwrap_or(row.description.as_str())));

        store.write_override(key, text, metadata.as_ref())?;

        tracing::info!(overridden = text.is_some(), "Updated description override");

        row.description_override = text.map(String::from);
        row.metadata = metadata;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EpactaMetadata;
    use crate::store::{MemoryStore, OverrideProjection};
    use chrono::{Duration, TimeZone, Utc};

    fn event(uid: &str, description: &str) -> CalendarEvent {
        CalendarEvent {
            id: uid.to_string(),
            title: format!("Misa {uid}"),
            description: description.to_string(),
            raw_description: description.to_string(),
            description_override: None,
            location: "Oratorio".to_string(),
            start: Utc.with_ymd_and_hms(2026, 11, 1, 10, 0, 0).unwrap(),
            end: None,
            all_day: false,
            metadata: Some(annotation::parse(description)),
            calendar_id: "cal".to_string(),
        }
    }

    fn snapshot(store: &MemoryStore) -> Vec<StoredEvent> {
        store.rows().cloned().collect()
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();
        let fresh = vec![event("a", "bl / M / L"), event("b", "ro / M / L")];

        let first = reconciler.reconcile("cal", &fresh, &mut store).unwrap();
        assert_eq!(first.created, 2);
        let after_first = snapshot(&store);

        let second = reconciler.reconcile("cal", &fresh, &mut store).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(second.deleted, 0);
        assert_eq!(snapshot(&store), after_first);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_absent_uid_is_deleted_and_present_uid_updated() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();

        reconciler
            .reconcile("cal", &[event("a", "bl"), event("gone", "bl")], &mut store)
            .unwrap();

        let mut changed = event("a", "ve / nuevo");
        changed.title = "Misa cambiada".to_string();
        let stats = reconciler.reconcile("cal", &[changed], &mut store).unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(store.len(), 1);

        let row = store.fetch(&EventKey::new("cal", "a")).unwrap().unwrap();
        assert_eq!(row.title, "Misa cambiada");
        assert_eq!(row.description, "ve / nuevo");
        assert_eq!(row.metadata, Some(annotation::parse("ve / nuevo")));
    }

    #[test]
    fn test_other_calendars_are_untouched() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();

        reconciler.reconcile("cal", &[event("a", "bl")], &mut store).unwrap();
        let mut other = event("x", "bl");
        other.calendar_id = "other".to_string();
        reconciler.reconcile("other", &[other], &mut store).unwrap();

        reconciler.reconcile("cal", &[], &mut store).unwrap();

        assert!(store.fetch(&EventKey::new("cal", "a")).unwrap().is_none());
        assert!(store.fetch(&EventKey::new("other", "x")).unwrap().is_some());
    }

    #[test]
    fn test_override_survives_refresh() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();
        let key = EventKey::new("cal", "a");

        reconciler
            .reconcile("cal", &[event("a", "bl / Misal / Lecc")], &mut store)
            .unwrap();
        reconciler
            .set_override(&key, Some("custom text"), &mut store)
            .unwrap();

        let stats = reconciler
            .reconcile("cal", &[event("a", "mo / Otro misal / Otro lecc")], &mut store)
            .unwrap();
        assert_eq!(stats.preserved_overrides, 1);

        let row = store.fetch(&key).unwrap().unwrap();
        assert_eq!(row.description_override.as_deref(), Some("custom text"));
        assert_eq!(row.description, "mo / Otro misal / Otro lecc");
        assert_eq!(row.metadata, Some(annotation::parse("custom text")));

        let shown = CalendarEvent::from(row);
        assert_eq!(shown.description, "custom text");
        assert_eq!(shown.raw_description, "mo / Otro misal / Otro lecc");
    }

    #[test]
    fn test_override_reversal_restores_upstream_metadata() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();
        let key = EventKey::new("cal", "a");
        let upstream = "bl / Misal / Lecc / Pref - Pleg / [Aviso]";

        reconciler.reconcile("cal", &[event("a", upstream)], &mut store).unwrap();

        let edited = reconciler
            .set_override(&key, Some("ro flo / Misal corregido"), &mut store)
            .unwrap();
        assert_eq!(edited.metadata.as_ref().and_then(|m| m.color.as_deref()), Some("ro"));
        assert_eq!(edited.metadata.as_ref().and_then(|m| m.flores), Some(true));

        let reverted = reconciler.set_override(&key, None, &mut store).unwrap();
        assert_eq!(reverted.description_override, None);
        assert_eq!(reverted.metadata, Some(annotation::parse(upstream)));

        let row = store.fetch(&key).unwrap().unwrap();
        assert_eq!(row.description_override, None);
        assert_eq!(row.metadata, Some(annotation::parse(upstream)));
    }

    #[test]
    fn test_plain_calendar_overrides_carry_no_metadata() {
        let reconciler = SyncReconciler::default().with_epacta_feed(false);
        let mut store = MemoryStore::new();
        let key = EventKey::new("cal", "a");

        let mut plain = event("a", "Concierto de órgano");
        plain.metadata = None;
        reconciler.reconcile("cal", &[plain.clone()], &mut store).unwrap();

        let edited = reconciler
            .set_override(&key, Some("ro / Concierto aplazado"), &mut store)
            .unwrap();
        assert_eq!(edited.description_override.as_deref(), Some("ro / Concierto aplazado"));
        assert_eq!(edited.metadata, None);

        let stats = reconciler.reconcile("cal", &[plain], &mut store).unwrap();
        assert_eq!(stats.preserved_overrides, 1);

        let row = store.fetch(&key).unwrap().unwrap();
        assert_eq!(row.description_override.as_deref(), Some("ro / Concierto aplazado"));
        assert_eq!(row.metadata, None);
    }

    #[test]
    fn test_blank_override_discards_correction() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();
        let key = EventKey::new("cal", "a");

        reconciler.reconcile("cal", &[event("a", "bl")], &mut store).unwrap();
        reconciler.set_override(&key, Some("ro"), &mut store).unwrap();

        let row = reconciler.set_override(&key, Some("   "), &mut store).unwrap();
        assert_eq!(row.description_override, None);
        assert_eq!(row.metadata, Some(annotation::parse("bl")));
    }

    #[test]
    fn test_override_on_unknown_event_fails() {
        let reconciler = SyncReconciler::default();
        let mut store = MemoryStore::new();

        let result = reconciler.set_override(&EventKey::new("cal", "nope"), Some("x"), &mut store);
        assert!(matches!(result, Err(EpactaError::EventNotFound(_))));
    }

    /// Records batch sizes and fails the upsert call number `fail_on`.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        batches: Vec<usize>,
        fail_on: Option<usize>,
        deletes: usize,
    }

    impl EventStore for RecordingStore {
        fn list_by_calendar(&self, calendar_id: &str) -> EpactaResult<Vec<OverrideProjection>> {
            self.inner.list_by_calendar(calendar_id)
        }

        fn upsert_batch(&mut self, rows: &[EventUpsert]) -> EpactaResult<()> {
            if self.fail_on == Some(self.batches.len()) {
                return Err(EpactaError::Store("payload too large".into()));
            }
            self.batches.push(rows.len());
            self.inner.upsert_batch(rows)
        }

        fn delete_where_uid_not_in(
            &mut self,
            calendar_id: &str,
            keep: &HashSet<String>,
        ) -> EpactaResult<usize> {
            self.deletes += 1;
            self.inner.delete_where_uid_not_in(calendar_id, keep)
        }

        fn fetch(&self, key: &EventKey) -> EpactaResult<Option<StoredEvent>> {
            self.inner.fetch(key)
        }

        fn write_override(
            &mut self,
            key: &EventKey,
            description_override: Option<&str>,
            metadata: Option<&EpactaMetadata>,
        ) -> EpactaResult<()> {
            self.inner.write_override(key, description_override, metadata)
        }

        fn events(&self, calendar_id: &str) -> EpactaResult<Vec<StoredEvent>> {
            self.inner.events(calendar_id)
        }
    }

    fn many(count: usize) -> Vec<CalendarEvent> {
        (0..count)
            .map(|i| {
                let mut e = event(&format!("uid-{i}"), "bl");
                e.start += Duration::days(i as i64);
                e
            })
            .collect()
    }

    #[test]
    fn test_writes_are_batched() {
        let mut store = RecordingStore::default();

        SyncReconciler::default()
            .reconcile("cal", &many(250), &mut store)
            .unwrap();

        assert_eq!(store.batches, vec![100, 100, 50]);
        assert_eq!(store.deletes, 1);
        assert_eq!(store.inner.len(), 250);

        store.batches.clear();
        SyncReconciler::new(0).reconcile("cal", &many(3), &mut store).unwrap();
        assert_eq!(store.batches, vec![1, 1, 1]);
    }

    #[test]
    fn test_batch_failure_aborts_before_delete() {
        let mut store = RecordingStore::default();
        let reconciler = SyncReconciler::new(10);

        reconciler.reconcile("cal", &many(30), &mut store).unwrap();

        store.batches.clear();
        store.deletes = 0;
        store.fail_on = Some(1);

        let result = reconciler.reconcile("cal", &many(15), &mut store);

        assert!(matches!(result, Err(EpactaError::Store(msg)) if msg == "payload too large"));
        assert_eq!(store.deletes, 0);
        assert_eq!(store.inner.len(), 30);
    }
}
