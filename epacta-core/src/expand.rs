//! Feed expansion.
//!
//! Flattens a decoded feed into one [`CalendarEvent`] per occurrence inside
//! the sync window, attaching Epacta annotations for Epacta calendars.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::annotation;
use crate::constants::{DEFAULT_FUTURE_MONTHS, DEFAULT_MAX_OCCURRENCES, DEFAULT_PAST_MONTHS};
use crate::date_range::DateRange;
use crate::event::CalendarEvent;
use crate::ics::{self, DecodedCalendar, DecodedEvent, Occurrence};

/// Window and recurrence bounds applied during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandLimits {
    pub past_months: u32,
    pub future_months: u32,
    /// Iteration steps allowed per recurring event, in or out of the window.
    pub max_occurrences: usize,
}

impl Default for ExpandLimits {
    fn default() -> Self {
        ExpandLimits {
            past_months: DEFAULT_PAST_MONTHS,
            future_months: DEFAULT_FUTURE_MONTHS,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

/// Expands the feed of a single calendar source.
#[derive(Debug, Clone)]
pub struct FeedExpander {
    pub calendar_id: String,
    pub is_epacta_feed: bool,
    pub limits: ExpandLimits,
}

impl FeedExpander {
    pub fn new(calendar_id: impl Into<String>, is_epacta_feed: bool) -> Self {
        FeedExpander {
            calendar_id: calendar_id.into(),
            is_epacta_feed,
            limits: ExpandLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ExpandLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Decode and expand raw ICS text.
    ///
    /// A feed that cannot be decoded is logged and yields no events, so one
    /// broken calendar never stops the others.
    pub fn expand_ics(&self, content: &str, now: DateTime<Utc>) -> Vec<CalendarEvent> {
        match ics::decode(content) {
            Ok(decoded) => self.expand(&decoded, now),
            Err(e) => {
                tracing::warn!(calendar_id = %self.calendar_id, error = %e, "Feed could not be decoded");
                Vec::new()
            }
        }
    }

    /// Materialize every occurrence within the window around `now`, sorted by start.
    pub fn expand(&self, decoded: &DecodedCalendar, now: DateTime<Utc>) -> Vec<CalendarEvent> {
        let window = DateRange::around(now, self.limits.past_months, self.limits.future_months);

        let mut seen = HashSet::new();
        let mut events = Vec::new();

        for source in &decoded.events {
            let materialized = if source.is_recurring() {
                self.expand_recurring(source, &window)
            } else if window.contains(source.start) {
                let id = match source.recurrence_id {
                    Some(recurrence_id) => CalendarEvent::occurrence_id(&source.uid, recurrence_id),
                    None => source.uid.clone(),
                };
                vec![self.materialize(id, source.occurrence(source.start), source.all_day)]
            } else {
                Vec::new()
            };

            for event in materialized {
                if seen.insert(event.id.clone()) {
                    events.push(event);
                } else {
                    tracing::debug!(id = %event.id, "Dropping duplicate event");
                }
            }
        }

        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        tracing::debug!(
            calendar_id = %self.calendar_id,
            count = events.len(),
            from = %window.from,
            to = %window.to,
            "Expanded feed"
        );

        events
    }

    fn expand_recurring(&self, source: &DecodedEvent, window: &DateRange) -> Vec<CalendarEvent> {
        let mut events = Vec::new();

        for (step, at) in source.occurrences().enumerate() {
            if step >= self.limits.max_occurrences {
                tracing::warn!(
                    uid = %source.uid,
                    limit = self.limits.max_occurrences,
                    "Recurrence expansion capped"
                );
                break;
            }
            // Occurrences are chronological, nothing later can fall inside.
            if at > window.to {
                break;
            }
            if at < window.from || source.is_cancelled(at) {
                continue;
            }

            let id = CalendarEvent::occurrence_id(&source.uid, at);
            events.push(self.materialize(id, source.occurrence(at), source.all_day));
        }

        events
    }

    fn materialize(&self, id: String, occurrence: Occurrence, all_day: bool) -> CalendarEvent {
        let metadata = match &occurrence.description {
            Some(description) if self.is_epacta_feed => Some(annotation::parse(description)),
            _ => None,
        };
        let raw_description = occurrence.description.unwrap_or_default();

        CalendarEvent {
            id,
            title: occurrence.summary,
            description: raw_description.clone(),
            raw_description,
            description_override: None,
            location: occurrence.location.unwrap_or_default(),
            start: occurrence.start,
            end: occurrence.end,
            all_day,
            metadata,
            calendar_id: self.calendar_id.clone(),
        }
    }
}
