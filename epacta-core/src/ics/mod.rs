//! ICS feed decoding.
//!
//! Turns raw iCalendar text into [`DecodedEvent`]s: one per master VEVENT,
//! with recurring events exposing their occurrence starts lazily. Grammar
//! and recurrence arithmetic are delegated to the icalendar and rrule crates.

mod parse;
mod recurrence;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use icalendar::parser::{read_calendar, unfold};

use crate::error::{EpactaError, EpactaResult};
use parse::{ParsedComponent, parse_component};
use recurrence::{Instance, Recurrence, span};

/// All events of one feed.
#[derive(Debug, Clone, Default)]
pub struct DecodedCalendar {
    pub events: Vec<DecodedEvent>,
}

/// One master event (or a stand-alone instance whose master is missing).
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// The source value was a DATE without time of day.
    pub all_day: bool,
    /// Set for a RECURRENCE-ID instance that has no master in the feed.
    pub recurrence_id: Option<DateTime<Utc>>,
    recurrence: Option<Recurrence>,
}

/// A concrete occurrence with per-instance overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl DecodedEvent {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Rule-generated starts in chronological order, cancelled instances
    /// included. A non-recurring event yields its own start once.
    pub fn occurrences(&self) -> Box<dyn Iterator<Item = DateTime<Utc>> + '_> {
        match &self.recurrence {
            Some(recurrence) => Box::new(recurrence.starts()),
            None => Box::new(std::iter::once(self.start)),
        }
    }

    /// The feed cancels the occurrence generated at `at`.
    pub fn is_cancelled(&self, at: DateTime<Utc>) -> bool {
        self.recurrence.as_ref().is_some_and(|r| r.is_cancelled(at))
    }

    /// Resolve the occurrence generated at `at`, applying a RECURRENCE-ID
    /// instance when the feed carries one.
    pub fn occurrence(&self, at: DateTime<Utc>) -> Occurrence {
        if let Some(instance) = self.recurrence.as_ref().and_then(|r| r.instance(at)) {
            return Occurrence {
                start: instance.start,
                end: instance.end,
                summary: instance.summary.clone(),
                description: instance.description.clone(),
                location: instance.location.clone(),
            };
        }

        Occurrence {
            start: at,
            end: span(self.start, self.end).map(|d| at + d),
            summary: self.summary.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
        }
    }

    fn from_component(component: ParsedComponent) -> Self {
        let recurrence = component.rrule.as_deref().and_then(|rrule| {
            Recurrence::new(&component.start, rrule, &component.rdates, &component.exdates)
                .inspect_err(|e| {
                    tracing::warn!(uid = %component.uid, error = %e, "Treating event as non-recurring");
                })
                .ok()
        });

        DecodedEvent {
            start: component.start.to_utc(),
            all_day: component.start.is_date(),
            uid: component.uid,
            summary: component.summary,
            description: component.description,
            location: component.location,
            end: component.end,
            recurrence_id: component.recurrence_id,
            recurrence,
        }
    }
}

/// Decode raw ICS text.
///
/// Fails only when the text is not an iCalendar document at all; individual
/// VEVENTs that lack a UID or DTSTART are skipped with a warning.
#[tracing::instrument(skip(content), fields(content_len = content.len()))]
pub fn decode(content: &str) -> EpactaResult<DecodedCalendar> {
    let unfolded = unfold(content.trim_start_matches('\u{feff}'));

    let header = "BEGIN:VCALENDAR";
    if !unfolded
        .trim_start()
        .get(..header.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(header))
    {
        return Err(EpactaError::IcsParse("missing BEGIN:VCALENDAR".into()));
    }

    let calendar = read_calendar(&unfolded).map_err(|e| EpactaError::IcsParse(e.to_string()))?;

    let mut masters: Vec<ParsedComponent> = Vec::new();
    let mut instances: Vec<ParsedComponent> = Vec::new();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_component(vevent) {
            Some(component) if component.recurrence_id.is_some() => instances.push(component),
            Some(component) => masters.push(component),
            None => tracing::warn!("Skipping VEVENT without UID or DTSTART"),
        }
    }

    let mut events: Vec<DecodedEvent> = masters.into_iter().map(DecodedEvent::from_component).collect();

    let recurring_by_uid: HashMap<String, usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_recurring())
        .map(|(i, e)| (e.uid.clone(), i))
        .collect();

    for component in instances {
        let Some(recurrence_id) = component.recurrence_id else {
            continue;
        };
        let master = recurring_by_uid
            .get(&component.uid)
            .and_then(|&i| events.get_mut(i))
            .and_then(|e| e.recurrence.as_mut());

        match master {
            Some(recurrence) => recurrence.add_instance(
                recurrence_id,
                Instance {
                    start: component.start.to_utc(),
                    end: component.end,
                    summary: component.summary,
                    description: component.description,
                    location: component.location,
                    cancelled: component.cancelled,
                },
            ),
            None if component.cancelled => {}
            None => events.push(DecodedEvent::from_component(component)),
        }
    }

    tracing::debug!(count = events.len(), "Decoded feed");

    Ok(DecodedCalendar { events })
}
