//! Recurrence rules for decoded events.
//!
//! The master's DTSTART, RRULE, RDATE and EXDATE values are fed to the rrule
//! crate; RECURRENCE-ID instances from the same feed replace the occurrence
//! they point at.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;

use crate::error::{EpactaError, EpactaResult};
use crate::ics::parse::{EventTime, known_tz};

/// A moved, edited or cancelled instance of a recurring event.
#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Recurrence {
    rules: RRuleSet,
    /// Keyed by RECURRENCE-ID in epoch milliseconds.
    instances: HashMap<i64, Instance>,
}

impl Recurrence {
    pub fn new(
        start: &EventTime,
        rrule: &str,
        rdates: &[DateTime<Utc>],
        exdates: &[DateTime<Utc>],
    ) -> EpactaResult<Self> {
        let rule_str = build_rrule_string(start, rrule, rdates, exdates);
        let rules: RRuleSet = rule_str
            .parse()
            .map_err(|e| EpactaError::IcsParse(format!("Failed to parse RRULE '{rrule}': {e}")))?;

        Ok(Recurrence {
            rules,
            instances: HashMap::new(),
        })
    }

    pub fn add_instance(&mut self, recurrence_id: DateTime<Utc>, instance: Instance) {
        self.instances
            .insert(recurrence_id.timestamp_millis(), instance);
    }

    pub fn instance(&self, at: DateTime<Utc>) -> Option<&Instance> {
        self.instances.get(&at.timestamp_millis())
    }

    /// Rule-generated starts in chronological order, cancelled ones included.
    pub fn starts(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (&self.rules).into_iter().map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_cancelled(&self, at: DateTime<Utc>) -> bool {
        self.instance(at).is_some_and(|i| i.cancelled)
    }
}

/// Build an iCalendar-format rule block for the rrule crate parser.
fn build_rrule_string(
    start: &EventTime,
    rrule: &str,
    rdates: &[DateTime<Utc>],
    exdates: &[DateTime<Utc>],
) -> String {
    let mut lines = Vec::new();

    // The rrule crate needs a datetime, so all-day dates become midnight UTC
    let dtstart = match start {
        EventTime::DateTimeZoned { datetime, tzid } if known_tz(tzid).is_some() => format!(
            "DTSTART;TZID={}:{}",
            tzid.trim_matches('"'),
            datetime.format("%Y%m%dT%H%M%S")
        ),
        other => format!("DTSTART:{}", utc_stamp(other.to_utc())),
    };
    lines.push(dtstart);

    lines.push(format!("RRULE:{}", normalize_until(rrule)));

    for rdate in rdates {
        lines.push(format!("RDATE:{}", utc_stamp(*rdate)));
    }
    for exdate in exdates {
        lines.push(format!("EXDATE:{}", utc_stamp(*exdate)));
    }

    lines.join("\n")
}

fn utc_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// The rrule crate insists on a UTC UNTIL; feeds often send a bare date or a
/// floating time.
fn normalize_until(rrule: &str) -> String {
    rrule
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                if !value.contains('T') {
                    format!("UNTIL={value}T235959Z")
                } else if !value.ends_with('Z') {
                    format!("UNTIL={value}Z")
                } else {
                    part.to_string()
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Duration used to derive an occurrence's end from its start.
pub(crate) fn span(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<Duration> {
    end.map(|end| end - start)
}
