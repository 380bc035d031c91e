//! VEVENT property extraction on top of the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property},
};

/// A DTSTART/DTEND-style value as written in the feed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Resolve to an instant. Dates become midnight UTC and floating times are
    /// read as UTC; unknown TZIDs fall back to UTC as well.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
            EventTime::DateTimeUtc(dt) => *dt,
            EventTime::DateTimeFloating(dt) => dt.and_utc(),
            EventTime::DateTimeZoned { datetime, tzid } => match known_tz(tzid) {
                Some(tz) => tz
                    .from_local_datetime(datetime)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| datetime.and_utc()),
                None => {
                    tracing::warn!(tzid = %tzid, "Unknown time zone, reading as UTC");
                    datetime.and_utc()
                }
            },
        }
    }
}

pub(crate) fn known_tz(tzid: &str) -> Option<chrono_tz::Tz> {
    tzid.trim_matches('"').parse().ok()
}

/// Everything the decoder needs from one VEVENT.
#[derive(Debug)]
pub(crate) struct ParsedComponent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: Option<DateTime<Utc>>,
    pub rrule: Option<String>,
    pub rdates: Vec<DateTime<Utc>>,
    pub exdates: Vec<DateTime<Utc>>,
    pub recurrence_id: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

/// Extract a VEVENT. Returns `None` when UID or DTSTART is missing or unreadable.
pub(crate) fn parse_component(vevent: &Component) -> Option<ParsedComponent> {
    let uid = vevent.find_prop("UID")?.val.to_string();
    let start = to_event_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);

    let summary = text_prop(vevent, "SUMMARY").unwrap_or_default();
    let description = text_prop(vevent, "DESCRIPTION");
    let location = text_prop(vevent, "LOCATION");

    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|t| to_event_time(t).to_utc())
        .or_else(|| {
            let duration = parse_duration(vevent.find_prop("DURATION")?.val.as_ref())?;
            Some(start.to_utc() + duration)
        });

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let rdates = date_list(vevent, "RDATE");
    let exdates = date_list(vevent, "EXDATE");

    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|t| to_event_time(t).to_utc());

    let cancelled = vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"));

    Some(ParsedComponent {
        uid,
        summary,
        description,
        location,
        start,
        end,
        rrule,
        rdates,
        exdates,
        recurrence_id,
        cancelled,
    })
}

fn text_prop(vevent: &Component, name: &str) -> Option<String> {
    vevent
        .find_prop(name)
        .map(|p| unescape_text(p.val.as_ref()))
}

/// Undo RFC 5545 TEXT escaping (`\n`, `\,`, `\;`, `\\`).
pub(crate) fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Collect every value of an RDATE/EXDATE-style property as instants.
///
/// Handles `TZID`, `VALUE=DATE`, UTC and floating values, comma-separated
/// lists and repeated properties.
fn date_list(vevent: &Component, name: &str) -> Vec<DateTime<Utc>> {
    vevent
        .properties
        .iter()
        .filter(|p| p.name == name)
        .flat_map(parse_date_values)
        .collect()
}

fn parse_date_values(prop: &Property) -> Vec<DateTime<Utc>> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let time = if is_date || !s.contains('T') {
                EventTime::Date(NaiveDate::parse_from_str(s, "%Y%m%d").ok()?)
            } else if let Some(utc) = s.strip_suffix('Z') {
                let dt = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
                EventTime::DateTimeUtc(dt.and_utc())
            } else {
                let dt = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
                match &tzid {
                    Some(tz) => EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    },
                    None => EventTime::DateTimeFloating(dt),
                }
            };
            Some(time.to_utc())
        })
        .collect()
}

/// Parse a DURATION value (`PT1H30M`, `P1D`, `-PT15M`).
fn parse_duration(value: &str) -> Option<Duration> {
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.trim_start_matches('+')),
    };

    let duration = iso8601::duration(body).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration).ok()?;

    Some(if negative { -duration } else { duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text(r"bl / Misal\, p. 3\nsigue"), "bl / Misal, p. 3\nsigue");
        assert_eq!(unescape_text(r"a\;b\\c"), r"a;b\c");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_zoned_time_resolves_through_tz_database() {
        let time = EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            tzid: "Europe/Madrid".to_string(),
        };

        assert_eq!(
            time.to_utc(),
            Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unknown_zone_reads_as_utc() {
        let time = EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            tzid: "Romance Standard Time".to_string(),
        };

        assert_eq!(
            time.to_utc(),
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT1H30M"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("garbage"), None);
    }
}
