//! Date range used for windowing feeds and filtering stored events.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, Utc};

/// Inclusive range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// `[now - past_months, now + future_months]`.
    pub fn around(now: DateTime<Utc>, past_months: u32, future_months: u32) -> Self {
        DateRange {
            from: now
                .checked_sub_months(Months::new(past_months))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            to: now
                .checked_add_months(Months::new(future_months))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant <= self.to
    }

    /// Parse CLI arguments (`YYYY-MM-DD`). A missing `from` means `now`, a
    /// missing `to` means `default_days` after `from`.
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        now: DateTime<Utc>,
        default_days: i64,
    ) -> Result<Self, String> {
        let from_dt = match from {
            Some(s) => parse_date_start(s)?,
            None => now,
        };

        let to_dt = match to {
            Some(s) => parse_date_end(s)?,
            None => from_dt + Duration::days(default_days),
        };

        if to_dt < from_dt {
            return Err(format!("'{}' is before '{}'", to_dt.date_naive(), from_dt.date_naive()));
        }

        Ok(DateRange {
            from: from_dt,
            to: to_dt,
        })
    }
}

/// Parse YYYY-MM-DD as start of day in UTC
fn parse_date_start(s: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

/// Parse YYYY-MM-DD as end of day in UTC
fn parse_date_end(s: &str) -> Result<DateTime<Utc>, String> {
    Ok(parse_date_start(s)? + Duration::days(1) - Duration::seconds(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_around_spans_one_year_back_two_forward() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let range = DateRange::around(now, 12, 24);

        assert_eq!(range.from, Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap());
        assert_eq!(range.to, Utc.with_ymd_and_hms(2028, 10, 18, 12, 0, 0).unwrap());
        assert!(range.contains(range.from));
        assert!(range.contains(range.to));
        assert!(!range.contains(range.to + Duration::seconds(1)));
    }

    #[test]
    fn test_from_args() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

        let range = DateRange::from_args(Some("2026-01-01"), Some("2026-01-31"), now, 7).unwrap();
        assert_eq!(range.from, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.to, Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap());

        let default = DateRange::from_args(None, None, now, 7).unwrap();
        assert_eq!(default.from, now);
        assert_eq!(default.to, now + Duration::days(7));

        assert!(DateRange::from_args(Some("01/01/2026"), None, now, 7).is_err());
        assert!(DateRange::from_args(Some("2026-02-01"), Some("2026-01-01"), now, 7).is_err());
    }
}
