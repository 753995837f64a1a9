//! Calendar window resolution for daily, weekly and monthly reports.
//!
//! Day boundaries are local midnights resolved in the report zone, so a day
//! containing a DST transition spans 23 or 25 real hours.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use super::ReportZone;

/// Reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Whether samples are bucketed per calendar day rather than per native interval.
    pub const fn buckets_by_day(self) -> bool {
        !matches!(self, Self::Daily)
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(WindowError::UnknownPeriod(s.to_string())),
        }
    }
}

/// Errors raised while interpreting invocation input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("unknown report period: {0:?} (expected daily, weekly or monthly)")]
    UnknownPeriod(String),

    #[error("invalid reference date {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("reference date {0} puts the report window outside the supported calendar")]
    OutOfRange(NaiveDate),
}

/// Parse a `YYYY-MM-DD` reference date.
pub fn parse_reference_date(s: &str) -> Result<NaiveDate, WindowError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| WindowError::InvalidDate(s.to_string()))
}

/// Resolved calendar window of one report run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeWindow {
    pub period: PeriodKind,
    /// Contiguous, non-empty, ascending calendar days.
    pub days: Vec<NaiveDate>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Start instant of every day plus the day after the last one.
    #[serde(skip)]
    pub boundaries: Vec<DateTime<FixedOffset>>,
}

impl TimeWindow {
    pub fn first_day(&self) -> NaiveDate {
        self.days[0]
    }

    pub fn last_day(&self) -> NaiveDate {
        self.days[self.days.len() - 1]
    }

    /// Whether `day` falls inside the window.
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.first_day() && day <= self.last_day()
    }

    /// Whether `instant` falls inside `[start, end)`.
    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        *instant >= self.start && *instant < self.end
    }

    /// Position of `day` in `days`.
    pub fn day_index(&self, day: NaiveDate) -> Option<usize> {
        if !self.contains_day(day) {
            return None;
        }
        usize::try_from((day - self.first_day()).num_days()).ok()
    }

    /// Real-time midpoint of the day at `index`, used to stamp daily buckets.
    pub fn day_midpoint(&self, index: usize) -> Option<DateTime<FixedOffset>> {
        let start = *self.boundaries.get(index)?;
        let end = *self.boundaries.get(index + 1)?;
        Some(start + (end - start) / 2)
    }

    /// Length of the window in real seconds.
    pub fn span_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Compute the calendar window a report run on `reference` covers.
///
/// - daily: the day before `reference`.
/// - weekly: the seven days ending the day before `reference`.
/// - monthly: the full month preceding `reference`'s month.
pub fn resolve(
    period: PeriodKind,
    reference: NaiveDate,
    zone: &ReportZone,
) -> Result<TimeWindow, WindowError> {
    let out_of_range = || WindowError::OutOfRange(reference);

    let yesterday = reference.pred_opt().ok_or_else(out_of_range)?;

    let (first, last) = match period {
        PeriodKind::Daily => (yesterday, yesterday),
        PeriodKind::Weekly => {
            let first = reference
                .checked_sub_days(Days::new(7))
                .ok_or_else(out_of_range)?;
            (first, yesterday)
        }
        PeriodKind::Monthly => {
            let month_start = reference.with_day(1).ok_or_else(out_of_range)?;
            let last = month_start.pred_opt().ok_or_else(out_of_range)?;
            let first = last.with_day(1).ok_or_else(out_of_range)?;
            (first, last)
        }
    };

    let days: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
    let after_last = last.succ_opt().ok_or_else(out_of_range)?;

    let mut boundaries: Vec<DateTime<FixedOffset>> =
        days.iter().map(|day| zone.day_start(*day)).collect();
    boundaries.push(zone.day_start(after_last));

    let start = boundaries[0];
    let end = boundaries[boundaries.len() - 1];

    Ok(TimeWindow {
        period,
        days,
        start,
        end,
        boundaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const HOUR: i64 = 3600;
    const DAY: i64 = 24 * HOUR;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn paris() -> ReportZone {
        ReportZone::Named(chrono_tz::Europe::Paris)
    }

    fn utc() -> ReportZone {
        ReportZone::Named(chrono_tz::UTC)
    }

    #[test]
    fn test_daily_covers_yesterday() {
        let w = resolve(PeriodKind::Daily, date(2024, 3, 1), &utc()).expect("resolve");
        assert_eq!(w.days, vec![date(2024, 2, 29)]);
        assert_eq!(w.span_seconds(), DAY);
        assert_eq!(w.start.hour(), 0);
    }

    #[test]
    fn test_weekly_covers_seven_days_before_reference() {
        let w = resolve(PeriodKind::Weekly, date(2024, 5, 13), &utc()).expect("resolve");
        assert_eq!(w.days.len(), 7);
        assert_eq!(w.first_day(), date(2024, 5, 6));
        assert_eq!(w.last_day(), date(2024, 5, 12));
        assert_eq!(w.span_seconds(), 7 * DAY);
    }

    #[test]
    fn test_monthly_lengths_follow_calendar() {
        let cases = [
            (date(2024, 3, 10), 29), // leap February
            (date(2023, 3, 1), 28),  // non-leap February
            (date(2100, 3, 31), 28), // century, not leap
            (date(2000, 3, 2), 29),  // divisible by 400
            (date(2024, 5, 1), 30),  // April
            (date(2024, 8, 20), 31), // July
        ];
        for (reference, expected) in cases {
            let w = resolve(PeriodKind::Monthly, reference, &utc()).expect("resolve");
            assert_eq!(w.days.len(), expected, "reference {reference}");
            assert_eq!(w.first_day().day(), 1);
            assert_eq!(w.span_seconds(), expected as i64 * DAY);
        }
    }

    #[test]
    fn test_monthly_january_reports_previous_december() {
        let w = resolve(PeriodKind::Monthly, date(2025, 1, 1), &utc()).expect("resolve");
        assert_eq!(w.first_day(), date(2024, 12, 1));
        assert_eq!(w.last_day(), date(2024, 12, 31));
    }

    #[test]
    fn test_days_are_contiguous() {
        for period in [PeriodKind::Daily, PeriodKind::Weekly, PeriodKind::Monthly] {
            let w = resolve(period, date(2024, 3, 3), &paris()).expect("resolve");
            for pair in w.days.windows(2) {
                assert_eq!(pair[0].succ_opt(), Some(pair[1]));
            }
            assert_eq!(w.boundaries.len(), w.days.len() + 1);
        }
    }

    #[test]
    fn test_spring_forward_day_is_23_hours() {
        // Europe/Paris springs forward on 2024-03-31.
        let w = resolve(PeriodKind::Daily, date(2024, 4, 1), &paris()).expect("resolve");
        assert_eq!(w.days, vec![date(2024, 3, 31)]);
        assert_eq!(w.span_seconds(), DAY - HOUR);
    }

    #[test]
    fn test_fall_back_day_is_25_hours() {
        // Europe/Paris falls back on 2024-10-27.
        let w = resolve(PeriodKind::Daily, date(2024, 10, 28), &paris()).expect("resolve");
        assert_eq!(w.span_seconds(), DAY + HOUR);
    }

    #[test]
    fn test_weekly_across_transitions() {
        let spring = resolve(PeriodKind::Weekly, date(2024, 4, 2), &paris()).expect("resolve");
        assert!(spring.contains_day(date(2024, 3, 31)));
        assert_eq!(spring.span_seconds(), 7 * DAY - HOUR);

        let fall = resolve(PeriodKind::Weekly, date(2024, 10, 30), &paris()).expect("resolve");
        assert!(fall.contains_day(date(2024, 10, 27)));
        assert_eq!(fall.span_seconds(), 7 * DAY + HOUR);
    }

    #[test]
    fn test_monthly_across_transition() {
        let w = resolve(PeriodKind::Monthly, date(2024, 4, 15), &paris()).expect("resolve");
        assert_eq!(w.days.len(), 31);
        assert_eq!(w.span_seconds(), 31 * DAY - HOUR);
        assert_eq!(w.start.offset().local_minus_utc(), HOUR as i32);
        assert_eq!(w.end.offset().local_minus_utc(), 2 * HOUR as i32);
    }

    #[test]
    fn test_day_midpoint_on_short_day() {
        let w = resolve(PeriodKind::Weekly, date(2024, 4, 2), &paris()).expect("resolve");
        let idx = w.day_index(date(2024, 3, 31)).expect("in window");
        let mid = w.day_midpoint(idx).expect("midpoint");
        assert_eq!((mid - w.boundaries[idx]).num_seconds(), (DAY - HOUR) / 2);
        assert!(w.day_midpoint(w.days.len()).is_none());
    }

    #[test]
    fn test_contains_is_half_open() {
        let w = resolve(PeriodKind::Daily, date(2024, 6, 2), &utc()).expect("resolve");
        assert!(w.contains(&w.start));
        assert!(!w.contains(&w.end));
        assert_eq!(w.day_index(date(2024, 6, 2)), None);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = resolve(PeriodKind::Monthly, date(2024, 11, 5), &paris()).expect("resolve");
        let b = resolve(PeriodKind::Monthly, date(2024, 11, 5), &paris()).expect("resolve");
        assert_eq!(a, b);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("weekly".parse::<PeriodKind>(), Ok(PeriodKind::Weekly));
        assert_eq!(" Monthly ".parse::<PeriodKind>(), Ok(PeriodKind::Monthly));
        assert_eq!(
            "yearly".parse::<PeriodKind>(),
            Err(WindowError::UnknownPeriod("yearly".to_string()))
        );
    }

    #[test]
    fn test_reference_date_parsing() {
        assert_eq!(parse_reference_date("2024-02-29"), Ok(date(2024, 2, 29)));
        assert!(matches!(
            parse_reference_date("2023-02-29"),
            Err(WindowError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_reference_date("29/02/2024"),
            Err(WindowError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_out_of_range_reference() {
        let err = resolve(PeriodKind::Weekly, NaiveDate::MIN, &utc()).unwrap_err();
        assert_eq!(err, WindowError::OutOfRange(NaiveDate::MIN));
    }
}
