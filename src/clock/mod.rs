pub mod window;

use std::fmt;

use anyhow::{anyhow, Result};
use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use chrono_tz::Tz;

pub use window::{parse_reference_date, resolve, PeriodKind, TimeWindow, WindowError};

/// Longest local-time gap searched when midnight does not exist (DST at 00:00).
const MAX_GAP_STEPS: u32 = 12;
const GAP_STEP_MINUTES: i64 = 15;

/// Time zone the report is expressed in.
///
/// All accounting timestamps are normalized into this zone at read time and
/// every calendar-day boundary is resolved against it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ReportZone {
    /// The process's local zone (`TZ` / `/etc/localtime`).
    Local,
    /// An explicit IANA zone.
    Named(Tz),
}

impl fmt::Debug for ReportZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("ReportZone(local)"),
            Self::Named(tz) => write!(f, "ReportZone({})", tz.name()),
        }
    }
}

impl ReportZone {
    /// Build a zone from an optional IANA name. `None` or empty selects local time.
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim) {
            None | Some("") => Ok(Self::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|_| anyhow!("unknown time zone: {name}")),
        }
    }

    /// Convert UTC epoch seconds into this zone.
    pub fn from_epoch(&self, secs: i64) -> Option<DateTime<FixedOffset>> {
        let utc = DateTime::<Utc>::from_timestamp(secs, 0)?;
        Some(self.from_utc(&utc.naive_utc()))
    }

    /// Convert a naive UTC date-time into this zone.
    pub fn from_utc(&self, utc: &NaiveDateTime) -> DateTime<FixedOffset> {
        match self {
            Self::Local => fix(Local.from_utc_datetime(utc)),
            Self::Named(tz) => fix(tz.from_utc_datetime(utc)),
        }
    }

    /// First instant of `day` in this zone.
    pub fn day_start(&self, day: NaiveDate) -> DateTime<FixedOffset> {
        match self {
            Self::Local => start_of_day(&Local, day),
            Self::Named(tz) => start_of_day(tz, day),
        }
    }

    /// Current calendar date in this zone.
    pub fn today(&self) -> NaiveDate {
        self.from_utc(&Utc::now().naive_utc()).date_naive()
    }
}

fn fix<Tz: TimeZone>(dt: DateTime<Tz>) -> DateTime<FixedOffset> {
    let offset = dt.offset().fix();
    dt.with_timezone(&offset)
}

/// Resolve local midnight of `day`. When midnight falls inside a DST gap the
/// day starts at the first local time that exists.
fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<FixedOffset> {
    let midnight = day.and_time(NaiveTime::MIN);
    let mut local = midnight;

    for _ in 0..MAX_GAP_STEPS {
        if let Some(dt) = tz.from_local_datetime(&local).earliest() {
            return fix(dt);
        }
        local += Duration::minutes(GAP_STEP_MINUTES);
    }

    fix(tz.from_utc_datetime(&midnight))
}
