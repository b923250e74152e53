//! Archive epochs and requested date ranges.
//!
//! Archive epochs are TT2000 values: nanoseconds elapsed since
//! 2000-01-01T12:00:00 TT, counting leap seconds. Conversion to UTC uses the
//! fixed J2000 offset and the leap seconds inserted since 2000.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{DatasetError, Result};

/// J2000 (2000-01-01T11:58:55.816 UTC) as Unix nanoseconds.
const J2000_UNIX_NS: i64 = 946_727_935_816_000_000;

const NS_PER_SEC: i64 = 1_000_000_000;

/// UTC instants (Unix seconds) directly after each leap second inserted since 2000.
const LEAP_SECONDS_UNIX: [i64; 5] = [
    1_136_073_600, // 2006-01-01
    1_230_768_000, // 2009-01-01
    1_341_100_800, // 2012-07-01
    1_435_708_800, // 2015-07-01
    1_483_228_800, // 2017-01-01
];

// ---------------------------------------------------------------------------
// Epoch conversion
// ---------------------------------------------------------------------------

/// Convert a TT2000 epoch to a UTC timestamp.
pub fn epoch_to_datetime(epoch: i64) -> DateTime<Utc> {
    let elapsed = J2000_UNIX_NS.saturating_add(epoch);
    let mut leaps = 0i64;
    for leap in LEAP_SECONDS_UNIX {
        if elapsed - leaps * NS_PER_SEC >= leap * NS_PER_SEC {
            leaps += 1;
        }
    }
    Utc.timestamp_nanos(elapsed - leaps * NS_PER_SEC)
}

/// Convert a UTC timestamp to a TT2000 epoch.
pub fn datetime_to_epoch(time: DateTime<Utc>) -> i64 {
    let unix_ns = time
        .timestamp()
        .saturating_mul(NS_PER_SEC)
        .saturating_add(i64::from(time.timestamp_subsec_nanos()));
    let leaps = LEAP_SECONDS_UNIX
        .iter()
        .filter(|&&leap| unix_ns >= leap * NS_PER_SEC)
        .count() as i64;
    unix_ns - J2000_UNIX_NS + leaps * NS_PER_SEC
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// `YYYY-MM-DD` bounds, inclusive on both ends.
    WholeDays,
    /// Date-plus-time bounds, half-open `[start, end)`.
    SubDay,
}

/// A requested time window, parsed from a pair of strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: RangeKind,
}

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d/%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

impl DateRange {
    /// Parse `[start, end]`; both must be `YYYY-MM-DD` or both date-plus-time.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let (start, start_kind) = parse_bound(start)?;
        let (end, end_kind) = parse_bound(end)?;
        if start_kind != end_kind {
            return Err(DatasetError::Format(
                "start and end must use the same date format".to_string(),
            ));
        }
        if start > end {
            return Err(DatasetError::Format(format!(
                "range start {start} is after range end {end}"
            )));
        }
        Ok(DateRange {
            start,
            end,
            kind: start_kind,
        })
    }

    /// Whole-day range between two calendar dates.
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: start.and_time(NaiveTime::MIN).and_utc(),
            end: end.and_time(NaiveTime::MIN).and_utc(),
            kind: RangeKind::WholeDays,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Whether a record with calendar date `date` and timestamp `time` is inside the range.
    ///
    /// Whole-day ranges compare calendar dates inclusively; sub-day ranges
    /// compare timestamps with an exclusive end.
    pub fn admits(&self, date: NaiveDate, time: DateTime<Utc>) -> bool {
        match self.kind {
            RangeKind::WholeDays => self.start_date() <= date && date <= self.end_date(),
            RangeKind::SubDay => self.start <= time && time < self.end,
        }
    }

    /// Whether the range shares at least one day with the inclusive period.
    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.start_date() <= last && self.end_date() >= first
    }

    /// Listing dates for the archive catalogue, which treats the end date as exclusive.
    pub fn catalogue_dates(&self) -> (NaiveDate, NaiveDate) {
        (self.start_date(), self.end_date() + Duration::days(1))
    }

    /// Every `(year, month)` the range touches, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let (mut year, mut month) = (self.start.year(), self.start.month());
        let last = (self.end.year(), self.end.month());
        let mut months = Vec::new();
        while (year, month) <= last {
            months.push((year, month));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }
}

fn parse_bound(text: &str) -> Result<(DateTime<Utc>, RangeKind)> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok((date.and_time(NaiveTime::MIN).and_utc(), RangeKind::WholeDays));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| (dt.and_utc(), RangeKind::SubDay))
        .ok_or_else(|| {
            DatasetError::Format(format!(
                "'{text}' is neither YYYY-MM-DD nor YYYY-MM-DD/HH:MM:SS"
            ))
        })
}
