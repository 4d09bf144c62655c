//! Timestamps, time-column parsing and time-range selection.
//!
//! Logging tools write time in many shapes: a `Date` column next to a
//! `Time` column (`17.03.2025` / `21:04:11.372`), a single ISO or RFC 3339
//! datetime, or only a wall-clock time. [`TimeParser::detect`] tries the
//! known layouts against the leading time values of a file and the first
//! layout that fits is kept for every later row of that file.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::Serialize;

/// Position of a sample on the time axis.
///
/// Files whose time column can be parsed carry wall-clock timestamps.
/// Files without usable time fall back to the row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    Clock(NaiveDateTime),
    Index(u64),
}

impl Timestamp {
    /// Integer position usable for bucketing and alignment.
    ///
    /// Milliseconds since the Unix epoch for clock time, the row index otherwise.
    #[must_use]
    pub fn ordinal(self) -> i64 {
        match self {
            Timestamp::Clock(t) => t.and_utc().timestamp_millis(),
            Timestamp::Index(i) => i64::try_from(i).unwrap_or(i64::MAX),
        }
    }

    /// Position on the regression axis: minutes for clock time, samples otherwise.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn axis_value(self) -> f64 {
        match self {
            Timestamp::Clock(_) => self.ordinal() as f64 / 60_000.0,
            Timestamp::Index(i) => i as f64,
        }
    }

    #[must_use]
    pub fn time_of_day(self) -> Option<NaiveTime> {
        match self {
            Timestamp::Clock(t) => Some(t.time()),
            Timestamp::Index(_) => None,
        }
    }

    #[must_use]
    pub fn clock(self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::Clock(t) => Some(t),
            Timestamp::Index(_) => None,
        }
    }

    /// Floors a clock timestamp to the start of its `bucket`-wide window.
    ///
    /// Windows are aligned on multiples of the bucket width since the Unix
    /// epoch, so flooring an already floored timestamp is a no-op.
    #[must_use]
    pub fn floor_to(self, bucket: TimeDelta) -> Self {
        let width = bucket.num_milliseconds();
        match self {
            Timestamp::Clock(_) if width > 0 => {
                let start = self.ordinal().div_euclid(width) * width;
                DateTime::from_timestamp_millis(start)
                    .map_or(self, |t| Timestamp::Clock(t.naive_utc()))
            }
            _ => self,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Clock(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Timestamp::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// How samples of one file are placed on the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Parsed wall-clock timestamps.
    Clock,
    /// Synthetic row indices; time-based analyses are skipped.
    Sequence,
}

/// Which header columns carry time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeColumns {
    /// Separate date and time-of-day columns.
    DateAndTime { date: usize, time: usize },
    /// One column holding a datetime or a bare time.
    Single(usize),
}

const DATE_FORMATS: [&str; 7] = [
    "%d.%m.%Y", "%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y",
];

const CLOCK_FORMATS: [&str; 5] = [
    "%H:%M:%S%.f",
    "%I:%M:%S%.f %p",
    "%H:%M",
    "%I:%M %p",
    "%I:%M%p",
];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Clock jumps backwards by more than this are read as crossing midnight.
const MIDNIGHT_ROLLOVER: TimeDelta = TimeDelta::hours(12);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    /// `"{date} {time}"` parsed with a combined pattern.
    Combined(String),
    /// A datetime pattern applied to the time column alone.
    DateTime(&'static str),
    Rfc3339,
    /// A bare time of day, anchored on the epoch date.
    TimeOfDay(&'static str),
}

/// Parser for the time columns of one file.
///
/// Built by [`TimeParser::detect`] from the first of the leading time
/// values that parses, then applied unchanged to every row.
#[derive(Debug, Clone)]
pub struct TimeParser {
    columns: TimeColumns,
    layout: Layout,
    day_offset: i64,
    last_time: Option<NaiveTime>,
}

impl TimeParser {
    /// Finds the first layout that parses the time value of `row`.
    ///
    /// Returns `None` when no known layout applies.
    #[must_use]
    pub fn detect(columns: TimeColumns, row: &[&str]) -> Option<Self> {
        let candidates = candidate_layouts(columns);
        candidates.into_iter().find_map(|layout| {
            let mut parser = Self {
                columns,
                layout,
                day_offset: 0,
                last_time: None,
            };
            parser.parse(row).is_some().then(|| {
                // detection must not leave rollover state behind
                parser.day_offset = 0;
                parser.last_time = None;
                parser
            })
        })
    }

    /// Human-readable description of the detected layout.
    #[must_use]
    pub fn layout_description(&self) -> String {
        match &self.layout {
            Layout::Combined(p) => format!("date+time '{p}'"),
            Layout::DateTime(p) => format!("datetime '{p}'"),
            Layout::Rfc3339 => "RFC 3339".to_owned(),
            Layout::TimeOfDay(p) => format!("time of day '{p}'"),
        }
    }

    /// Returns `true` if the raw cells for this row hold no time at all.
    #[must_use]
    pub fn is_blank(columns: TimeColumns, row: &[&str]) -> bool {
        match columns {
            TimeColumns::DateAndTime { date, time } => {
                cell(row, date).is_empty() && cell(row, time).is_empty()
            }
            TimeColumns::Single(idx) => cell(row, idx).is_empty(),
        }
    }

    /// Parses the timestamp of one row.
    pub fn parse(&mut self, row: &[&str]) -> Option<NaiveDateTime> {
        let raw = match self.columns {
            TimeColumns::DateAndTime { date, time } => match &self.layout {
                Layout::Combined(_) => format!("{} {}", cell(row, date), cell(row, time)),
                _ => cell(row, time).to_owned(),
            },
            TimeColumns::Single(idx) => cell(row, idx).to_owned(),
        };
        if raw.trim().is_empty() {
            return None;
        }
        match &self.layout {
            Layout::Combined(pattern) => NaiveDateTime::parse_from_str(&raw, pattern).ok(),
            Layout::DateTime(pattern) => NaiveDateTime::parse_from_str(&raw, pattern).ok(),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|t| t.naive_utc()),
            Layout::TimeOfDay(pattern) => {
                let time = NaiveTime::parse_from_str(&raw, pattern).ok()?;
                Some(self.anchor(time))
            }
        }
    }

    fn anchor(&mut self, time: NaiveTime) -> NaiveDateTime {
        if let Some(last) = self.last_time
            && last.signed_duration_since(time) > MIDNIGHT_ROLLOVER
        {
            self.day_offset += 1;
        }
        self.last_time = Some(time);
        let day = NaiveDate::default() + TimeDelta::days(self.day_offset);
        day.and_time(time)
    }
}

fn cell<'a>(row: &[&'a str], idx: usize) -> &'a str {
    row.get(idx).map_or("", |s| s.trim())
}

fn candidate_layouts(columns: TimeColumns) -> Vec<Layout> {
    let mut layouts = vec![];
    if matches!(columns, TimeColumns::DateAndTime { .. }) {
        for date in DATE_FORMATS {
            for clock in CLOCK_FORMATS {
                layouts.push(Layout::Combined(format!("{date} {clock}")));
            }
        }
    }
    layouts.extend(DATETIME_FORMATS.into_iter().map(Layout::DateTime));
    layouts.push(Layout::Rfc3339);
    layouts.extend(CLOCK_FORMATS.into_iter().map(Layout::TimeOfDay));
    layouts
}

/// Portion of the timeline an analysis is restricted to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// Every sample.
    #[default]
    All,
    /// Samples whose time of day lies in `[from, to)`; wraps past midnight
    /// when `to <= from`.
    TimeOfDay { from: NaiveTime, to: NaiveTime },
    /// Samples in `[start, end)`.
    Between {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl TimeRange {
    #[must_use]
    pub fn morning() -> Self {
        Self::hours(6, 12)
    }

    #[must_use]
    pub fn afternoon() -> Self {
        Self::hours(12, 18)
    }

    #[must_use]
    pub fn evening() -> Self {
        Self::hours(18, 0)
    }

    #[must_use]
    pub fn night() -> Self {
        Self::hours(0, 6)
    }

    fn hours(from: u32, to: u32) -> Self {
        TimeRange::TimeOfDay {
            from: NaiveTime::from_hms_opt(from, 0, 0).unwrap_or_default(),
            to: NaiveTime::from_hms_opt(to, 0, 0).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, TimeRange::All)
    }

    /// Returns `true` if `timestamp` falls inside this range.
    ///
    /// Index timestamps carry no clock and are always inside.
    #[must_use]
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        let Timestamp::Clock(t) = timestamp else {
            return true;
        };
        match *self {
            TimeRange::All => true,
            TimeRange::TimeOfDay { from, to } => {
                let tod = t.time();
                if from < to {
                    from <= tod && tod < to
                } else {
                    tod >= from || tod < to
                }
            }
            TimeRange::Between { start, end } => start <= t && t < end,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::All => f.write_str("all"),
            TimeRange::TimeOfDay { from, to } => {
                write!(f, "{}-{}", from.format("%H:%M"), to.format("%H:%M"))?;
                if let Some(name) = preset_name(*from, *to) {
                    write!(f, " ({name})")?;
                }
                Ok(())
            }
            TimeRange::Between { start, end } => write!(
                f,
                "{}..{}",
                start.format("%Y-%m-%d %H:%M:%S"),
                end.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
}

fn preset_name(from: NaiveTime, to: NaiveTime) -> Option<&'static str> {
    if from.minute() != 0 || to.minute() != 0 {
        return None;
    }
    match (from.hour(), to.hour()) {
        (6, 12) => Some("morning"),
        (12, 18) => Some("afternoon"),
        (18, 0) => Some("evening"),
        (0, 6) => Some("night"),
        _ => None,
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display(
    "invalid time range '{input}' (expected all, morning, afternoon, evening, night, HH:MM-HH:MM or START..END)"
)]
pub struct ParseTimeRangeError {
    #[error(not(source))]
    input: String,
}

const RANGE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeRangeError {
            input: s.to_owned(),
        };
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "all" => return Ok(TimeRange::All),
            "morning" => return Ok(TimeRange::morning()),
            "afternoon" => return Ok(TimeRange::afternoon()),
            "evening" => return Ok(TimeRange::evening()),
            "night" => return Ok(TimeRange::night()),
            _ => {}
        }

        if let Some((start, end)) = trimmed.split_once("..") {
            let start = parse_range_datetime(start).ok_or_else(err)?;
            let end = parse_range_datetime(end).ok_or_else(err)?;
            if end <= start {
                return Err(err());
            }
            return Ok(TimeRange::Between { start, end });
        }

        let (from, to) = trimmed.split_once('-').ok_or_else(err)?;
        let from = NaiveTime::parse_from_str(from.trim(), "%H:%M").map_err(|_| err())?;
        let to = NaiveTime::parse_from_str(to.trim(), "%H:%M").map_err(|_| err())?;
        if from == to {
            return Err(err());
        }
        Ok(TimeRange::TimeOfDay { from, to })
    }
}

fn parse_range_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    RANGE_DATETIME_FORMATS
        .into_iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
