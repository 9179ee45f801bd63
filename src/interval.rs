//! ISO 8601 time intervals.
//!
//! An interval is written as one of
//!
//! * `P1D`, a bare duration that floats free of the calendar
//! * `2019-10-01T00:00:00Z/P1D`, a start and a duration
//! * `P1D/2019-10-02T00:00:00Z`, a duration and an end
//! * `2019-10-01T00:00:00Z/2019-10-02T00:00:00Z`, a start and an end
use std::fmt;
use std::str::FromStr;

use chrono::{offset::Utc, DateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::datestamp::{format_datestamp, parse_datestamp, DatestampError};
use crate::duration::{parse_duration, Duration, DurationError};
use crate::error::TooShort;

/// Which end of an interval a bound was written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Start,
    End,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Start => f.write_str("start"),
            Side::End => f.write_str("end"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error(transparent)]
    TooShort(#[from] TooShort),
    #[error("too many interval designators (slashes)")]
    TooManyDesignators,
    /// A bare duration failed to parse.
    #[error(transparent)]
    Duration(#[from] DurationError),
    #[error("parsing {side}: {source}")]
    Empty { side: Side, source: TooShort },
    #[error("parsing {side} datestamp: {source}")]
    Datestamp { side: Side, source: DatestampError },
    #[error("parsing {side} duration: {source}")]
    BoundDuration { side: Side, source: DurationError },
    #[error("interval cannot be bounded by two durations")]
    TwoDurations,
    #[error("interval end precedes its start")]
    Reversed,
}

impl IntervalError {
    /// The side a bound failed on, if the failure belongs to one.
    pub fn side(&self) -> Option<Side> {
        match self {
            IntervalError::Empty { side, .. }
            | IntervalError::Datestamp { side, .. }
            | IntervalError::BoundDuration { side, .. } => Some(*side),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    /// Derived from the two points when both are present.
    duration: Duration,
}

/// Constructors
impl Interval {
    pub fn floating(duration: Duration) -> Self {
        Interval {
            start: None,
            end: None,
            duration,
        }
    }
    pub fn starting(start: DateTime<Utc>, duration: Duration) -> Self {
        Interval {
            start: Some(start),
            end: None,
            duration,
        }
    }
    pub fn ending(duration: Duration, end: DateTime<Utc>) -> Self {
        Interval {
            start: None,
            end: Some(end),
            duration,
        }
    }
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, IntervalError> {
        if end < start {
            return Err(IntervalError::Reversed);
        }
        Ok(Interval {
            start: Some(start),
            end: Some(end),
            duration: end.signed_duration_since(start).into(),
        })
    }

    /// Both points plus the duration that separates them, kept as given.
    pub(crate) fn bounded(start: DateTime<Utc>, end: DateTime<Utc>, duration: Duration) -> Self {
        Interval {
            start: Some(start),
            end: Some(end),
            duration,
        }
    }
}

/// Getters
impl Interval {
    pub fn start(&self) -> Option<&DateTime<Utc>> {
        self.start.as_ref()
    }
    pub fn end(&self) -> Option<&DateTime<Utc>> {
        self.end.as_ref()
    }
    pub fn duration(&self) -> &Duration {
        &self.duration
    }
    /// Neither end is pinned to the calendar.
    pub fn is_floating(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl Interval {
    /// The start, or the end moved back by the duration.
    pub fn resolved_start(&self) -> Option<DateTime<Utc>> {
        match (self.start, self.end) {
            (Some(start), _) => Some(start),
            (None, Some(end)) => self.duration.sub_from(end),
            (None, None) => None,
        }
    }

    /// The end, or the start moved forward by the duration.
    pub fn resolved_end(&self) -> Option<DateTime<Utc>> {
        match (self.start, self.end) {
            (_, Some(end)) => Some(end),
            (Some(start), None) => self.duration.add_to(start),
            (None, None) => None,
        }
    }

    /// Whether `instant` falls in `[start, end)`, checking only the points that were given.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        let after_start = self.start.map_or(true, |start| *instant >= start);
        let before_end = self.end.map_or(true, |end| *instant < end);
        after_start && before_end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => {
                write!(f, "{}/{}", format_datestamp(start), format_datestamp(end))
            }
            (Some(start), None) => write!(f, "{}/{}", format_datestamp(start), self.duration),
            (None, Some(end)) => write!(f, "{}/{}", self.duration, format_datestamp(end)),
            (None, None) => write!(f, "{}", self.duration),
        }
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TooShort::check(s)?;
        let segments: Vec<&str> = s.split('/').collect();
        let interval = match segments.as_slice() {
            [duration] => Interval::floating(parse_duration(duration)?),
            [start, end] => {
                // The start is read in full before the end is looked at.
                let start = bound(Side::Start, start)?;
                let end = bound(Side::End, end)?;
                match (start, end) {
                    (Bound::Point(start), Bound::Duration(duration)) => {
                        Interval::starting(start, duration)
                    }
                    (Bound::Duration(duration), Bound::Point(end)) => {
                        Interval::ending(duration, end)
                    }
                    (Bound::Point(start), Bound::Point(end)) => Interval::between(start, end)?,
                    (Bound::Duration(_), Bound::Duration(_)) => {
                        return Err(IntervalError::TwoDurations)
                    }
                }
            }
            _ => return Err(IntervalError::TooManyDesignators),
        };
        trace!(
            literal = s,
            start = interval.start.is_some(),
            end = interval.end.is_some(),
            "parsed interval"
        );
        Ok(interval)
    }
}

impl TryFrom<&str> for Interval {
    type Error = IntervalError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for Interval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D>(deserializer: D) -> Result<Interval, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Interval::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse an ISO 8601 time interval.
pub fn parse_interval(input: &str) -> Result<Interval, IntervalError> {
    input.parse()
}

/// One side of a `/`.
enum Bound {
    Point(DateTime<Utc>),
    Duration(Duration),
}

fn bound(side: Side, text: &str) -> Result<Bound, IntervalError> {
    if text.is_empty() {
        return Err(IntervalError::Empty {
            side,
            source: TooShort(String::new()),
        });
    }
    if text.starts_with('P') {
        parse_duration(text)
            .map(Bound::Duration)
            .map_err(|source| IntervalError::BoundDuration { side, source })
    } else {
        parse_datestamp(text)
            .map(Bound::Point)
            .map_err(|source| IntervalError::Datestamp { side, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use rstest::rstest;

    fn datetime(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn forms() {
        let a = datetime(2019, 10, 1);
        let b = datetime(2019, 10, 2);
        let day = Some(TimeDelta::hours(24));

        let floating = parse_interval("P1D").unwrap();
        assert!(floating.is_floating());
        assert_eq!(floating.duration().as_time_delta(), day);

        let starting = parse_interval("2019-10-01T00:00:00Z/P1D").unwrap();
        assert_eq!(starting.start(), Some(&a));
        assert_eq!(starting.end(), None);
        assert_eq!(starting.duration().as_time_delta(), day);

        let ending = parse_interval("P1D/2019-10-01T00:00:00Z").unwrap();
        assert_eq!(ending.start(), None);
        assert_eq!(ending.end(), Some(&a));
        assert_eq!(ending.duration().as_time_delta(), day);

        let between = parse_interval("2019-10-01T00:00:00Z/2019-10-02T00:00:00Z").unwrap();
        assert_eq!(between.start(), Some(&a));
        assert_eq!(between.end(), Some(&b));
        assert_eq!(between.duration().as_time_delta(), day);
        assert_eq!(between.duration().source(), None);
    }

    #[rstest]
    #[case("", "string '' is too short")]
    #[case("///", "too many interval designators (slashes)")]
    #[case("/2019-10-01T00:00:00Z", "parsing start: string '' is too short")]
    #[case("2019-10-01T00:00:00Z/", "parsing end: string '' is too short")]
    #[case(
        "2019-13-01T00:00:00Z/",
        r#"parsing start datestamp: parsing time "2019-13-01T00:00:00Z": month out of range"#
    )]
    #[case(
        "P1W/2019-13-01T00:00:00Z",
        r#"parsing end datestamp: parsing time "2019-13-01T00:00:00Z": month out of range"#
    )]
    #[case(
        "Pfoo/2019-10-01T00:00:00Z",
        r#"parsing start duration: i64::from_str: parsing "": invalid syntax"#
    )]
    #[case(
        "2019-10-01T00:00:00Z/Pfoo",
        r#"parsing end duration: i64::from_str: parsing "": invalid syntax"#
    )]
    #[case("P1/2019-10-01T00:00:00Z", "parsing start duration: string 'P1' is too short")]
    #[case("P1D/P2D", "interval cannot be bounded by two durations")]
    #[case(
        "2019-10-02T00:00:00Z/2019-10-01T00:00:00Z",
        "interval end precedes its start"
    )]
    #[case("P1W17Y", "time units out of order: year before week")]
    fn malformed(#[case] input: &str, #[case] message: &str) {
        let err = parse_interval(input).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn wrapped_errors_keep_their_source() {
        use std::error::Error;

        let err = parse_interval("P1W/2019-13-01T00:00:00Z").unwrap_err();
        assert_eq!(err.side(), Some(Side::End));
        let source = err.source().unwrap();
        assert_eq!(
            source.to_string(),
            r#"parsing time "2019-13-01T00:00:00Z": month out of range"#
        );
        assert_eq!(parse_interval("///").unwrap_err().side(), None);
    }

    #[test]
    fn canonical_form() {
        let start = datetime(2000, 1, 1);
        let end = datetime(2001, 1, 1);
        let week: Duration = "P1W".parse().unwrap();

        assert_eq!(
            Interval::between(start, end).unwrap().to_string(),
            "2000-01-01T00:00:00Z/2001-01-01T00:00:00Z"
        );
        assert_eq!(
            Interval::starting(start, week.clone()).to_string(),
            "2000-01-01T00:00:00Z/P1W"
        );
        assert_eq!(
            Interval::ending(week.clone(), end).to_string(),
            "P1W/2001-01-01T00:00:00Z"
        );
        assert_eq!(Interval::floating(week).to_string(), "P1W");
    }

    #[test]
    fn offsets_are_written_as_utc() {
        let interval = parse_interval("2019-10-01T02:00:00+02:00/PT1H").unwrap();
        assert_eq!(interval.to_string(), "2019-10-01T00:00:00Z/PT1H");
    }

    #[test]
    fn resolved_bounds() {
        let starting = parse_interval("2019-10-01T00:00:00Z/P1M").unwrap();
        assert_eq!(starting.resolved_start(), Some(datetime(2019, 10, 1)));
        assert_eq!(starting.resolved_end(), Some(datetime(2019, 11, 1)));

        let ending = parse_interval("P1D/2019-10-01T00:00:00Z").unwrap();
        assert_eq!(ending.resolved_start(), Some(datetime(2019, 9, 30)));
        assert_eq!(ending.resolved_end(), Some(datetime(2019, 10, 1)));

        let floating = parse_interval("P1D").unwrap();
        assert_eq!(floating.resolved_start(), None);
        assert_eq!(floating.resolved_end(), None);
    }

    #[test]
    fn contains() {
        let interval = parse_interval("2019-10-01T00:00:00Z/2019-10-02T00:00:00Z").unwrap();
        assert!(!interval.contains(&datetime(2019, 9, 30)));
        assert!(interval.contains(&datetime(2019, 10, 1)));
        assert!(!interval.contains(&datetime(2019, 10, 2)));

        let floating = parse_interval("P1D").unwrap();
        assert!(floating.contains(&datetime(1970, 1, 1)));
    }

    #[test]
    fn round_trip() {
        for literal in [
            "P1D",
            "2019-10-01T00:00:00Z/P1D",
            "PT36H/2019-10-01T00:00:00Z",
            "2019-10-01T00:00:00Z/2019-10-02T00:00:00Z",
        ] {
            let interval = parse_interval(literal).unwrap();
            assert_eq!(interval.to_string(), literal);
            assert_eq!(parse_interval(&interval.to_string()).unwrap(), interval);
        }
    }

    #[test]
    fn serde() {
        let interval: Interval = serde_json::from_str(r#""2019-10-01T00:00:00Z/P1D""#).unwrap();
        assert_eq!(
            serde_json::to_string(&interval).unwrap(),
            r#""2019-10-01T00:00:00Z/P1D""#
        );
        assert!(serde_json::from_str::<Interval>("1").is_err());
    }
}
