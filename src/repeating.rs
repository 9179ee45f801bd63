//! ISO 8601 repeating intervals, `Rn/<interval>` or `R/<interval>` when unbounded.
use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use chrono::{offset::Utc, DateTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::trace;

use crate::duration::Duration;
use crate::error::{parse_numeral, NumeralError, TooShort};
use crate::interval::{Interval, IntervalError};

/// Repetition count of an interval that repeats forever.
pub const UNBOUNDED: i64 = -1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepeatingIntervalError {
    #[error(transparent)]
    TooShort(#[from] TooShort),
    #[error("missing leading 'R' repeating designator")]
    MissingDesignator,
    #[error("unrecognized repeating interval character '{0}'")]
    Unrecognized(char),
    #[error(transparent)]
    Numeral(#[from] NumeralError),
    #[error("parsing interval: {0}")]
    Interval(#[source] IntervalError),
}

/// An interval repeated a number of times.
///
/// The count is [`UNBOUNDED`] for an open repetition, `0` once no repetitions remain, and the
/// number of remaining repetitions otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingInterval {
    repetitions: i64,
    interval: Interval,
}

/// Constructors
impl RepeatingInterval {
    /// Any negative count is taken as [`UNBOUNDED`].
    pub fn new(repetitions: i64, interval: Interval) -> Self {
        RepeatingInterval {
            repetitions: repetitions.max(UNBOUNDED),
            interval,
        }
    }
    pub fn unbounded(interval: Interval) -> Self {
        Self::new(UNBOUNDED, interval)
    }
}

/// Getters
impl RepeatingInterval {
    pub fn repetitions(&self) -> i64 {
        self.repetitions
    }
    pub fn interval(&self) -> &Interval {
        &self.interval
    }
    pub fn is_unbounded(&self) -> bool {
        self.repetitions == UNBOUNDED
    }
}

impl RepeatingInterval {
    /// The same interval with one repetition used up.
    ///
    /// Unbounded repetitions never run out, and a spent one stays at `0`.
    pub fn next_rep(&self) -> Self {
        let repetitions = match self.repetitions {
            UNBOUNDED | 0 => self.repetitions,
            n => n - 1,
        };
        RepeatingInterval {
            repetitions,
            interval: self.interval.clone(),
        }
    }

    /// When the repetition following `instant` falls due.
    ///
    /// `None` when `instant` lies before the start or at or after the end of the interval, as
    /// the interval does not apply there. Bounds that were not given are not checked.
    pub fn after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.interval.contains(&instant) {
            return None;
        }
        self.interval.duration().add_to(instant)
    }

    /// Each repetition as a bounded interval.
    ///
    /// Repetitions run forward from the interval's start. With only an end given, the last
    /// repetition ends there and all of them are yielded in order, except when unbounded: then
    /// they run backward from the end, latest first. A floating interval has nowhere to start,
    /// so it yields nothing.
    pub fn occurrences(&self) -> Occurrences {
        let (anchor, from_end) = match (self.interval.start(), self.interval.end()) {
            (Some(start), _) => (Some(*start), false),
            (None, Some(end)) => (Some(*end), true),
            (None, None) => (None, false),
        };
        Occurrences {
            anchor,
            from_end,
            duration: self.interval.duration().clone(),
            index: 0,
            count: self.repetitions,
        }
    }
}

/// Conversion Methods
impl RepeatingInterval {
    /// Convert to a JSON string literal, e.g. `"R/P1W"`.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
    /// Read from a JSON string literal.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for RepeatingInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "R/{}", self.interval)
        } else {
            write!(f, "R{}/{}", self.repetitions, self.interval)
        }
    }
}

impl FromStr for RepeatingInterval {
    type Err = RepeatingIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TooShort::check(s)?;
        let rest = s
            .strip_prefix('R')
            .ok_or(RepeatingIntervalError::MissingDesignator)?;
        let (count, interval) = rest.split_once('/').unwrap_or((rest, ""));
        if let Some(c) = count.chars().find(|c| !c.is_ascii_digit()) {
            return Err(RepeatingIntervalError::Unrecognized(c));
        }
        let repetitions = if count.is_empty() {
            UNBOUNDED
        } else {
            parse_numeral(count)?
        };
        let interval = interval
            .parse::<Interval>()
            .map_err(RepeatingIntervalError::Interval)?;
        trace!(literal = s, repetitions, "parsed repeating interval");
        Ok(RepeatingInterval {
            repetitions,
            interval,
        })
    }
}

impl TryFrom<&str> for RepeatingInterval {
    type Error = RepeatingIntervalError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Parse an ISO 8601 repeating interval.
pub fn parse_repeating_interval(input: &str) -> Result<RepeatingInterval, RepeatingIntervalError> {
    input.parse()
}

impl Serialize for RepeatingInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RepeatingInterval {
    fn deserialize<D>(deserializer: D) -> Result<RepeatingInterval, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RepeatingIntervalVisitor;

        impl<'de> de::Visitor<'de> for RepeatingIntervalVisitor {
            type Value = RepeatingInterval;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string containing a repeating interval")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }
        deserializer.deserialize_str(RepeatingIntervalVisitor)
    }
}

/// Iterator over the repetitions of a [`RepeatingInterval`].
///
/// Repetition `k` spans `k` to `k + 1` durations from the anchor, so month lengths do not
/// drift from one repetition to the next.
#[derive(Debug, Clone)]
pub struct Occurrences {
    anchor: Option<DateTime<Utc>>,
    /// The anchor is where the repetitions end.
    from_end: bool,
    duration: Duration,
    index: i64,
    count: i64,
}

impl Occurrences {
    /// `steps` durations away from `anchor`, backward when negative.
    fn step(&self, anchor: DateTime<Utc>, steps: i64) -> Option<DateTime<Utc>> {
        let offset = self.duration.times(steps.checked_abs()?)?;
        if steps < 0 {
            offset.sub_from(anchor)
        } else {
            offset.add_to(anchor)
        }
    }
}

impl Iterator for Occurrences {
    type Item = Interval;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count != UNBOUNDED && self.index >= self.count {
            return None;
        }
        let anchor = self.anchor?;
        let (from, to) = match (self.from_end, self.count) {
            (false, _) => (self.index, self.index + 1),
            (true, UNBOUNDED) => (-self.index - 1, -self.index),
            (true, n) => (self.index - n, self.index - n + 1),
        };
        let (start, end) = match (self.step(anchor, from), self.step(anchor, to)) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                self.anchor = None;
                return None;
            }
        };
        // Stop once the duration no longer moves.
        if end <= start {
            self.anchor = None;
        }
        self.index += 1;
        Some(Interval::bounded(start, end, self.duration.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (self.anchor, self.count) {
            (None, _) => (0, Some(0)),
            (Some(_), UNBOUNDED) => (0, None),
            (Some(_), n) => (0, usize::try_from(n - self.index).ok()),
        }
    }
}

impl FusedIterator for Occurrences {}
