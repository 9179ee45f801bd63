//! ISO 8601 durations, `PnYnMnWnDTnHnMnS`.
//!
//! Years and months have no fixed length. A [`Duration`] therefore keeps its unit counts and
//! only becomes an exact offset when it is anchored to a point in time with
//! [`Duration::add_to`] or [`Duration::sub_from`]. [`Duration::as_time_delta`] gives the flat,
//! unanchored reading used for comparisons.
use std::fmt;
use std::ops;
use std::str::FromStr;

use chrono::{offset::Utc, DateTime, Days, Months, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::error::{parse_numeral, NumeralError, TooShort};

/// Days in a nominal month.
const MONTH_DAYS: i64 = 30;
/// Days in a nominal year. Fixed by the reference reading of `P3Y6M4DT12H30M5S`.
const YEAR_DAYS: i64 = 2915;
const WEEK_DAYS: i64 = 7;

/// Duration units, from the largest to the smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Unit::Year => "year",
            Unit::Month => "month",
            Unit::Week => "week",
            Unit::Day => "day",
            Unit::Hour => "hour",
            Unit::Minute => "minute",
            Unit::Second => "second",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error(transparent)]
    TooShort(#[from] TooShort),
    #[error("missing leading 'P' duration designator")]
    MissingDesignator,
    /// `unit` was found after `previous`, which it should precede.
    #[error("time units out of order: {unit} before {previous}")]
    OutOfOrder { unit: Unit, previous: Unit },
    #[error("unrecognized duration character '{0}'")]
    Unrecognized(char),
    #[error(transparent)]
    Numeral(#[from] NumeralError),
    #[error("numeral '{0}' has no unit designator")]
    Dangling(String),
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),
}

#[derive(Debug, Default, Clone)]
pub struct Duration {
    years: i64,
    months: i64,
    weeks: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    /// If parsed, this will be the source.
    ///
    /// `P1D` and `PT24H` compare equal but should each be written back the way they came in.
    source: Option<String>,
}

/// Constructors
impl Duration {
    pub fn years(years: i64) -> Self {
        Duration {
            years,
            ..Default::default()
        }
    }
    pub fn months(months: i64) -> Self {
        Duration {
            months,
            ..Default::default()
        }
    }
    pub fn weeks(weeks: i64) -> Self {
        Duration {
            weeks,
            ..Default::default()
        }
    }
    pub fn days(days: i64) -> Self {
        Duration {
            days,
            ..Default::default()
        }
    }
    pub fn hours(hours: i64) -> Self {
        Duration {
            hours,
            ..Default::default()
        }
    }
    pub fn minutes(minutes: i64) -> Self {
        Duration {
            minutes,
            ..Default::default()
        }
    }
    pub fn seconds(seconds: i64) -> Self {
        Duration {
            seconds,
            ..Default::default()
        }
    }
}

impl Duration {
    /// Count of a single unit, as written.
    pub fn count(&self, unit: Unit) -> i64 {
        match unit {
            Unit::Year => self.years,
            Unit::Month => self.months,
            Unit::Week => self.weeks,
            Unit::Day => self.days,
            Unit::Hour => self.hours,
            Unit::Minute => self.minutes,
            Unit::Second => self.seconds,
        }
    }

    /// The literal this duration was parsed from, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_zero(&self) -> bool {
        self.counts().iter().all(|count| *count == 0)
    }

    fn counts(&self) -> [i64; 7] {
        [
            self.years,
            self.months,
            self.weeks,
            self.days,
            self.hours,
            self.minutes,
            self.seconds,
        ]
    }

    /// Flat reading with nominal 30 day months, 7 day weeks and 24 hour days.
    ///
    /// `None` if the result does not fit a [`TimeDelta`].
    pub fn as_time_delta(&self) -> Option<TimeDelta> {
        let days = self
            .years
            .checked_mul(YEAR_DAYS)?
            .checked_add(self.months.checked_mul(MONTH_DAYS)?)?
            .checked_add(self.weeks.checked_mul(WEEK_DAYS)?)?
            .checked_add(self.days)?;
        let hours = days.checked_mul(24)?.checked_add(self.hours)?;
        TimeDelta::try_hours(hours)?
            .checked_add(&TimeDelta::try_minutes(self.minutes)?)?
            .checked_add(&TimeDelta::try_seconds(self.seconds)?)
    }

    /// Point reached by moving forward from `point`.
    ///
    /// Years and months move the calendar, so `P1M` from January 31st lands on the last day
    /// of February.
    pub fn add_to(&self, point: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.anchored(point, 1)
    }

    /// Point reached by moving backward from `point`.
    pub fn sub_from(&self, point: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.anchored(point, -1)
    }

    /// Every count multiplied by `factor`. The literal is dropped.
    pub(crate) fn times(&self, factor: i64) -> Option<Duration> {
        Some(Duration {
            years: self.years.checked_mul(factor)?,
            months: self.months.checked_mul(factor)?,
            weeks: self.weeks.checked_mul(factor)?,
            days: self.days.checked_mul(factor)?,
            hours: self.hours.checked_mul(factor)?,
            minutes: self.minutes.checked_mul(factor)?,
            seconds: self.seconds.checked_mul(factor)?,
            source: None,
        })
    }

    fn anchored(&self, point: DateTime<Utc>, sign: i64) -> Option<DateTime<Utc>> {
        let months = self
            .years
            .checked_mul(12)?
            .checked_add(self.months)?
            .checked_mul(sign)?;
        let days = self
            .weeks
            .checked_mul(WEEK_DAYS)?
            .checked_add(self.days)?
            .checked_mul(sign)?;
        let clock = TimeDelta::try_hours(self.hours.checked_mul(sign)?)?
            .checked_add(&TimeDelta::try_minutes(self.minutes.checked_mul(sign)?)?)?
            .checked_add(&TimeDelta::try_seconds(self.seconds.checked_mul(sign)?)?)?;

        let shift = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
        let point = if months >= 0 {
            point.checked_add_months(shift)?
        } else {
            point.checked_sub_months(shift)?
        };
        let point = if days >= 0 {
            point.checked_add_days(Days::new(days.unsigned_abs()))?
        } else {
            point.checked_sub_days(Days::new(days.unsigned_abs()))?
        };
        point.checked_add_signed(clock)
    }

    /// Carry seconds into minutes, minutes into hours and hours into days.
    ///
    /// Days are left alone, as months may have a different number of days.
    fn smooth(mut self) -> Self {
        self.minutes += self.seconds / 60;
        self.seconds %= 60;

        self.hours += self.minutes / 60;
        self.minutes %= 60;

        self.days += self.hours / 24;
        self.hours %= 24;
        self
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Return the same output if an input was originally given.
        if let Some(ref source) = self.source {
            return f.write_str(source);
        }
        if self.is_zero() {
            return f.write_str("PT0S");
        }

        f.write_str("P")?;
        for (unit, designator) in [
            (Unit::Year, 'Y'),
            (Unit::Month, 'M'),
            (Unit::Week, 'W'),
            (Unit::Day, 'D'),
        ] {
            if self.count(unit) != 0 {
                write!(f, "{}{designator}", self.count(unit))?;
            }
        }
        if self.hours != 0 || self.minutes != 0 || self.seconds != 0 {
            f.write_str("T")?;
        }
        for (unit, designator) in [(Unit::Hour, 'H'), (Unit::Minute, 'M'), (Unit::Second, 'S')] {
            if self.count(unit) != 0 {
                write!(f, "{}{designator}", self.count(unit))?;
            }
        }
        Ok(())
    }
}

impl ops::Add for Duration {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Duration {
            years: self.years.saturating_add(other.years),
            months: self.months.saturating_add(other.months),
            weeks: self.weeks.saturating_add(other.weeks),
            days: self.days.saturating_add(other.days),
            hours: self.hours.saturating_add(other.hours),
            minutes: self.minutes.saturating_add(other.minutes),
            seconds: self.seconds.saturating_add(other.seconds),
            ..Default::default()
        }
    }
}

/// Durations compare by their flat reading, so `P1D` equals `PT24H` and a year equals
/// 2915 days. Durations too long for a flat reading compare unit by unit.
impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_time_delta(), other.as_time_delta()) {
            (Some(delta), Some(other_delta)) => delta == other_delta,
            _ => self.counts() == other.counts(),
        }
    }
}

/// Whole seconds only; the sub-second part is dropped.
impl From<TimeDelta> for Duration {
    fn from(delta: TimeDelta) -> Self {
        Duration::seconds(delta.num_seconds()).smooth()
    }
}

impl From<Duration> for String {
    fn from(duration: Duration) -> Self {
        duration.to_string()
    }
}

impl FromStr for Duration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = scan(s)?;
        trace!(literal = s, "parsed duration");
        Ok(duration)
    }
}

impl TryFrom<&str> for Duration {
    type Error = DurationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for Duration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Duration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse an ISO 8601 duration.
///
/// e.g. `P3Y6M4DT12H30M5S`, `P1W`, `PT90M`
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    input.parse()
}

/// Scanner position within the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectDesignator,
    DateUnits,
    TimeUnits,
    Done,
}

/// Single pass over `input`. Digits accumulate until a designator closes them.
fn scan(input: &str) -> Result<Duration, DurationError> {
    TooShort::check(input)?;

    let mut duration = Duration::default();
    let mut state = State::ExpectDesignator;
    let mut previous: Option<Unit> = None;
    // Start of the pending numeral.
    let mut numeral = 0;
    let mut chars = input.char_indices();

    loop {
        state = match (state, chars.next()) {
            (State::Done, _) => break,
            (State::ExpectDesignator, Some((_, 'P'))) => {
                numeral = 1;
                State::DateUnits
            }
            (State::ExpectDesignator, _) => return Err(DurationError::MissingDesignator),
            (_, None) => {
                if numeral < input.len() {
                    return Err(DurationError::Dangling(input[numeral..].to_string()));
                }
                State::Done
            }
            (section, Some((_, c))) if c.is_ascii_digit() => section,
            (State::DateUnits, Some((i, 'T'))) => {
                if numeral < i {
                    return Err(DurationError::Dangling(input[numeral..i].to_string()));
                }
                numeral = i + 1;
                State::TimeUnits
            }
            (State::TimeUnits, Some((_, 'T'))) => return Err(DurationError::Unrecognized('T')),
            (section, Some((i, c))) => {
                let count = parse_numeral(&input[numeral..i])?;
                let unit = designator(section, c).ok_or(DurationError::Unrecognized(c))?;
                if let Some(previous) = previous.filter(|previous| unit <= *previous) {
                    return Err(DurationError::OutOfOrder { unit, previous });
                }
                previous = Some(unit);
                duration.set(unit, count);
                numeral = i + c.len_utf8();
                section
            }
        };
    }

    if duration.as_time_delta().is_none() {
        return Err(DurationError::OutOfRange(input.to_string()));
    }
    duration.source = Some(input.to_string());
    Ok(duration)
}

/// `M` is a month before `T` and a minute after it. Hours and seconds are tolerated without
/// the `T`.
fn designator(state: State, c: char) -> Option<Unit> {
    match (state, c) {
        (State::DateUnits, 'Y') => Some(Unit::Year),
        (State::DateUnits, 'M') => Some(Unit::Month),
        (State::DateUnits, 'W') => Some(Unit::Week),
        (State::DateUnits, 'D') => Some(Unit::Day),
        (State::TimeUnits, 'M') => Some(Unit::Minute),
        (_, 'H') => Some(Unit::Hour),
        (_, 'S') => Some(Unit::Second),
        _ => None,
    }
}

impl Duration {
    fn set(&mut self, unit: Unit, count: i64) {
        let field = match unit {
            Unit::Year => &mut self.years,
            Unit::Month => &mut self.months,
            Unit::Week => &mut self.weeks,
            Unit::Day => &mut self.days,
            Unit::Hour => &mut self.hours,
            Unit::Minute => &mut self.minutes,
            Unit::Second => &mut self.seconds,
        };
        *field = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[test]
    fn flat_reading() {
        let parse = |s: &str| parse_duration(s).unwrap().as_time_delta().unwrap();
        assert_eq!(parse("P1H"), TimeDelta::hours(1));
        assert_eq!(parse("P1D"), TimeDelta::hours(24));
        assert_eq!(parse("P1W"), TimeDelta::hours(24 * 7));
        assert_eq!(parse("PT90M"), TimeDelta::minutes(90));
        assert_eq!(
            parse("P3Y6M4DT12H30M5S"),
            TimeDelta::nanoseconds(771_510_605_000_000_000)
        );
    }

    #[test]
    fn units() {
        let duration: Duration = "P3Y6M4DT12H30M5S".parse().unwrap();
        assert_eq!(duration.count(Unit::Year), 3);
        assert_eq!(duration.count(Unit::Month), 6);
        assert_eq!(duration.count(Unit::Week), 0);
        assert_eq!(duration.count(Unit::Day), 4);
        assert_eq!(duration.count(Unit::Hour), 12);
        assert_eq!(duration.count(Unit::Minute), 30);
        assert_eq!(duration.count(Unit::Second), 5);

        assert_eq!("P10M".parse::<Duration>().unwrap(), Duration::months(10));
        assert_eq!("PT10M".parse::<Duration>().unwrap(), Duration::minutes(10));
        assert_eq!(
            "P2M3D".parse::<Duration>().unwrap(),
            Duration::months(2) + Duration::days(3)
        );
        assert_eq!(
            "PT12H40M50S".parse::<Duration>().unwrap(),
            Duration::hours(12) + Duration::minutes(40) + Duration::seconds(50)
        );
        assert_eq!(Duration::try_from("P1W").unwrap(), Duration::days(7));
    }

    #[rstest]
    #[case("", "string '' is too short")]
    #[case("P1", "string 'P1' is too short")]
    #[case("1D4H", "missing leading 'P' duration designator")]
    #[case("P1W17Y", "time units out of order: year before week")]
    #[case("P1D1D", "time units out of order: day before day")]
    #[case("PT1S2H", "time units out of order: hour before second")]
    #[case("P1HT2H", "time units out of order: hour before hour")]
    #[case("P25Z", "unrecognized duration character 'Z'")]
    #[case("PT1D", "unrecognized duration character 'D'")]
    #[case("PT1HT2M", "unrecognized duration character 'T'")]
    #[case("P1DTT", "unrecognized duration character 'T'")]
    #[case("Pfoo", r#"i64::from_str: parsing "": invalid syntax"#)]
    #[case(
        "P99999999999999999999999999999999999999999999999999999999W",
        r#"i64::from_str: parsing "99999999999999999999999999999999999999999999999999999999": value out of range"#
    )]
    #[case("PT12", "numeral '12' has no unit designator")]
    #[case("P1T2H", "numeral '1' has no unit designator")]
    #[case("P9223372036854775807Y", "duration 'P9223372036854775807Y' is out of range")]
    fn malformed(#[case] input: &str, #[case] message: &str) {
        let err = parse_duration(input).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn order_error_names_units() {
        assert_eq!(
            parse_duration("P1W17Y").unwrap_err(),
            DurationError::OutOfOrder {
                unit: Unit::Year,
                previous: Unit::Week,
            }
        );
    }

    /// Verify that the output matches the input, unless math is done.
    #[test]
    fn source() {
        let duration: Duration = "PT24H".parse().unwrap();
        assert_eq!(duration.source(), Some("PT24H"));
        assert_eq!(duration.to_string(), "PT24H");
        assert_eq!(duration, Duration::days(1));
        // After any math, it should remove the source.
        assert_eq!((duration.clone() + duration).to_string(), "PT48H");
    }

    #[test]
    fn equality() {
        assert_eq!(Duration::days(1), "PT24H".parse::<Duration>().unwrap());
        assert_eq!(Duration::years(1), Duration::days(YEAR_DAYS));
        assert_ne!(Duration::years(1), Duration::months(12));

        assert_eq!(Duration::years(i64::MAX), Duration::years(i64::MAX));
        assert_ne!(Duration::years(i64::MAX), Duration::weeks(i64::MAX));
        assert_ne!(Duration::years(i64::MAX), Duration::days(1));
    }

    #[test]
    fn canonical_form() {
        assert_eq!(Duration::days(3).to_string(), "P3D");
        assert_eq!(Duration::weeks(2).to_string(), "P2W");
        assert_eq!(Duration::minutes(10).to_string(), "PT10M");
        assert_eq!(Duration::months(10).to_string(), "P10M");
        assert_eq!(Duration::default().to_string(), "PT0S");
        assert_eq!(
            (Duration::years(1)
                + Duration::months(2)
                + Duration::days(3)
                + Duration::hours(12)
                + Duration::minutes(40)
                + Duration::seconds(50))
            .to_string(),
            "P1Y2M3DT12H40M50S"
        );
        let zero: Duration = "PT0S".parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(String::from(zero), "PT0S");
    }

    #[test]
    fn smoothing() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 3, 14, 30, 0).unwrap();
        let elapsed: Duration = end.signed_duration_since(start).into();
        assert_eq!(elapsed.to_string(), "P2DT2H30M");
        assert_eq!(elapsed.source(), None);
    }

    #[test]
    fn anchored_arithmetic() {
        let jan31 = Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap();
        let month: Duration = "P1M".parse().unwrap();
        assert_eq!(
            month.add_to(jan31),
            Some(Utc.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap())
        );

        let mixed: Duration = "P1Y1W1DT1H1M1S".parse().unwrap();
        let later = mixed.add_to(jan31).unwrap();
        assert_eq!(later, Utc.with_ymd_and_hms(2021, 2, 8, 1, 1, 1).unwrap());
        assert_eq!(mixed.sub_from(later), Some(jan31));

        let week: Duration = "P1W".parse().unwrap();
        assert_eq!(
            week.sub_from(jan31),
            Some(Utc.with_ymd_and_hms(2020, 1, 24, 0, 0, 0).unwrap())
        );
        assert_eq!(Duration::years(i64::MAX).add_to(jan31), None);

        let two_months = month.times(2).unwrap();
        assert_eq!(two_months.to_string(), "P2M");
        assert_eq!(
            two_months.add_to(jan31),
            Some(Utc.with_ymd_and_hms(2020, 3, 31, 0, 0, 0).unwrap())
        );
        assert!(Duration::days(i64::MAX).times(2).is_none());
    }

    #[test]
    fn serde() {
        let duration: Duration = serde_json::from_str(r#""P1Y2M""#).unwrap();
        assert_eq!(duration, Duration::years(1) + Duration::months(2));
        assert_eq!(serde_json::to_string(&duration).unwrap(), r#""P1Y2M""#);
        assert!(serde_json::from_str::<Duration>(r#""1Y""#).is_err());
    }
}
