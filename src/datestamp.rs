//! Datestamps bounding an interval, `YYYY-MM-DDThh:mm:ssZ`.
//!
//! A numeric offset (`+02:00`) is accepted in place of `Z` and normalized away, so every
//! datestamp is held and written back as UTC.
use chrono::{offset::Utc, DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use nom::branch::alt;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{char, one_of};
use nom::combinator::{map_res, value};
use nom::error::{context, VerboseError, VerboseErrorKind};
use nom::sequence::tuple;
use nom::IResult;
use thiserror::Error;

const DATESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// A datestamp that could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parsing time \"{literal}\": {reason}")]
pub struct DatestampError {
    literal: String,
    reason: DatestampReason,
}

impl DatestampError {
    pub fn literal(&self) -> &str {
        &self.literal
    }
    pub fn reason(&self) -> &DatestampReason {
        &self.reason
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatestampReason {
    /// A field was well formed but outside its calendar range.
    #[error("{0} out of range")]
    OutOfRange(&'static str),
    /// The text stopped matching the layout at `found`.
    #[error("cannot parse \"{found}\" as \"{expected}\"")]
    Layout {
        found: String,
        expected: &'static str,
    },
    #[error("extra text: \"{0}\"")]
    ExtraText(String),
}

/// Raw fields, before any range checks.
struct Fields {
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    /// Sign, hours and minutes east of UTC.
    offset: (i32, u32, u32),
}

/// Parse a datestamp into a UTC point in time.
pub fn parse_datestamp(input: &str) -> Result<DateTime<Utc>, DatestampError> {
    let fail = |reason: DatestampReason| DatestampError {
        literal: input.to_string(),
        reason,
    };
    let (rest, fields) = match layout(input) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(fail(layout_reason(input, e)))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(fail(DatestampReason::Layout {
                found: input.to_string(),
                expected: "YYYY",
            }))
        }
    };
    if !rest.is_empty() {
        return Err(fail(DatestampReason::ExtraText(rest.to_string())));
    }
    resolve(&fields).map_err(fail)
}

/// Format a point in time as a datestamp.
pub fn format_datestamp(datetime: &DateTime<Utc>) -> String {
    datetime.format(DATESTAMP_FORMAT).to_string()
}

fn digits<'a>(width: usize) -> impl FnMut(&'a str) -> Res<'a, u32> {
    map_res(
        take_while_m_n(width, width, |c: char| c.is_ascii_digit()),
        |digits: &str| digits.parse::<u32>(),
    )
}

fn field<'a>(name: &'static str, width: usize) -> impl FnMut(&'a str) -> Res<'a, u32> {
    context(name, digits(width))
}

fn utc(input: &str) -> Res<'_, (i32, u32, u32)> {
    value((1, 0, 0), char('Z'))(input)
}

fn numeric_offset(input: &str) -> Res<'_, (i32, u32, u32)> {
    let (input, (sign, hours, _, minutes)) =
        tuple((one_of("+-"), digits(2), char(':'), digits(2)))(input)?;
    let sign = if sign == '-' { -1 } else { 1 };
    Ok((input, (sign, hours, minutes)))
}

fn layout(input: &str) -> Res<'_, Fields> {
    let (input, year) = field("YYYY", 4)(input)?;
    let (input, _) = context("-", char('-'))(input)?;
    let (input, month) = field("MM", 2)(input)?;
    let (input, _) = context("-", char('-'))(input)?;
    let (input, day) = field("DD", 2)(input)?;
    let (input, _) = context("T", char('T'))(input)?;
    let (input, hour) = field("hh", 2)(input)?;
    let (input, _) = context(":", char(':'))(input)?;
    let (input, minute) = field("mm", 2)(input)?;
    let (input, _) = context(":", char(':'))(input)?;
    let (input, second) = field("ss", 2)(input)?;
    let (input, offset) = context("Z07:00", alt((utc, numeric_offset)))(input)?;
    Ok((
        input,
        Fields {
            year,
            month,
            day,
            hour,
            minute,
            second,
            offset,
        },
    ))
}

/// The innermost named element is the one that stopped matching.
fn layout_reason(input: &str, error: VerboseError<&str>) -> DatestampReason {
    error
        .errors
        .iter()
        .find_map(|(found, kind)| match kind {
            VerboseErrorKind::Context(expected) => Some(DatestampReason::Layout {
                found: found.to_string(),
                expected: *expected,
            }),
            _ => None,
        })
        .unwrap_or_else(|| DatestampReason::Layout {
            found: input.to_string(),
            expected: "YYYY",
        })
}

fn resolve(fields: &Fields) -> Result<DateTime<Utc>, DatestampReason> {
    use DatestampReason::OutOfRange;

    if !(1..=12).contains(&fields.month) {
        return Err(OutOfRange("month"));
    }
    let year = i32::try_from(fields.year).map_err(|_| OutOfRange("year"))?;
    let date =
        NaiveDate::from_ymd_opt(year, fields.month, fields.day).ok_or(OutOfRange("day"))?;
    if fields.hour > 23 {
        return Err(OutOfRange("hour"));
    }
    if fields.minute > 59 {
        return Err(OutOfRange("minute"));
    }
    let time = NaiveTime::from_hms_opt(fields.hour, fields.minute, fields.second)
        .ok_or(OutOfRange("second"))?;

    let (sign, hours, minutes) = fields.offset;
    if hours > 23 || minutes > 59 {
        return Err(OutOfRange("time zone offset"));
    }
    let seconds = sign * (hours * 3600 + minutes * 60) as i32;
    let offset = FixedOffset::east_opt(seconds).ok_or(OutOfRange("time zone offset"))?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|datetime| datetime.with_timezone(&Utc))
        .ok_or(OutOfRange("time zone offset"))
}
