//! Parse and format ISO 8601 durations, time intervals and repeating intervals.
//!
//! ```rust
//! use isorepeat::prelude::*;
//!
//! // Every day for three days, starting October 1st.
//! let daily: RepeatingInterval = "R3/2019-10-01T00:00:00Z/P1D".parse().unwrap();
//! assert_eq!(daily.repetitions(), 3);
//! assert_eq!(daily.next_rep().repetitions(), 2);
//! assert_eq!(daily.to_string(), "R3/2019-10-01T00:00:00Z/P1D");
//!
//! // Intervals travel through JSON as plain strings.
//! let json = daily.to_json_string().unwrap();
//! assert_eq!(json, r#""R3/2019-10-01T00:00:00Z/P1D""#);
//! ```
//!
//! Parsing errors name the part of the literal that failed.
//!
//! ```rust
//! use isorepeat::prelude::*;
//!
//! let err = "P1W17Y".parse::<Duration>().unwrap_err();
//! assert_eq!(err.to_string(), "time units out of order: year before week");
//!
//! let err = "/2019-10-01T00:00:00Z".parse::<Interval>().unwrap_err();
//! assert_eq!(err.to_string(), "parsing start: string '' is too short");
//! ```

mod datestamp;
mod duration;
mod error;
mod interval;
mod repeating;

pub use datestamp::{format_datestamp, parse_datestamp, DatestampError, DatestampReason};
pub use duration::{parse_duration, Duration, DurationError, Unit};
pub use error::{NumeralError, TooShort};
pub use interval::{parse_interval, Interval, IntervalError, Side};
pub use repeating::{
    parse_repeating_interval, Occurrences, RepeatingInterval, RepeatingIntervalError, UNBOUNDED,
};

pub mod prelude {
    pub use crate::duration::Duration;
    pub use crate::interval::Interval;
    pub use crate::repeating::RepeatingInterval;
}
