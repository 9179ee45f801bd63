//! Errors shared by the duration, interval and repeating interval grammars.
use std::num::{IntErrorKind, ParseIntError};

use thiserror::Error;

/// Shortest input any of the grammars can accept, e.g. `P1D`.
pub(crate) const MIN_LEN: usize = 3;

/// Input shorter than the smallest valid literal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("string '{0}' is too short")]
pub struct TooShort(pub String);

impl TooShort {
    /// Fails when `input` cannot hold a minimal literal.
    pub(crate) fn check(input: &str) -> Result<(), TooShort> {
        if input.len() < MIN_LEN {
            return Err(TooShort(input.to_string()));
        }
        Ok(())
    }
}

/// A unit or repetition numeral that could not be read as an `i64`.
///
/// The message names the parsing function and the digits attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("i64::from_str: parsing \"{literal}\": {}", reason(.source))]
pub struct NumeralError {
    literal: String,
    #[source]
    source: ParseIntError,
}

impl NumeralError {
    /// The digits that failed to parse.
    pub fn literal(&self) -> &str {
        &self.literal
    }
    /// True when the digits were valid but did not fit.
    pub fn is_overflow(&self) -> bool {
        matches!(
            self.source.kind(),
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
        )
    }
}

fn reason(source: &ParseIntError) -> &'static str {
    match source.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => "value out of range",
        _ => "invalid syntax",
    }
}

/// Parse an unsigned run of decimal digits.
pub(crate) fn parse_numeral(digits: &str) -> Result<i64, NumeralError> {
    digits.parse::<i64>().map_err(|source| NumeralError {
        literal: digits.to_string(),
        source,
    })
}
