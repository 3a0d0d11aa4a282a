//! Time reference parsing
//!
//! The small grammar the CLI accepts for window boundaries and steps:
//!
//! ```text
//! now          the current instant
//! e-1w         one week before the end time
//! now-30m      half an hour ago
//! 2012-01-01T00:00:00Z   absolute ISO-8601
//! 2012-01-01   absolute date, midnight UTC
//! ```
//!
//! Units are s, m, h, d, w. Steps are a bare duration (`1m`, `30s`) or
//! raw milliseconds.

use chrono::{DateTime, NaiveDate, Utc};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map, map_res, value};
use nom::sequence::pair;
use nom::IResult;
use thiserror::Error;

/// Failures parsing a time reference or duration
#[derive(Error, Debug)]
pub enum TimeParseError {
    /// Not a known keyword, duration offset, or ISO-8601 instant
    #[error("invalid time reference: {0:?}")]
    InvalidTime(String),

    /// Not `<N><unit>` with unit in s/m/h/d/w
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    /// `e`-relative reference used where no end time exists
    #[error("reference {0:?} needs an end time")]
    UnresolvedReference(String),
}

/// Parse a duration like `1m` or `2w` to milliseconds
pub fn parse_duration_ms(input: &str) -> Result<i64, TimeParseError> {
    match all_consuming(duration_ms)(input) {
        Ok((_, ms)) => Ok(ms),
        Err(_) => Err(TimeParseError::InvalidDuration(input.to_string())),
    }
}

/// Parse a step: a duration, or raw milliseconds
pub fn parse_step(input: &str) -> Result<i64, TimeParseError> {
    if let Ok(ms) = input.parse::<i64>() {
        return Ok(ms);
    }
    parse_duration_ms(input)
}

/// Resolve a time reference to epoch millis
///
/// `now` is the caller's current instant; `end` resolves `e`-relative
/// references and is absent while the end boundary itself is parsed.
pub fn parse_time(input: &str, now: i64, end: Option<i64>) -> Result<i64, TimeParseError> {
    let input = input.trim();

    // Keyword with optional +/- duration offset
    let (base, rest) = if let Some(rest) = input.strip_prefix("now") {
        (now, rest)
    } else if let Some(rest) = input.strip_prefix('e') {
        // Bare digits also start differently, so a leading 'e' is a
        // reference, but only when what follows is an offset or nothing
        if rest.is_empty() || rest.starts_with('-') || rest.starts_with('+') {
            let e = end.ok_or_else(|| TimeParseError::UnresolvedReference(input.to_string()))?;
            (e, rest)
        } else {
            return parse_absolute(input);
        }
    } else {
        return parse_absolute(input);
    };

    if rest.is_empty() {
        return Ok(base);
    }
    let (sign, dur) = match rest.split_at(1) {
        ("-", d) => (-1, d),
        ("+", d) => (1, d),
        _ => return Err(TimeParseError::InvalidTime(input.to_string())),
    };
    Ok(base + sign * parse_duration_ms(dur)?)
}

fn parse_absolute(input: &str) -> Result<i64, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(date) = input.parse::<NaiveDate>() {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    // Raw epoch millis
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(ms) = input.parse::<i64>() {
            return Ok(ms);
        }
    }
    Err(TimeParseError::InvalidTime(input.to_string()))
}

fn duration_ms(input: &str) -> IResult<&str, i64> {
    map(
        pair(
            map_res(digit1, |s: &str| s.parse::<i64>()),
            alt((
                value(1000_i64, tag("s")),
                value(60_000_i64, tag("m")),
                value(3_600_000_i64, tag("h")),
                value(86_400_000_i64, tag("d")),
                value(604_800_000_i64, tag("w")),
            )),
        ),
        |(n, unit)| n * unit,
    )(input)
}

/// Align an instant down to a step boundary
pub fn align_down(t: i64, step: i64) -> i64 {
    t - t.rem_euclid(step)
}

/// The current instant in epoch millis
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: i64 = 604_800_000;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_duration_ms("1m").unwrap(), 60_000);
        assert_eq!(parse_duration_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_duration_ms("1d").unwrap(), 86_400_000);
        assert_eq!(parse_duration_ms("1w").unwrap(), WEEK);
        assert!(parse_duration_ms("5x").is_err());
        assert!(parse_duration_ms("m").is_err());
        assert!(parse_duration_ms("1m2s").is_err());
    }

    #[test]
    fn test_parse_step_accepts_raw_millis() {
        assert_eq!(parse_step("60000").unwrap(), 60_000);
        assert_eq!(parse_step("1m").unwrap(), 60_000);
    }

    #[test]
    fn test_now_and_offsets() {
        assert_eq!(parse_time("now", 1000, None).unwrap(), 1000);
        assert_eq!(parse_time("now-30m", 10_000_000, None).unwrap(), 10_000_000 - 1_800_000);
    }

    #[test]
    fn test_end_relative() {
        let end = 1_325_376_000_000; // 2012-01-01T00:00:00Z
        assert_eq!(parse_time("e", 0, Some(end)).unwrap(), end);
        assert_eq!(parse_time("e-1w", 0, Some(end)).unwrap(), end - WEEK);
        assert_eq!(parse_time("e+1h", 0, Some(end)).unwrap(), end + 3_600_000);
        assert!(matches!(
            parse_time("e-1w", 0, None),
            Err(TimeParseError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_absolute_forms() {
        assert_eq!(
            parse_time("2012-01-01T00:00:00Z", 0, None).unwrap(),
            1_325_376_000_000
        );
        assert_eq!(
            parse_time("2012-01-01", 0, None).unwrap(),
            1_325_376_000_000
        );
        assert_eq!(parse_time("1325376000000", 0, None).unwrap(), 1_325_376_000_000);
    }

    #[test]
    fn test_invalid_references() {
        assert!(parse_time("yesterday", 0, None).is_err());
        assert!(parse_time("now*5", 0, None).is_err());
        assert!(parse_time("", 0, None).is_err());
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(61_234, 60_000), 60_000);
        assert_eq!(align_down(60_000, 60_000), 60_000);
        assert_eq!(align_down(-1, 60_000), -60_000);
    }
}
