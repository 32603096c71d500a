//! Sync-age duration parsing.
//!
//! The database reports the age of the last successful sync as fractional
//! hours. Ages are normalized by rounding to the nearest whole hour,
//! formatting as `<n>h` and reparsing as a duration, so a malformed value
//! (negative, NaN, infinite) is rejected before it reaches the histogram.

use std::time::Duration;

/// Error type for sync-age parsing failures.
///
/// Scoped to a single record: the collector logs it and skips the record
/// without aborting the scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoursParseError {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for HoursParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to parse sync age '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for HoursParseError {}

/// Formats a fractional hour count rounded to the nearest whole hour,
/// e.g. `25.3` → `"25h"`.
pub fn format_hours(hours: f64) -> String {
    format!("{hours:.0}h")
}

/// Parses an `<n>h` hour string into a [`Duration`].
pub fn parse_hours(input: &str) -> Result<Duration, HoursParseError> {
    let input = input.trim();

    let Some(number) = input.strip_suffix('h') else {
        return Err(HoursParseError {
            input: input.to_string(),
            message: "expected an 'h' suffix".to_string(),
        });
    };

    let hours: u64 = number.parse().map_err(|err| HoursParseError {
        input: input.to_string(),
        message: format!("invalid hour count: {err}"),
    })?;

    let secs = hours.checked_mul(3600).ok_or_else(|| HoursParseError {
        input: input.to_string(),
        message: "hour count overflows".to_string(),
    })?;

    Ok(Duration::from_secs(secs))
}

/// Converts a fractional hour age into a [`Duration`], rounded to the
/// nearest whole hour.
pub fn sync_age_duration(hours: f64) -> Result<Duration, HoursParseError> {
    parse_hours(&format_hours(hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hours_rounds_to_nearest_whole_hour() {
        assert_eq!(format_hours(25.3), "25h");
        assert_eq!(format_hours(25.6), "26h");
        assert_eq!(format_hours(0.2), "0h");
    }

    #[test]
    fn parse_hours_accepts_whole_hour_strings() {
        assert_eq!(parse_hours("25h"), Ok(Duration::from_secs(25 * 3600)));
        assert_eq!(parse_hours("0h"), Ok(Duration::ZERO));
        assert_eq!(parse_hours(" 7h "), Ok(Duration::from_secs(7 * 3600)));
    }

    #[test]
    fn parse_hours_rejects_missing_suffix() {
        assert!(parse_hours("25").is_err());
        assert!(parse_hours("").is_err());
    }

    #[test]
    fn parse_hours_rejects_negative_and_non_numeric_values() {
        assert!(parse_hours("-25h").is_err());
        assert!(parse_hours("NaNh").is_err());
        assert!(parse_hours("infh").is_err());
        assert!(parse_hours("h").is_err());
    }

    #[test]
    fn sync_age_duration_rounds_before_parsing() {
        assert_eq!(sync_age_duration(25.3), Ok(Duration::from_secs(25 * 3600)));
        assert_eq!(sync_age_duration(0.0), Ok(Duration::ZERO));
    }

    #[test]
    fn sync_age_duration_rejects_invalid_ages() {
        assert!(sync_age_duration(-1.0).is_err());
        assert!(sync_age_duration(f64::NAN).is_err());
        assert!(sync_age_duration(f64::INFINITY).is_err());
    }

    #[test]
    fn formatting_and_reparsing_is_stable() {
        for hours in [0.0, 1.49, 25.3, 167.9, 4000.0] {
            let duration = sync_age_duration(hours).expect("valid age");
            assert_eq!(parse_hours(&format_hours(hours)), Ok(duration));
        }
    }
}
