//! Parsing and formatting of recipe durations.
//!
//! Accepts ISO-8601 `PnDTnHnMnS` (any subset, any case) and colon forms
//! `H:M:S` / `H:M`. Output is always uppercase ISO-8601 with sub-second
//! precision dropped.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{RecipyaError, Result};

static ISO_8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^P(?:(\d+(?:\.\d+)?)D)?(?:T(?:(\d+(?:\.\d+)?)H)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("valid ISO-8601 regex")
});

static COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):(\d{1,2})(?::(\d{1,2}(?:\.\d+)?))?$").expect("valid colon duration regex")
});

const SECONDS_PER_UNIT: [f64; 4] = [86_400.0, 3_600.0, 60.0, 1.0];

/// Parse a duration in ISO-8601 or colon form.
pub fn parse(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }

    if let Some(caps) = ISO_8601.captures(s) {
        // "P" and "PT" alone match the pattern but carry no component
        if caps.iter().skip(1).all(|c| c.is_none()) {
            return Err(RecipyaError::MalformedDuration(input.to_string()));
        }

        let seconds: f64 = caps
            .iter()
            .skip(1)
            .zip(SECONDS_PER_UNIT)
            .filter_map(|(c, factor)| c.and_then(|m| m.as_str().parse::<f64>().ok()).map(|v| v * factor))
            .sum();
        return Duration::try_from_secs_f64(seconds)
            .map_err(|_| RecipyaError::MalformedDuration(input.to_string()));
    }

    if let Some(caps) = COLON.captures(s) {
        let malformed = || RecipyaError::MalformedDuration(input.to_string());
        let hours: u64 = caps[1].parse().map_err(|_| malformed())?;
        let minutes: u64 = caps[2].parse().map_err(|_| malformed())?;
        let seconds: f64 = caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        let whole = hours
            .checked_mul(3_600)
            .and_then(|h| h.checked_add(minutes * 60))
            .ok_or_else(malformed)?;
        return Duration::from_secs(whole)
            .checked_add(Duration::try_from_secs_f64(seconds).map_err(|_| malformed())?)
            .ok_or_else(malformed);
    }

    Err(RecipyaError::MalformedDuration(input.to_string()))
}

/// Format a duration as uppercase ISO-8601, dropping anything below a second.
pub fn format(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "PT0S".to_string();
    }

    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

/// Short human form used in rendered documents, e.g. `1h30m`.
pub fn humanize(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;

    match (hours, minutes) {
        (0, 0) => "-".to_string(),
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h{m:02}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso() {
        assert_eq!(parse("PT30M").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse("PT1H30M").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse("pt1h").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse("P1DT2H").unwrap(), Duration::from_secs(93_600));
        assert_eq!(parse("PT5400.0S").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse("P0D").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_colon() {
        assert_eq!(parse("1:30:00").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse("0:45").unwrap(), Duration::from_secs(2_700));
        assert_eq!(parse("2:05:30").unwrap(), Duration::from_secs(7_530));
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        for input in [
            "PT99999999999999999999H",
            "P99999999999999999999999D",
            "99999999999999999999:00",
            "5124095576030432:00",
        ] {
            assert!(
                matches!(parse(input), Err(RecipyaError::MalformedDuration(_))),
                "{input} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_empty_is_zero() {
        assert_eq!(parse("").unwrap(), Duration::ZERO);
        assert_eq!(parse("   ").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_malformed() {
        for input in ["invalid", "PT15-20M", "P", "PT", "1h30", "T1H"] {
            assert!(
                matches!(parse(input), Err(RecipyaError::MalformedDuration(_))),
                "{input} should be malformed"
            );
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(format(Duration::ZERO), "PT0S");
        assert_eq!(format(Duration::from_secs(600)), "PT10M");
        assert_eq!(format(Duration::from_secs(5_400)), "PT1H30M");
        assert_eq!(format(Duration::from_secs(3_601)), "PT1H1S");
        assert_eq!(format(Duration::from_millis(90_999)), "PT1M30S");
    }

    #[test]
    fn test_round_trip_is_canonical() {
        for (input, canonical) in [
            ("pt1h30m", "PT1H30M"),
            ("PT45M", "PT45M"),
            ("PT2H15M10S", "PT2H15M10S"),
            ("PT10.750S", "PT10S"),
            ("P1D", "PT24H"),
        ] {
            assert_eq!(format(parse(input).unwrap()), canonical);
        }
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize(Duration::ZERO), "-");
        assert_eq!(humanize(Duration::from_secs(600)), "10m");
        assert_eq!(humanize(Duration::from_secs(3_600)), "1h");
        assert_eq!(humanize(Duration::from_secs(5_400)), "1h30m");
    }
}
