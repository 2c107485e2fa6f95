use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Unicode vulgar fractions and their decimal values.
pub(crate) const VULGAR_FRACTIONS: &[(char, f64)] = &[
    ('½', 0.5),
    ('⅓', 0.333),
    ('⅔', 0.667),
    ('¼', 0.25),
    ('¾', 0.75),
    ('⅕', 0.2),
    ('⅖', 0.4),
    ('⅗', 0.6),
    ('⅘', 0.8),
    ('⅙', 0.167),
    ('⅚', 0.833),
    ('⅐', 0.143),
    ('⅛', 0.125),
    ('⅜', 0.375),
    ('⅝', 0.625),
    ('⅞', 0.875),
    ('⅑', 0.111),
    ('⅒', 0.1),
];

/// Character class body matching any vulgar fraction.
pub(crate) const VULGAR_CLASS: &str = "½⅓⅔¼¾⅕⅖⅗⅘⅙⅚⅐⅛⅜⅝⅞⅑⅒";

static VULGAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:(\d+)\s?)?([{VULGAR_CLASS}])")).expect("valid vulgar fraction regex")
});

static DECIMAL_FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d*)\.(25|5|75|333|667)\b").expect("valid decimal fraction regex")
});

pub(crate) fn vulgar_value(c: char) -> Option<f64> {
    VULGAR_FRACTIONS
        .iter()
        .find(|(v, _)| *v == c)
        .map(|(_, value)| *value)
}

/// Format a number rounded to three decimals without trailing zeros.
pub fn format_decimal(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    let s = format!("{rounded:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Replace every vulgar fraction with its decimal value, merging it into a
/// preceding integer: `1½` and `1 ½` both become `1.5`, a lone `¼` becomes `0.25`.
pub fn replace_vulgar_fractions(input: &str) -> String {
    VULGAR
        .replace_all(input, |caps: &Captures| {
            let whole: f64 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            let fraction = caps[2]
                .chars()
                .next()
                .and_then(vulgar_value)
                .unwrap_or(0.0);
            format_decimal(whole + fraction)
        })
        .into_owned()
}

/// Collapse `N.25`, `N.5`, `N.75`, `N.333` and `N.667` into `N¼`, `N½`, ...
pub fn replace_decimal_fractions(input: &str) -> String {
    DECIMAL_FRACTION
        .replace_all(input, |caps: &Captures| {
            let vulgar = match &caps[2] {
                "25" => '¼',
                "5" => '½',
                "75" => '¾',
                "333" => '⅓',
                _ => '⅔',
            };
            match &caps[1] {
                "" | "0" => vulgar.to_string(),
                whole => format!("{whole}{vulgar}"),
            }
        })
        .into_owned()
}

/// Parse a quantity such as `2`, `2.5`, `2,5`, `3/4`, `1 1/2`, `1½` or `½`.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(last) = s.chars().last() {
        if let Some(fraction) = vulgar_value(last) {
            let whole = s[..s.len() - last.len_utf8()].trim();
            if whole.is_empty() {
                return Some(fraction);
            }
            return whole.parse::<f64>().ok().map(|w| w + fraction);
        }
    }

    let mut parts = s.split_whitespace();
    let first = parts.next()?;
    match parts.next() {
        Some(second) => {
            let whole: f64 = first.parse().ok()?;
            let fraction = parse_simple_fraction(second)?;
            Some(whole + fraction)
        }
        None if first.contains('/') => parse_simple_fraction(first),
        None => first.replace(',', ".").parse().ok(),
    }
}

fn parse_simple_fraction(s: &str) -> Option<f64> {
    let (numerator, denominator) = s.split_once('/')?;
    let numerator: f64 = numerator.parse().ok()?;
    let denominator: f64 = denominator.parse().ok()?;
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(3.0), "3");
        assert_eq!(format_decimal(1.5), "1.5");
        assert_eq!(format_decimal(0.3333333), "0.333");
        assert_eq!(format_decimal(2.100), "2.1");
        assert_eq!(format_decimal(0.0), "0");
    }

    #[test]
    fn test_replace_vulgar_fractions() {
        assert_eq!(replace_vulgar_fractions("1½ cups"), "1.5 cups");
        assert_eq!(replace_vulgar_fractions("1 ½ cups"), "1.5 cups");
        assert_eq!(replace_vulgar_fractions("add ¼ tsp salt"), "add 0.25 tsp salt");
        assert_eq!(replace_vulgar_fractions("⅓ cup"), "0.333 cup");
        assert_eq!(replace_vulgar_fractions("no fractions"), "no fractions");
    }

    #[test]
    fn test_replace_decimal_fractions() {
        assert_eq!(replace_decimal_fractions("1.5 cups"), "1½ cups");
        assert_eq!(replace_decimal_fractions("0.25 tsp"), "¼ tsp");
        assert_eq!(replace_decimal_fractions("2.75"), "2¾");
        assert_eq!(replace_decimal_fractions("0.333 cup"), "⅓ cup");
        assert_eq!(replace_decimal_fractions("1.667"), "1⅔");
        assert_eq!(replace_decimal_fractions("1.55 kg"), "1.55 kg");
        assert_eq!(replace_decimal_fractions("3 eggs"), "3 eggs");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("2"), Some(2.0));
        assert_eq!(parse_quantity("2.5"), Some(2.5));
        assert_eq!(parse_quantity("2,5"), Some(2.5));
        assert_eq!(parse_quantity("3/4"), Some(0.75));
        assert_eq!(parse_quantity("1 1/2"), Some(1.5));
        assert_eq!(parse_quantity("1½"), Some(1.5));
        assert_eq!(parse_quantity("1 ½"), Some(1.5));
        assert_eq!(parse_quantity("½"), Some(0.5));
        assert_eq!(parse_quantity("1/0"), None);
        assert_eq!(parse_quantity("abc"), None);
    }
}
