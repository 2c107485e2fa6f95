//! Measurement-system detection and conversion of free-form recipe text.

mod conversion;
mod fractions;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub use conversion::{convert, format_quantity, Unit};
pub use fractions::{
    format_decimal, parse_quantity, replace_decimal_fractions, replace_vulgar_fractions,
};

use conversion::UNIT_PATTERN;
use fractions::VULGAR_CLASS;

/// The measurement system a piece of text is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSystem {
    Metric,
    Imperial,
    #[default]
    Invalid,
}

impl fmt::Display for MeasurementSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementSystem::Metric => "metric",
            MeasurementSystem::Imperial => "imperial",
            MeasurementSystem::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

impl FromStr for MeasurementSystem {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "metric" => MeasurementSystem::Metric,
            "imperial" => MeasurementSystem::Imperial,
            _ => MeasurementSystem::Invalid,
        })
    }
}

fn number_pattern() -> String {
    format!(r"\d+\s+\d+/\d+|\d+\s?[{VULGAR_CLASS}]|[{VULGAR_CLASS}]|\d+/\d+|\d+(?:[.,]\d+)?")
}

/// A quantity followed by a unit. Bare `C`/`F` only count when glued to the
/// number (`180C`), otherwise `2 c` would read as Celsius.
static QUANTITY_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<qty>{})(?:(?P<bare>(?-i:[CF]))|\s*(?P<unit>{UNIT_PATTERN}))\b",
        number_pattern()
    ))
    .expect("valid quantity regex")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?P<qty>{})", number_pattern())).expect("valid number regex"));

fn unit_of(caps: &Captures) -> Option<Unit> {
    if let Some(bare) = caps.name("bare") {
        return match bare.as_str() {
            "C" => Some(Unit::Celsius),
            _ => Some(Unit::Fahrenheit),
        };
    }
    caps.name("unit").and_then(|m| Unit::from_token(m.as_str()))
}

/// Detect the measurement system of a sentence from its first quantity with a unit.
pub fn detect(sentence: &str) -> MeasurementSystem {
    QUANTITY_UNIT
        .captures_iter(sentence)
        .find_map(|caps| unit_of(&caps))
        .map(Unit::system)
        .unwrap_or(MeasurementSystem::Invalid)
}

/// Rewrite every `from`-system quantity in a sentence into the `to` system.
///
/// Tokens that cannot be parsed or converted are left as they are; this
/// never fails.
pub fn convert_sentence(sentence: &str, from: MeasurementSystem, to: MeasurementSystem) -> String {
    QUANTITY_UNIT
        .replace_all(sentence, |caps: &Captures| {
            let original = caps[0].to_string();
            let Some(unit) = unit_of(caps) else {
                return original;
            };
            if unit.system() != from {
                return original;
            }
            let Some(value) = parse_quantity(&caps["qty"]) else {
                debug!("Leaving unparseable quantity '{}' as is", original);
                return original;
            };
            match convert(value, unit, to) {
                Some((converted, target_unit)) => format_quantity(converted, target_unit),
                None => original,
            }
        })
        .into_owned()
}

/// Apply [`convert_sentence`] to each sentence of a paragraph, keeping the
/// delimiters and surrounding whitespace intact.
pub fn convert_paragraph(paragraph: &str, from: MeasurementSystem, to: MeasurementSystem) -> String {
    split_sentences(paragraph)
        .into_iter()
        .map(|sentence| convert_sentence(sentence, from, to))
        .collect()
}

/// Split after `.`, `!` or `?` when followed by whitespace or the end of text.
/// Decimal points such as `2.5` do not split.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = match chars.peek() {
            None => true,
            Some((_, next)) => next.is_whitespace(),
        };
        if !at_boundary {
            continue;
        }
        // Keep trailing whitespace with the sentence it follows
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        sentences.push(&paragraph[start..end]);
        start = end;
    }

    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }
    sentences
}

/// Multiply the quantities of a sentence by `multiplier`.
///
/// With `with_units_only`, only quantities followed by a unit are touched;
/// otherwise every number is. Results are written without trailing zeros and
/// with common decimals folded back into vulgar fractions.
pub fn scale_sentence(sentence: &str, multiplier: f64, with_units_only: bool) -> String {
    let regex: &Regex = if with_units_only { &QUANTITY_UNIT } else { &NUMBER };

    regex
        .replace_all(sentence, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let qty = &caps["qty"];

            // Digits glued to a word ("step2", "x3") are not quantities
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            if sentence[..start].chars().last().is_some_and(char::is_alphabetic) {
                return whole.to_string();
            }

            match parse_quantity(qty) {
                Some(value) => {
                    let scaled = replace_decimal_fractions(&format_decimal(value * multiplier));
                    let rest = &whole[qty.len()..];
                    format!("{scaled}{rest}")
                }
                None => whole.to_string(),
            }
        })
        .into_owned()
}
