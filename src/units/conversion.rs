use super::fractions::{format_decimal, replace_decimal_fractions};
use super::MeasurementSystem;

/// A unit recognized in free-form recipe text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Gram,
    Kilogram,
    Milliliter,
    Liter,
    Celsius,
    Centimeter,
    Millimeter,
    Ounce,
    Pound,
    FluidOunce,
    Cup,
    Teaspoon,
    Tablespoon,
    Pint,
    Quart,
    Gallon,
    Fahrenheit,
    Inch,
    Foot,
}

/// Alternation of every unit spelling, longest spellings first so that
/// `fl oz` wins over `oz` and `grams` over `g`.
pub(crate) const UNIT_PATTERN: &str = concat!(
    r"fluid\s+ounces?|fl\.?\s?oz|tablespoons?|tbsps?|tbs|teaspoons?|tsps?|",
    r"ounces?|oz|pounds?|lbs?|cups?|pints?|pt|quarts?|qt|gallons?|gal|",
    r"inch(?:es)?|in|feet|foot|ft|",
    r"[°º]\s?f|degrees?\s+f(?:ahrenheit)?|[°º]\s?c|degrees?\s+c(?:elsius)?|",
    r"kilograms?|kg|grams?|g|millilit(?:er|re)s?|ml|lit(?:er|re)s?|l|",
    r"centimet(?:er|re)s?|cm|millimet(?:er|re)s?|mm"
);

impl Unit {
    /// Map a matched spelling back to its unit.
    pub fn from_token(token: &str) -> Option<Unit> {
        let t: String = token
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect();

        let unit = match t.as_str() {
            "g" | "gram" | "grams" => Unit::Gram,
            "kg" | "kilogram" | "kilograms" => Unit::Kilogram,
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => Unit::Milliliter,
            "l" | "liter" | "liters" | "litre" | "litres" => Unit::Liter,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Unit::Centimeter,
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Unit::Millimeter,
            "oz" | "ounce" | "ounces" => Unit::Ounce,
            "lb" | "lbs" | "pound" | "pounds" => Unit::Pound,
            "floz" | "fluidounce" | "fluidounces" => Unit::FluidOunce,
            "cup" | "cups" => Unit::Cup,
            "tsp" | "tsps" | "teaspoon" | "teaspoons" => Unit::Teaspoon,
            "tbsp" | "tbsps" | "tbs" | "tablespoon" | "tablespoons" => Unit::Tablespoon,
            "pint" | "pints" | "pt" => Unit::Pint,
            "quart" | "quarts" | "qt" => Unit::Quart,
            "gallon" | "gallons" | "gal" => Unit::Gallon,
            "inch" | "inches" | "in" => Unit::Inch,
            "foot" | "feet" | "ft" => Unit::Foot,
            _ if t.ends_with("fahrenheit") || t == "°f" || t == "ºf" || t == "degreef" || t == "degreesf" => {
                Unit::Fahrenheit
            }
            _ if t.ends_with("celsius") || t == "°c" || t == "ºc" || t == "degreec" || t == "degreesc" => {
                Unit::Celsius
            }
            _ => return None,
        };
        Some(unit)
    }

    pub fn system(self) -> MeasurementSystem {
        match self {
            Unit::Gram
            | Unit::Kilogram
            | Unit::Milliliter
            | Unit::Liter
            | Unit::Celsius
            | Unit::Centimeter
            | Unit::Millimeter => MeasurementSystem::Metric,
            _ => MeasurementSystem::Imperial,
        }
    }

    fn is_temperature(self) -> bool {
        matches!(self, Unit::Celsius | Unit::Fahrenheit)
    }

    /// Spoon and cup measures, which read best in quarters.
    fn is_kitchen_volume(self) -> bool {
        matches!(
            self,
            Unit::Cup | Unit::Teaspoon | Unit::Tablespoon | Unit::Pint | Unit::Quart | Unit::Gallon
        )
    }

    fn symbol(self, value: f64) -> &'static str {
        let plural = value > 1.0;
        match self {
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::Celsius => "°C",
            Unit::Centimeter => "cm",
            Unit::Millimeter => "mm",
            Unit::Ounce => "oz",
            Unit::Pound => "lb",
            Unit::FluidOunce => "fl oz",
            Unit::Cup if plural => "cups",
            Unit::Cup => "cup",
            Unit::Teaspoon => "tsp",
            Unit::Tablespoon => "tbsp",
            Unit::Pint if plural => "pints",
            Unit::Pint => "pint",
            Unit::Quart if plural => "quarts",
            Unit::Quart => "quart",
            Unit::Gallon if plural => "gallons",
            Unit::Gallon => "gallon",
            Unit::Fahrenheit => "°F",
            Unit::Inch => "in",
            Unit::Foot => "ft",
        }
    }
}

// Conversion factors to the metric base units (ml, g, cm).
const ML_PER_TSP: f64 = 4.92892159375;
const ML_PER_TBSP: f64 = 14.78676478125;
const ML_PER_FL_OZ: f64 = 29.5735295625;
const ML_PER_CUP: f64 = 236.5882365;
const ML_PER_PINT: f64 = 473.176473;
const ML_PER_QUART: f64 = 946.352946;
const ML_PER_GALLON: f64 = 3785.411784;
const G_PER_OZ: f64 = 28.349523125;
const G_PER_LB: f64 = 453.59237;
const CM_PER_INCH: f64 = 2.54;
const CM_PER_FOOT: f64 = 30.48;

/// Convert a quantity to the given system, choosing a sensible target unit.
///
/// Returns `None` when the unit already belongs to `target` or `target` is
/// `Invalid`.
pub fn convert(value: f64, unit: Unit, target: MeasurementSystem) -> Option<(f64, Unit)> {
    if unit.system() == target {
        return None;
    }

    match target {
        MeasurementSystem::Metric => Some(to_metric(value, unit)),
        MeasurementSystem::Imperial => Some(to_imperial(value, unit)),
        MeasurementSystem::Invalid => None,
    }
}

fn to_metric(value: f64, unit: Unit) -> (f64, Unit) {
    let (v, u) = match unit {
        Unit::Teaspoon => (value * ML_PER_TSP, Unit::Milliliter),
        Unit::Tablespoon => (value * ML_PER_TBSP, Unit::Milliliter),
        Unit::FluidOunce => (value * ML_PER_FL_OZ, Unit::Milliliter),
        Unit::Cup => (value * ML_PER_CUP, Unit::Milliliter),
        Unit::Pint => (value * ML_PER_PINT, Unit::Milliliter),
        Unit::Quart => (value * ML_PER_QUART, Unit::Milliliter),
        Unit::Gallon => (value * ML_PER_GALLON, Unit::Milliliter),
        Unit::Ounce => (value * G_PER_OZ, Unit::Gram),
        Unit::Pound => (value * G_PER_LB, Unit::Gram),
        Unit::Fahrenheit => ((value - 32.0) * 5.0 / 9.0, Unit::Celsius),
        Unit::Inch => (value * CM_PER_INCH, Unit::Centimeter),
        Unit::Foot => (value * CM_PER_FOOT, Unit::Centimeter),
        other => (value, other),
    };

    match u {
        Unit::Milliliter if v >= 1000.0 => (v / 1000.0, Unit::Liter),
        Unit::Gram if v >= 1000.0 => (v / 1000.0, Unit::Kilogram),
        _ => (v, u),
    }
}

fn to_imperial(value: f64, unit: Unit) -> (f64, Unit) {
    match unit {
        Unit::Gram => {
            let oz = value / G_PER_OZ;
            if oz >= 16.0 {
                (value / G_PER_LB, Unit::Pound)
            } else {
                (oz, Unit::Ounce)
            }
        }
        Unit::Kilogram => (value * 1000.0 / G_PER_LB, Unit::Pound),
        Unit::Milliliter => milliliters_to_imperial(value),
        Unit::Liter => milliliters_to_imperial(value * 1000.0),
        Unit::Celsius => (value * 9.0 / 5.0 + 32.0, Unit::Fahrenheit),
        Unit::Centimeter => (value / CM_PER_INCH, Unit::Inch),
        Unit::Millimeter => (value / 10.0 / CM_PER_INCH, Unit::Inch),
        other => (value, other),
    }
}

fn milliliters_to_imperial(ml: f64) -> (f64, Unit) {
    if ml < ML_PER_TBSP {
        (ml / ML_PER_TSP, Unit::Teaspoon)
    } else if ml < ML_PER_CUP / 4.0 {
        (ml / ML_PER_TBSP, Unit::Tablespoon)
    } else if ml < ML_PER_QUART * 4.0 {
        (ml / ML_PER_CUP, Unit::Cup)
    } else {
        (ml / ML_PER_QUART, Unit::Quart)
    }
}

/// Render a converted quantity with its unit, e.g. `473 ml`, `1½ cups`, `180°C`.
pub fn format_quantity(value: f64, unit: Unit) -> String {
    let rounded = if unit.is_temperature() || (unit.system() == MeasurementSystem::Metric && value >= 10.0) {
        match unit {
            Unit::Kilogram | Unit::Liter => (value * 100.0).round() / 100.0,
            _ => value.round(),
        }
    } else if unit.system() == MeasurementSystem::Metric {
        match unit {
            Unit::Kilogram | Unit::Liter => (value * 100.0).round() / 100.0,
            _ => (value * 10.0).round() / 10.0,
        }
    } else if unit.is_kitchen_volume() {
        let quarter = (value * 4.0).round() / 4.0;
        if quarter == 0.0 {
            (value * 100.0).round() / 100.0
        } else {
            quarter
        }
    } else {
        (value * 100.0).round() / 100.0
    };

    let number = match unit.system() {
        MeasurementSystem::Imperial if !unit.is_temperature() => {
            replace_decimal_fractions(&format_decimal(rounded))
        }
        _ => format_decimal(rounded),
    };

    if unit.is_temperature() {
        format!("{number}{}", unit.symbol(rounded))
    } else {
        format!("{number} {}", unit.symbol(rounded))
    }
}
