//! Pure transformations on recipes. Every operation returns a new value and
//! leaves the receiver untouched.

use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};

use crate::error::{RecipyaError, Result};
use crate::model::Recipe;
use crate::units::{self, MeasurementSystem};

/// A quantity immediately followed by a lowercase litre, Fahrenheit or Celsius letter.
static LOWERCASE_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d(?:\s*°)?)([lfc])\b").expect("valid lowercase unit regex")
});

fn normalize_text(text: &str) -> String {
    LOWERCASE_UNIT
        .replace_all(text, |caps: &Captures| {
            format!("{}{}", &caps[1], caps[2].to_uppercase())
        })
        .into_owned()
}

impl Recipe {
    /// Deep copy of the recipe.
    pub fn copy(&self) -> Recipe {
        self.clone()
    }

    /// Uppercase `l`, `f` and `c` directly attached to quantities so that
    /// `1l`, `180f` and `20c` read `1L`, `180F` and `20C`.
    pub fn normalize(&self) -> Recipe {
        let mut recipe = self.copy();
        recipe.description = normalize_text(&recipe.description);
        recipe.ingredients = recipe.ingredients.iter().map(|s| normalize_text(s)).collect();
        recipe.instructions = recipe.instructions.iter().map(|s| normalize_text(s)).collect();
        recipe
    }

    /// Scale ingredient quantities to a new number of servings.
    pub fn scale(&self, target_yield: i64) -> Result<Recipe> {
        if target_yield < 1 {
            return Err(RecipyaError::InvalidYield(target_yield));
        }
        let target = u16::try_from(target_yield).map_err(|_| RecipyaError::InvalidYield(target_yield))?;

        let current = self.yields.max(1);
        let mut recipe = self.copy();
        if target == current {
            recipe.yields = target;
            return Ok(recipe);
        }

        let multiplier = f64::from(target) / f64::from(current);
        debug!(
            "Scaling '{}' from {} to {} servings (x{})",
            self.name, current, target, multiplier
        );

        recipe.ingredients = self
            .ingredients
            .iter()
            .map(|ingredient| match units::detect(ingredient) {
                MeasurementSystem::Invalid => units::scale_sentence(ingredient, multiplier, false),
                _ => units::scale_sentence(ingredient, multiplier, true),
            })
            .collect();
        recipe.yields = target;
        Ok(recipe)
    }

    /// The measurement system of the first ingredient that has one.
    pub fn measurement_system(&self) -> MeasurementSystem {
        self.ingredients
            .iter()
            .map(|ingredient| units::detect(ingredient))
            .find(|system| *system != MeasurementSystem::Invalid)
            .unwrap_or(MeasurementSystem::Invalid)
    }

    /// Rewrite ingredients, instructions and description into another system.
    pub fn convert_measurement_system(&self, target: MeasurementSystem) -> Result<Recipe> {
        let current = self.measurement_system();
        if current == MeasurementSystem::Invalid {
            return Err(RecipyaError::UnknownSystem);
        }
        if current == target {
            return Err(RecipyaError::AlreadyInTargetSystem(target));
        }

        let mut recipe = self.copy();
        recipe.ingredients = self
            .ingredients
            .iter()
            .map(|s| units::convert_sentence(s, current, target))
            .collect();
        recipe.instructions = self
            .instructions
            .iter()
            .map(|s| units::convert_sentence(s, current, target))
            .collect();
        recipe.description = units::convert_paragraph(&self.description, current, target);
        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bread() -> Recipe {
        Recipe {
            name: "Bread".to_string(),
            description: "A loaf for 2. Bake at 350°F until golden.".to_string(),
            ingredients: vec![
                "2 large eggs".to_string(),
                "2 cups flour".to_string(),
                "1 tsp salt".to_string(),
            ],
            instructions: vec!["Preheat the oven to 350°F.".to_string(), "Mix.".to_string()],
            yields: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_copy_is_independent() {
        let original = bread();
        let mut copy = original.copy();
        copy.ingredients.push("1 cup water".to_string());
        copy.instructions[0].push_str(" Now.");
        assert_eq!(original, bread());
        assert_ne!(copy, original);
    }

    #[test]
    fn test_normalize() {
        let recipe = Recipe {
            description: "Pour 1l of stock".to_string(),
            ingredients: vec!["1l milk".to_string(), "2 cups flour".to_string()],
            instructions: vec!["Heat to 180f then rest at 20c".to_string(), "Chill at 4 °c".to_string()],
            ..Default::default()
        };
        let normalized = recipe.normalize();
        assert_eq!(normalized.description, "Pour 1L of stock");
        assert_eq!(normalized.ingredients, vec!["1L milk", "2 cups flour"]);
        assert_eq!(
            normalized.instructions,
            vec!["Heat to 180F then rest at 20C", "Chill at 4 °C"]
        );
        assert_eq!(recipe.ingredients[0], "1l milk");
    }

    #[test]
    fn test_scale_doubles_quantities() {
        let recipe = Recipe {
            ingredients: vec!["1 1/2 cups water".to_string(), "3 eggs".to_string()],
            yields: 2,
            ..Default::default()
        };
        let scaled = recipe.scale(4).unwrap();
        assert_eq!(scaled.yields, 4);
        assert_eq!(scaled.ingredients, vec!["3 cups water", "6 eggs"]);
        assert_eq!(recipe.ingredients[0], "1 1/2 cups water");
    }

    #[test]
    fn test_scale_to_same_yield_is_copy() {
        let recipe = bread();
        assert_eq!(recipe.scale(2).unwrap(), recipe.copy());
    }

    #[test]
    fn test_scale_rejects_zero() {
        assert!(matches!(bread().scale(0), Err(RecipyaError::InvalidYield(0))));
        assert!(matches!(bread().scale(-3), Err(RecipyaError::InvalidYield(-3))));
    }

    #[test]
    fn test_scale_unknown_yield_counts_as_one() {
        let recipe = Recipe {
            ingredients: vec!["1 onion".to_string()],
            yields: 0,
            ..Default::default()
        };
        assert_eq!(recipe.scale(3).unwrap().ingredients, vec!["3 onion"]);
    }

    #[test]
    fn test_convert_to_metric() {
        let converted = bread()
            .convert_measurement_system(MeasurementSystem::Metric)
            .unwrap();
        assert_eq!(converted.ingredients[0], "2 large eggs");
        assert_eq!(converted.ingredients[1], "473 ml flour");
        assert_eq!(converted.instructions[0], "Preheat the oven to 177°C.");
        assert_eq!(converted.description, "A loaf for 2. Bake at 177°C until golden.");
    }

    #[test]
    fn test_convert_already_in_target() {
        let recipe = bread();
        let current = recipe.measurement_system();
        assert!(matches!(
            recipe.convert_measurement_system(current),
            Err(RecipyaError::AlreadyInTargetSystem(MeasurementSystem::Imperial))
        ));
    }

    #[test]
    fn test_convert_unknown_system() {
        let recipe = Recipe {
            ingredients: vec!["2 eggs".to_string(), "salt".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            recipe.convert_measurement_system(MeasurementSystem::Metric),
            Err(RecipyaError::UnknownSystem)
        ));
    }
}
