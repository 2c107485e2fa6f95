use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sequence of recipes, the unit most operations produce and consume.
pub type Recipes = Vec<Recipe>;

/// A recipe as stored by the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub category: String,
    pub cuisine: String,
    pub name: String,
    pub description: String,
    pub url: String,
    /// Identifier of the image in the image store
    pub image: Option<Uuid>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub keywords: Vec<String>,
    pub tools: Vec<String>,
    pub nutrition: Nutrition,
    pub times: Times,
    /// Number of servings; zero marks an unknown yield from an import
    pub yields: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Nutrition facts, kept as text because upstream values carry their units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: String,
    pub cholesterol: String,
    pub fiber: String,
    pub protein: String,
    pub saturated_fat: String,
    pub sodium: String,
    pub sugars: String,
    pub total_carbohydrates: String,
    pub total_fat: String,
    pub unsaturated_fat: String,
}

impl Nutrition {
    /// Labelled non-empty fields in display order.
    pub fn facts(&self) -> Vec<(&'static str, &str)> {
        [
            ("Calories", self.calories.as_str()),
            ("Total carbs", self.total_carbohydrates.as_str()),
            ("Sugars", self.sugars.as_str()),
            ("Protein", self.protein.as_str()),
            ("Total fat", self.total_fat.as_str()),
            ("Saturated fat", self.saturated_fat.as_str()),
            ("Unsaturated fat", self.unsaturated_fat.as_str()),
            ("Cholesterol", self.cholesterol.as_str()),
            ("Sodium", self.sodium.as_str()),
            ("Fiber", self.fiber.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.facts().is_empty()
    }
}

/// Preparation, cooking and total time. `total` is `prep + cook`, saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Times {
    pub prep: Duration,
    pub cook: Duration,
    pub total: Duration,
}

impl Times {
    pub fn new(prep: Duration, cook: Duration) -> Self {
        Times {
            prep,
            cook,
            total: prep.saturating_add(cook),
        }
    }
}

/// A user's named collection of recipes. Recipes are referenced, not owned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cookbook {
    pub id: i64,
    pub title: String,
    pub image: Option<Uuid>,
    pub recipes: Recipes,
    pub user_id: i64,
}

impl Cookbook {
    /// The `k` most frequent categories among member recipes, ties broken alphabetically.
    pub fn dominant_categories(&self, k: usize) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for recipe in &self.recipes {
            let category = recipe.category.trim();
            if !category.is_empty() {
                *counts.entry(category).or_default() += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(k)
            .map(|(category, _)| category.to_string())
            .collect()
    }

    /// "1 recipe" or "N recipes".
    pub fn recipe_count_phrase(&self) -> String {
        match self.recipes.len() {
            1 => "1 recipe".to_string(),
            n => format!("{n} recipes"),
        }
    }
}

/// What a share link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTarget {
    Recipe(i64),
    Cookbook(i64),
}

/// Public link granting read access to a recipe or cookbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub link: Uuid,
    pub target: ShareTarget,
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe_in(category: &str) -> Recipe {
        Recipe {
            category: category.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_times_total() {
        let times = Times::new(Duration::from_secs(600), Duration::from_secs(1_800));
        assert_eq!(times.total, Duration::from_secs(2_400));
    }

    #[test]
    fn test_times_total_saturates() {
        let times = Times::new(Duration::MAX, Duration::from_secs(60));
        assert_eq!(times.total, Duration::MAX);
    }

    #[test]
    fn test_nutrition_facts_skip_empty() {
        let nutrition = Nutrition {
            calories: "250 kcal".to_string(),
            protein: "  ".to_string(),
            sodium: "12 mg".to_string(),
            ..Default::default()
        };
        assert_eq!(
            nutrition.facts(),
            vec![("Calories", "250 kcal"), ("Sodium", "12 mg")]
        );
        assert!(Nutrition::default().is_empty());
    }

    #[test]
    fn test_dominant_categories() {
        let cookbook = Cookbook {
            recipes: vec![
                recipe_in("dessert"),
                recipe_in("main"),
                recipe_in("dessert"),
                recipe_in("bread"),
                recipe_in("main"),
                recipe_in(""),
                recipe_in("soup"),
            ],
            ..Default::default()
        };
        assert_eq!(cookbook.dominant_categories(3), vec!["dessert", "main", "bread"]);
    }

    #[test]
    fn test_recipe_count_phrase() {
        let mut cookbook = Cookbook::default();
        assert_eq!(cookbook.recipe_count_phrase(), "0 recipes");
        cookbook.recipes.push(Recipe::default());
        assert_eq!(cookbook.recipe_count_phrase(), "1 recipe");
        cookbook.recipes.push(Recipe::default());
        assert_eq!(cookbook.recipe_count_phrase(), "2 recipes");
    }
}
