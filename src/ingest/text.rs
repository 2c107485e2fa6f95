//! Plain-text recipe parser.
//!
//! Recognizes `Title:`, `Yield:`, `Ingredients:` and `Instructions:` headings.
//! Without headings, the first line is the title, the first blank-line
//! delimited block after it the ingredients, and the rest the instructions.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RecipyaError, Result};
use crate::model::Recipe;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(title|name|yield|servings|ingredients|instructions|directions|method)\s*:\s*(.*)$")
        .expect("valid heading regex")
});

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•]\s+|\d+[.)]\s+)").expect("valid list marker regex")
});

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Ingredients,
    Instructions,
}

fn strip_marker(line: &str) -> String {
    LIST_MARKER.replace(line.trim(), "").trim().to_string()
}

fn parse_yield(value: &str) -> u16 {
    value
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Parse one recipe from plain text.
pub fn parse(content: &str) -> Result<Recipe> {
    let has_headings = content.lines().any(|line| HEADING.is_match(line));
    let recipe = if has_headings {
        parse_with_headings(content)
    } else {
        parse_blocks(content)
    };

    if recipe.name.is_empty() {
        return Err(RecipyaError::IncompleteRecipe("name".to_string()));
    }
    Ok(recipe)
}

fn parse_with_headings(content: &str) -> Recipe {
    let mut recipe = Recipe::default();
    let mut section = Section::None;

    for line in content.lines() {
        if let Some(caps) = HEADING.captures(line) {
            let value = caps[2].trim();
            section = Section::None;
            match caps[1].to_lowercase().as_str() {
                "title" | "name" => recipe.name = value.to_string(),
                "yield" | "servings" => recipe.yields = parse_yield(value),
                "ingredients" => {
                    section = Section::Ingredients;
                    if !value.is_empty() {
                        recipe.ingredients.push(strip_marker(value));
                    }
                }
                _ => {
                    section = Section::Instructions;
                    if !value.is_empty() {
                        recipe.instructions.push(strip_marker(value));
                    }
                }
            }
            continue;
        }

        let trimmed = line.trim();
        match section {
            Section::Ingredients if trimmed.is_empty() => {
                if !recipe.ingredients.is_empty() {
                    section = Section::None;
                }
            }
            Section::Ingredients => recipe.ingredients.push(strip_marker(trimmed)),
            Section::Instructions if !trimmed.is_empty() => {
                recipe.instructions.push(strip_marker(trimmed))
            }
            Section::None if recipe.name.is_empty() && !trimmed.is_empty() => {
                recipe.name = trimmed.to_string()
            }
            _ => {}
        }
    }
    recipe
}

fn parse_blocks(content: &str) -> Recipe {
    let mut recipe = Recipe::default();
    let mut lines = content.lines().map(str::trim).skip_while(|line| line.is_empty());

    if let Some(title) = lines.next() {
        recipe.name = title.to_string();
    }

    let rest: Vec<&str> = lines.collect();
    let blocks: Vec<Vec<&str>> = rest
        .split(|line| line.is_empty())
        .filter(|block| !block.is_empty())
        .map(|block| block.to_vec())
        .collect();

    let mut blocks = blocks.into_iter();
    if let Some(ingredients) = blocks.next() {
        recipe.ingredients = ingredients.iter().map(|line| strip_marker(line)).collect();
    }
    recipe.instructions = blocks.flatten().map(strip_marker).collect();
    recipe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_headings() {
        let recipe = parse(
            "Title: Pancakes\nYield: 4 servings\n\nIngredients:\n- 1 cup flour\n- 2 eggs\n\n\
             Instructions:\n1. Whisk everything.\n\n2. Fry in butter.\n",
        )
        .unwrap();

        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.yields, 4);
        assert_eq!(recipe.ingredients, vec!["1 cup flour", "2 eggs"]);
        assert_eq!(recipe.instructions, vec!["Whisk everything.", "Fry in butter."]);
    }

    #[test]
    fn test_headings_are_case_insensitive() {
        let recipe = parse("TITLE: Tea\ningredients: 1 tea bag\n\ninstructions: Steep.").unwrap();
        assert_eq!(recipe.name, "Tea");
        assert_eq!(recipe.ingredients, vec!["1 tea bag"]);
        assert_eq!(recipe.instructions, vec!["Steep."]);
    }

    #[test]
    fn test_parse_blocks() {
        let recipe = parse("\nToast\n\n1 slice bread\nbutter\n\nToast the bread.\nSpread butter.\n").unwrap();
        assert_eq!(recipe.name, "Toast");
        assert_eq!(recipe.ingredients, vec!["1 slice bread", "butter"]);
        assert_eq!(recipe.instructions, vec!["Toast the bread.", "Spread butter."]);
    }

    #[test]
    fn test_missing_title() {
        assert!(matches!(
            parse("Ingredients:\nsalt\n"),
            Err(RecipyaError::IncompleteRecipe(_))
        ));
        assert!(parse("   \n\n").is_err());
    }
}
