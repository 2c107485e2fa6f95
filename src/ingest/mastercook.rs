//! MasterCook `.mxp` export parser.
//!
//! An export holds any number of recipes, each introduced by a
//! `* Exported from MasterCook *` banner, followed by the title, a block of
//! `Key : value` headers, a dashed ingredient table and free-text directions.

use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use crate::duration;
use crate::model::{Recipe, Recipes, Times};

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z ]+?)\s*:\s*(.*)$").expect("valid header regex"));

/// Two header fields may share a line: `Serving Size  : 4     Preparation Time :0:30`.
static SECOND_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\s{2,}([A-Z][A-Za-z ]+?)\s*:\s*(.*)$").expect("valid second header regex")
});

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));

fn is_banner(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("exported from") && lower.contains("mastercook")
}

fn is_table_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("--------") && trimmed.chars().all(|c| c == '-' || c.is_whitespace())
}

fn is_end_marker(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("- - - -")
        || trimmed.to_lowercase().starts_with("per serving")
        || trimmed.to_lowercase().starts_with("notes")
}

/// Parse every recipe found in a MasterCook export. Recipes without a title are skipped.
pub fn parse(content: &str) -> Recipes {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in content.lines() {
        if is_banner(line) {
            blocks.push(Vec::new());
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }

    // Files saved without the banner still hold a single recipe
    if blocks.is_empty() && !content.trim().is_empty() {
        blocks.push(content.lines().collect());
    }

    blocks
        .iter()
        .filter_map(|block| {
            let recipe = parse_block(block);
            if recipe.is_none() {
                warn!("Skipping MasterCook recipe without a title");
            }
            recipe
        })
        .collect()
}

#[derive(PartialEq)]
enum Section {
    Title,
    Headers,
    Ingredients,
    Directions,
    Done,
}

fn parse_block(lines: &[&str]) -> Option<Recipe> {
    let mut recipe = Recipe::default();
    let mut section = Section::Title;
    let mut prep = std::time::Duration::ZERO;
    let mut paragraph: Vec<String> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        match section {
            Section::Title => {
                if !trimmed.is_empty() {
                    recipe.name = trimmed.to_string();
                    section = Section::Headers;
                }
            }
            Section::Headers => {
                if is_table_rule(line) {
                    section = Section::Ingredients;
                } else {
                    for (key, value) in headers(line) {
                        apply_header(&mut recipe, &mut prep, &key, &value);
                    }
                }
            }
            Section::Ingredients => {
                if trimmed.is_empty() {
                    if !recipe.ingredients.is_empty() {
                        section = Section::Directions;
                    }
                } else {
                    let ingredient = MULTI_SPACE.replace_all(trimmed, " ").replace(" -- ", ", ");
                    recipe.ingredients.push(ingredient);
                }
            }
            Section::Directions => {
                if is_end_marker(line) {
                    section = Section::Done;
                } else if trimmed.is_empty() {
                    flush_paragraph(&mut paragraph, &mut recipe.instructions);
                } else {
                    paragraph.push(trimmed.to_string());
                }
            }
            Section::Done => break,
        }
    }
    flush_paragraph(&mut paragraph, &mut recipe.instructions);

    if recipe.name.is_empty() {
        return None;
    }
    recipe.times = Times::new(prep, std::time::Duration::ZERO);
    debug!(
        "Parsed MasterCook recipe '{}' with {} ingredients",
        recipe.name,
        recipe.ingredients.len()
    );
    Some(recipe)
}

fn flush_paragraph(paragraph: &mut Vec<String>, instructions: &mut Vec<String>) {
    if !paragraph.is_empty() {
        instructions.push(paragraph.join(" "));
        paragraph.clear();
    }
}

fn headers(line: &str) -> Vec<(String, String)> {
    let Some(caps) = HEADER.captures(line) else {
        return Vec::new();
    };
    let key = caps[1].trim().to_string();
    let rest = caps[2].to_string();

    match SECOND_HEADER.captures(&rest) {
        Some(second) => vec![
            (key, second[1].trim().to_string()),
            (second[2].trim().to_string(), second[3].trim().to_string()),
        ],
        None => vec![(key, rest.trim().to_string())],
    }
}

fn apply_header(recipe: &mut Recipe, prep: &mut std::time::Duration, key: &str, value: &str) {
    match key.to_lowercase().as_str() {
        "serving size" | "servings" | "yield" => {
            recipe.yields = value
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
        }
        "preparation time" => match duration::parse(value) {
            Ok(parsed) => *prep = parsed,
            Err(err) => debug!("Ignoring preparation time of '{}': {}", recipe.name, err),
        },
        "categories" => {
            if let Some(first) = MULTI_SPACE.split(value).find(|c| !c.trim().is_empty()) {
                recipe.category = first.trim().to_string();
            }
        }
        "recipe by" | "source" => {
            if value.starts_with("http") {
                recipe.url = value.to_string();
            }
        }
        _ => {}
    }
}
