//! Mapping between [`Recipe`] and the schema.org `Recipe` vocabulary.
//!
//! Upstream documents disagree on the shape of almost every field, so each
//! field is an untagged enum covering the shapes seen in the wild. Output is
//! always the same canonical shape.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use html_escape::decode_html_entities;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::duration;
use crate::error::{RecipyaError, Result};
use crate::model::{Nutrition, Recipe, Times};
use crate::units::format_decimal;

const SCHEMA_CONTEXT: &str = "https://schema.org";

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid integer regex"));

/// External representation of a recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeSchema {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Text>,
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Text>,
    #[serde(rename = "recipeCategory", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Text>,
    #[serde(rename = "recipeCuisine", default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Keywords>,
    #[serde(rename = "recipeIngredient", default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<TextList>,
    #[serde(rename = "recipeInstructions", default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<TextList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<TextList>,
    #[serde(rename = "recipeYield", default, skip_serializing_if = "Option::is_none")]
    pub recipe_yield: Option<Yield>,
    #[serde(rename = "prepTime", default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(rename = "cookTime", default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(rename = "totalTime", default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionSchema>,
    #[serde(rename = "dateCreated", default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(rename = "dateModified", default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
}

/// A textual field: plain string, number, `{value}` object or a list of those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Plain(String),
    Number(f64),
    Object(ValueObject),
    List(Vec<Text>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueObject {
    #[serde(alias = "text", alias = "name")]
    pub value: String,
}

impl Text {
    fn plain(s: &str) -> Option<Text> {
        if s.trim().is_empty() {
            None
        } else {
            Some(Text::Plain(s.to_string()))
        }
    }

    fn into_string(self) -> String {
        match self {
            Text::Plain(s) => s,
            Text::Number(n) => format_decimal(n),
            Text::Object(obj) => obj.value,
            Text::List(items) => items
                .into_iter()
                .map(Text::into_string)
                .find(|s| !s.trim().is_empty())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Image {
    Url(String),
    Object(ImageObject),
    List(Vec<Image>),
}

impl Image {
    fn into_url(self) -> Option<String> {
        match self {
            Image::Url(url) => Some(url),
            Image::Object(obj) => Some(obj.url),
            Image::List(images) => images.into_iter().next().and_then(Image::into_url),
        }
    }
}

/// Resolve an image reference to a stored image identifier. Accepts a bare
/// identifier or any path/URL whose last segment is one, with or without extension.
fn image_id(reference: &str) -> Option<Uuid> {
    let trimmed = reference.trim();
    if let Ok(id) = Uuid::parse_str(trimmed) {
        return Some(id);
    }
    let path = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    let last = path.rsplit('/').next()?;
    let stem = Path::new(last).file_stem()?.to_str()?;
    Uuid::parse_str(stem).ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    Joined(String),
    List(Vec<String>),
}

impl Keywords {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Keywords::Joined(s) => s.split(',').map(str::to_string).collect(),
            Keywords::List(items) => items,
        };
        raw.iter()
            .map(|k| decode_html_symbols(k.trim()))
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Ingredients, instructions and tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextList {
    Single(String),
    Many(Vec<ListItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Plain(String),
    Object(HowTo),
}

/// `HowToStep`, `HowToSection`, `HowToTool` and plain `{text}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HowTo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "itemListElement", default, skip_serializing_if = "Option::is_none")]
    pub item_list_element: Option<Vec<ListItem>>,
}

impl TextList {
    fn into_lines(self) -> Vec<String> {
        let mut lines = Vec::new();
        match self {
            TextList::Single(s) => lines.extend(s.lines().map(str::to_string)),
            TextList::Many(items) => items.into_iter().for_each(|item| item.collect(&mut lines)),
        }
        lines
            .iter()
            .map(|line| decode_html_symbols(line.trim()))
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn from_lines(lines: &[String]) -> Option<TextList> {
        if lines.is_empty() {
            return None;
        }
        Some(TextList::Many(
            lines.iter().cloned().map(ListItem::Plain).collect(),
        ))
    }
}

impl ListItem {
    fn collect(self, out: &mut Vec<String>) {
        match self {
            ListItem::Plain(s) => out.push(s),
            ListItem::Object(how_to) => {
                if let Some(steps) = how_to.item_list_element {
                    steps.into_iter().for_each(|step| step.collect(out));
                } else if let Some(text) = how_to.text.or(how_to.name) {
                    out.push(text);
                }
            }
        }
    }
}

/// Servings: a count, `{value}`, text with a leading count or a list of those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Yield {
    Count(u64),
    Number(f64),
    Text(String),
    Object { value: Box<Yield> },
    List(Vec<Yield>),
}

impl Yield {
    fn servings(&self) -> Option<u16> {
        match self {
            Yield::Count(n) => Some(u16::try_from(*n).unwrap_or(u16::MAX)),
            Yield::Number(n) if n.is_finite() && *n >= 0.0 => Some(n.round().min(f64::from(u16::MAX)) as u16),
            Yield::Number(_) => None,
            Yield::Text(s) => LEADING_INTEGER
                .find(s)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .map(|n| u16::try_from(n).unwrap_or(u16::MAX)),
            Yield::Object { value } => value.servings(),
            Yield::List(items) => items.iter().find_map(Yield::servings),
        }
    }
}

/// `NutritionInformation`; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionSchema {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cholesterol_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturated_fat_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbohydrate_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_content: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsaturated_fat_content: Option<Text>,
}

impl From<NutritionSchema> for Nutrition {
    fn from(schema: NutritionSchema) -> Self {
        Nutrition {
            calories: text_field(schema.calories),
            cholesterol: text_field(schema.cholesterol_content),
            fiber: text_field(schema.fiber_content),
            protein: text_field(schema.protein_content),
            saturated_fat: text_field(schema.saturated_fat_content),
            sodium: text_field(schema.sodium_content),
            sugars: text_field(schema.sugar_content),
            total_carbohydrates: text_field(schema.carbohydrate_content),
            total_fat: text_field(schema.fat_content),
            unsaturated_fat: text_field(schema.unsaturated_fat_content),
        }
    }
}

impl From<&Nutrition> for NutritionSchema {
    fn from(nutrition: &Nutrition) -> Self {
        NutritionSchema {
            kind: Some("NutritionInformation".to_string()),
            calories: Text::plain(&nutrition.calories),
            cholesterol_content: Text::plain(&nutrition.cholesterol),
            fiber_content: Text::plain(&nutrition.fiber),
            protein_content: Text::plain(&nutrition.protein),
            saturated_fat_content: Text::plain(&nutrition.saturated_fat),
            sodium_content: Text::plain(&nutrition.sodium),
            sugar_content: Text::plain(&nutrition.sugars),
            carbohydrate_content: Text::plain(&nutrition.total_carbohydrates),
            fat_content: Text::plain(&nutrition.total_fat),
            unsaturated_fat_content: Text::plain(&nutrition.unsaturated_fat),
        }
    }
}

fn decode_html_symbols(text: &str) -> String {
    // Some sites double-encode entities
    decode_html_entities(&decode_html_entities(text)).into_owned()
}

fn text_field(field: Option<Text>) -> String {
    field
        .map(|t| decode_html_symbols(t.into_string().trim()))
        .unwrap_or_default()
}

fn parse_duration(field: Option<&str>) -> Result<std::time::Duration> {
    field.map_or(Ok(std::time::Duration::ZERO), duration::parse)
}

fn parse_date(field: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = field?.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(kind)) => kind.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|k| k.as_str().is_some_and(|k| k.eq_ignore_ascii_case("recipe"))),
        _ => false,
    }
}

/// Find the recipe node inside a JSON-LD document: the document itself, an
/// element of a top-level array, or a member of `@graph`.
fn find_recipe_node(document: Value) -> Option<Value> {
    match document {
        Value::Array(items) => items.into_iter().find_map(find_recipe_node),
        Value::Object(_) if is_recipe_type(&document) => Some(document),
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => find_recipe_node(graph),
            // Untyped objects are accepted as long as they look like a recipe
            None if !map.contains_key("@type")
                && (map.contains_key("name") || map.contains_key("recipeIngredient")) =>
            {
                Some(Value::Object(map))
            }
            None => None,
        },
        _ => None,
    }
}

impl RecipeSchema {
    /// Decode a JSON document holding a single recipe.
    pub fn from_slice(bytes: &[u8]) -> Result<RecipeSchema> {
        let document: Value = serde_json::from_slice(bytes)?;
        let node = find_recipe_node(document)
            .ok_or_else(|| RecipyaError::IncompleteRecipe("recipe object".to_string()))?;
        Ok(serde_json::from_value(node)?)
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Build the domain recipe. Fails when the name is missing or a time is malformed.
    pub fn recipe(&self) -> Result<Recipe> {
        Recipe::try_from(self.clone())
    }
}

impl TryFrom<RecipeSchema> for Recipe {
    type Error = RecipyaError;

    fn try_from(schema: RecipeSchema) -> Result<Self> {
        let name = text_field(schema.name);
        if name.is_empty() {
            return Err(RecipyaError::IncompleteRecipe("name".to_string()));
        }

        let prep = parse_duration(schema.prep_time.as_deref())?;
        let cook = parse_duration(schema.cook_time.as_deref())?;

        let created_at = parse_date(schema.date_created.as_deref()).unwrap_or_else(Utc::now);
        let updated_at = parse_date(schema.date_modified.as_deref()).unwrap_or(created_at);

        let image = schema.image.and_then(Image::into_url).and_then(|url| {
            let id = image_id(&url);
            if id.is_none() {
                debug!("Image reference '{}' is not a stored image", url);
            }
            id
        });

        Ok(Recipe {
            id: 0,
            category: text_field(schema.category),
            cuisine: text_field(schema.cuisine),
            name,
            description: text_field(schema.description),
            url: text_field(schema.url),
            image,
            ingredients: schema.ingredients.map(TextList::into_lines).unwrap_or_default(),
            instructions: schema.instructions.map(TextList::into_lines).unwrap_or_default(),
            keywords: schema.keywords.map(Keywords::into_vec).unwrap_or_default(),
            tools: schema.tool.map(TextList::into_lines).unwrap_or_default(),
            nutrition: schema.nutrition.map(Nutrition::from).unwrap_or_default(),
            times: Times::new(prep, cook),
            yields: schema
                .recipe_yield
                .as_ref()
                .and_then(Yield::servings)
                .unwrap_or(0),
            created_at,
            updated_at,
        })
    }
}

impl Recipe {
    /// Canonical schema.org representation.
    pub fn schema(&self) -> RecipeSchema {
        RecipeSchema {
            context: Some(Text::Plain(SCHEMA_CONTEXT.to_string())),
            kind: Some(Text::Plain("Recipe".to_string())),
            name: Some(Text::Plain(self.name.clone())),
            description: Text::plain(&self.description),
            url: Text::plain(&self.url),
            category: Text::plain(&self.category),
            cuisine: Text::plain(&self.cuisine),
            image: self.image.map(|id| Image::Url(id.to_string())),
            keywords: (!self.keywords.is_empty()).then(|| Keywords::Joined(self.keywords.join(","))),
            ingredients: TextList::from_lines(&self.ingredients),
            instructions: TextList::from_lines(&self.instructions),
            tool: TextList::from_lines(&self.tools),
            recipe_yield: Some(Yield::Count(u64::from(self.yields))),
            prep_time: Some(duration::format(self.times.prep)),
            cook_time: Some(duration::format(self.times.cook)),
            total_time: Some(duration::format(self.times.total)),
            nutrition: (!self.nutrition.is_empty()).then(|| NutritionSchema::from(&self.nutrition)),
            date_created: Some(self.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            date_modified: Some(self.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}
