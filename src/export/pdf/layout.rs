//! Page layout of recipe and cookbook documents.
//!
//! Layout produces a flat list of positioned elements per page; rendering
//! them is left to [`super::render`]. Coordinates are millimetres from the
//! bottom-left corner of a US Letter portrait page.

use std::path::{Path, PathBuf};

use url::Url;

use crate::duration::humanize;
use crate::model::{Cookbook, Recipe};

pub const PAGE_WIDTH: f32 = 215.9;
pub const PAGE_HEIGHT: f32 = 279.4;
pub const MARGIN: f32 = 10.0;

const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const HEADER_HEIGHT: f32 = 12.0;
const ROW_HEIGHT: f32 = 8.0;
const FOOTER_Y: f32 = 6.0;
const BOTTOM: f32 = MARGIN + 8.0;
const GUTTER: f32 = 4.0;
const PT_TO_MM: f32 = 0.3528;

const HEADER_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

/// Text colour as a grey level, 0 is black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gray(pub f32);

pub const BLACK: Gray = Gray(0.0);
pub const GRAY: Gray = Gray(0.5);

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// `y` is the text baseline.
    Text {
        x: f32,
        y: f32,
        size: f32,
        style: FontStyle,
        color: Gray,
        content: String,
    },
    /// Rectangle outline with its lower-left corner at `x`, `y`.
    Border {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Link {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        url: String,
    },
    Image {
        path: PathBuf,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }

    fn push_text(&mut self, x: f32, y: f32, size: f32, style: FontStyle, content: impl Into<String>) {
        self.elements.push(Element::Text {
            x,
            y,
            size,
            style,
            color: BLACK,
            content: content.into(),
        });
    }

    fn push_centered(&mut self, y: f32, size: f32, style: FontStyle, color: Gray, content: &str) {
        let width = text_width(content, size);
        let x = (MARGIN + (CONTENT_WIDTH - width) / 2.0).max(MARGIN);
        self.elements.push(Element::Text {
            x,
            y,
            size,
            style,
            color,
            content: content.to_string(),
        });
    }

    fn push_border(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.elements.push(Element::Border {
            x,
            y,
            width,
            height,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

/// Approximate Helvetica advance widths, in ems.
fn char_em(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.25,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '-' | '/' => 0.33,
        'm' | 'w' | 'M' | 'W' | '@' => 0.85,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.56,
        _ => 0.53,
    }
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(char_em).sum::<f32>() * size * PT_TO_MM
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.4
}

/// Greedy word wrap; words wider than the line are split.
pub fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, size) <= width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if text_width(&current, size) > width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.trim_start_matches("www.").to_string())
}

/// Name banner at the top of every recipe page. Returns the y below it.
fn header(page: &mut Page, name: &str) -> f32 {
    let top = PAGE_HEIGHT - MARGIN;
    page.push_border(MARGIN, top - HEADER_HEIGHT, CONTENT_WIDTH, HEADER_HEIGHT);
    page.push_centered(top - 8.0, HEADER_SIZE, FontStyle::Bold, BLACK, name);
    top - HEADER_HEIGHT - 4.0
}

fn cell_row(page: &mut Page, y: f32, cells: &[(String, FontStyle)]) -> f32 {
    let width = CONTENT_WIDTH / cells.len() as f32;
    for (i, (content, style)) in cells.iter().enumerate() {
        let x = MARGIN + width * i as f32;
        page.push_border(x, y - ROW_HEIGHT, width, ROW_HEIGHT);
        page.push_text(x + 2.0, y - 5.5, BODY_SIZE, *style, content.clone());
    }
    y - ROW_HEIGHT
}

/// Lay out the first-page summary: info row, times, description, nutrition.
fn summary(page: &mut Page, recipe: &Recipe, mut y: f32) -> f32 {
    let category = if recipe.category.trim().is_empty() {
        "Uncategorized".to_string()
    } else {
        recipe.category.clone()
    };
    let host = host_of(&recipe.url);
    let source = match &host {
        Some(host) => format!("Source: {host}"),
        None => "Source: -".to_string(),
    };

    let row_top = y;
    y = cell_row(
        page,
        y,
        &[
            (category, FontStyle::Regular),
            (format!("{} servings", recipe.yields), FontStyle::Regular),
            (source, FontStyle::Regular),
        ],
    );
    if host.is_some() {
        let width = CONTENT_WIDTH / 3.0;
        page.elements.push(Element::Link {
            x: MARGIN + 2.0 * width,
            y: row_top - ROW_HEIGHT,
            width,
            height: ROW_HEIGHT,
            url: recipe.url.clone(),
        });
    }

    y = cell_row(
        page,
        y,
        &[
            (format!("Prep: {}", humanize(recipe.times.prep)), FontStyle::Regular),
            (format!("Cook: {}", humanize(recipe.times.cook)), FontStyle::Regular),
            (format!("Total: {}", humanize(recipe.times.total)), FontStyle::Bold),
        ],
    );

    let description = recipe.description.trim();
    if !description.is_empty() {
        let lines = wrap(description, BODY_SIZE, CONTENT_WIDTH - 4.0);
        let height = lines.len() as f32 * line_height(BODY_SIZE) + 3.0;
        page.push_border(MARGIN, y - height, CONTENT_WIDTH, height);
        let mut line_y = y - 5.0;
        for line in lines {
            page.push_text(MARGIN + 2.0, line_y, BODY_SIZE, FontStyle::Regular, line);
            line_y -= line_height(BODY_SIZE);
        }
        y -= height;
    }

    let facts = recipe.nutrition.facts();
    if !facts.is_empty() {
        y -= 6.0;
        page.push_text(MARGIN, y, HEADING_SIZE, FontStyle::Bold, "Nutrition Facts");
        y -= line_height(HEADING_SIZE);
        for (label, value) in facts {
            page.push_text(MARGIN + 2.0, y, BODY_SIZE - 1.0, FontStyle::Regular, format!("{label}: {value}"));
            y -= line_height(BODY_SIZE - 1.0);
        }
    }
    y - 4.0
}

/// Flow one column of lines across as many pages as needed.
fn flow_column(
    lines: &[String],
    x: f32,
    width: f32,
    heading: &str,
    first_y: f32,
    next_y: f32,
) -> Vec<Vec<Element>> {
    let mut pages: Vec<Vec<Element>> = vec![Vec::new()];
    let mut y = first_y;
    let mut heading_text = heading.to_string();
    let mut needs_heading = true;

    for line in lines {
        for (i, wrapped) in wrap(line, BODY_SIZE, width).into_iter().enumerate() {
            let reserve = if needs_heading { line_height(HEADING_SIZE) } else { 0.0 };
            if y - reserve - line_height(BODY_SIZE) < BOTTOM {
                pages.push(Vec::new());
                y = next_y;
                heading_text = format!("{heading} (continued)");
                needs_heading = true;
            }
            let Some(elements) = pages.last_mut() else {
                break;
            };
            if needs_heading {
                elements.push(Element::Text {
                    x,
                    y,
                    size: HEADING_SIZE,
                    style: FontStyle::Bold,
                    color: BLACK,
                    content: heading_text.clone(),
                });
                y -= line_height(HEADING_SIZE);
                needs_heading = false;
            }
            let indent = if i == 0 { 0.0 } else { 4.0 };
            elements.push(Element::Text {
                x: x + indent,
                y,
                size: BODY_SIZE,
                style: FontStyle::Regular,
                color: BLACK,
                content: wrapped,
            });
            y -= line_height(BODY_SIZE);
        }
    }

    if needs_heading {
        if let Some(elements) = pages.last_mut() {
            elements.push(Element::Text {
                x,
                y,
                size: HEADING_SIZE,
                style: FontStyle::Bold,
                color: BLACK,
                content: heading_text,
            });
        }
    }
    pages
}

/// Pages of a single recipe, without footers.
pub fn recipe_pages(recipe: &Recipe) -> Vec<Page> {
    let mut first = Page::default();
    let body_top = header(&mut first, &recipe.name);
    let columns_top = summary(&mut first, recipe, body_top);

    let third = CONTENT_WIDTH / 3.0;
    let ingredients: Vec<String> = recipe.ingredients.iter().map(|i| format!("-> {i}")).collect();
    let instructions: Vec<String> = recipe
        .instructions
        .iter()
        .enumerate()
        .map(|(n, s)| format!("{}. {}", n + 1, s))
        .collect();

    let left = flow_column(&ingredients, MARGIN, third - GUTTER, "Ingredients", columns_top, body_top);
    let right = flow_column(
        &instructions,
        MARGIN + third,
        2.0 * third,
        "Instructions",
        columns_top,
        body_top,
    );

    let count = left.len().max(right.len());
    let mut pages = vec![first];
    for _ in 1..count {
        let mut page = Page::default();
        header(&mut page, &recipe.name);
        pages.push(page);
    }
    for column in [left, right] {
        for (page, elements) in pages.iter_mut().zip(column) {
            page.elements.extend(elements);
        }
    }
    pages
}

/// Number every page after the first, starting at one.
fn add_footers(pages: &mut [Page]) {
    for (index, page) in pages.iter_mut().enumerate().skip(1) {
        page.push_centered(FOOTER_Y, FOOTER_SIZE, FontStyle::Italic, GRAY, &format!("Page {index}"));
    }
}

pub fn recipe_document(recipe: &Recipe) -> Document {
    let mut pages = recipe_pages(recipe);
    add_footers(&mut pages);
    Document {
        title: recipe.name.clone(),
        pages,
    }
}

/// Title page followed by every member recipe.
pub fn cookbook_document(cookbook: &Cookbook, images_dir: &Path) -> Document {
    let mut title_page = Page::default();
    let mut y = PAGE_HEIGHT * 0.7;
    title_page.push_centered(y, 28.0, FontStyle::Bold, BLACK, &cookbook.title);
    y -= 12.0;

    if let Some(id) = cookbook.image {
        let path = images_dir.join(format!("{id}.jpg"));
        if path.exists() {
            let size = 80.0;
            title_page.elements.push(Element::Image {
                path,
                x: (PAGE_WIDTH - size) / 2.0,
                y: y - size,
                width: size,
                height: size,
            });
            y -= size + 10.0;
        }
    }

    let categories = cookbook.dominant_categories(5);
    if !categories.is_empty() {
        title_page.push_centered(y, HEADING_SIZE, FontStyle::Regular, BLACK, &categories.join(" | "));
        y -= line_height(HEADING_SIZE) + 2.0;
    }
    title_page.push_centered(y, HEADING_SIZE, FontStyle::Italic, GRAY, &cookbook.recipe_count_phrase());

    let mut pages = vec![title_page];
    for recipe in &cookbook.recipes {
        pages.extend(recipe_pages(recipe));
    }
    add_footers(&mut pages);
    Document {
        title: cookbook.title.clone(),
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Nutrition;

    fn recipe(ingredients: usize, instructions: usize) -> Recipe {
        Recipe {
            name: "Pancakes".to_string(),
            category: "breakfast".to_string(),
            url: "https://www.example.com/pancakes".to_string(),
            yields: 4,
            ingredients: (0..ingredients).map(|i| format!("{i} cups flour")).collect(),
            instructions: (0..instructions).map(|i| format!("Step number {i}")).collect(),
            ..Default::default()
        }
    }

    fn text_elements(page: &Page) -> Vec<(&str, f32, FontStyle)> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { content, size, style, .. } => Some((content.as_str(), *size, *style)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_wrap() {
        let lines = wrap("one two three four five six seven", 10.0, 20.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 10.0) <= 20.0));
        assert_eq!(lines.join(" "), "one two three four five six seven");
        assert!(wrap("", 10.0, 20.0).is_empty());
    }

    #[test]
    fn test_first_page() {
        let doc = recipe_document(&recipe(2, 2));
        assert_eq!(doc.pages.len(), 1);
        let page = &doc.pages[0];
        let texts = text_elements(page);

        assert_eq!(texts[0], ("Pancakes", HEADER_SIZE, FontStyle::Bold));
        assert!(texts.contains(&("breakfast", BODY_SIZE, FontStyle::Regular)));
        assert!(texts.contains(&("4 servings", BODY_SIZE, FontStyle::Regular)));
        assert!(texts.contains(&("Source: example.com", BODY_SIZE, FontStyle::Regular)));
        assert!(texts.contains(&("Total: -", BODY_SIZE, FontStyle::Bold)));
        assert!(texts.contains(&("-> 0 cups flour", BODY_SIZE, FontStyle::Regular)));
        assert!(texts.contains(&("2. Step number 1", BODY_SIZE, FontStyle::Regular)));
        assert!(page.elements.iter().any(|e| matches!(
            e,
            Element::Link { url, .. } if url == "https://www.example.com/pancakes"
        )));
        assert!(!page.texts().any(|t| t.starts_with("Page ")));
        assert!(!page.texts().any(|t| t == "Nutrition Facts"));
    }

    #[test]
    fn test_nutrition_block() {
        let mut r = recipe(1, 1);
        r.nutrition = Nutrition {
            calories: "250 kcal".to_string(),
            ..Default::default()
        };
        let doc = recipe_document(&r);
        let texts: Vec<_> = doc.pages[0].texts().collect();
        assert!(texts.contains(&"Nutrition Facts"));
        assert!(texts.contains(&"Calories: 250 kcal"));
        assert!(!texts.iter().any(|t| t.starts_with("Sodium")));
    }

    #[test]
    fn test_overflow_adds_pages() {
        let doc = recipe_document(&recipe(80, 5));
        assert!(doc.pages.len() >= 2);

        let second: Vec<_> = doc.pages[1].texts().collect();
        assert!(second.contains(&"Pancakes"));
        assert!(second.contains(&"Ingredients (continued)"));
        assert!(!second.contains(&"Instructions (continued)"));
        assert!(second.contains(&"Page 1"));

        let all: Vec<_> = doc.pages.iter().flat_map(|p| p.texts()).collect();
        assert!(all.contains(&"-> 79 cups flour"));
        for page in &doc.pages {
            for element in &page.elements {
                if let Element::Text { y, .. } = element {
                    assert!(*y >= FOOTER_Y && *y <= PAGE_HEIGHT);
                }
            }
        }
    }

    #[test]
    fn test_footer_style() {
        let doc = recipe_document(&recipe(80, 80));
        let footer = doc.pages[1].elements.iter().find_map(|e| match e {
            Element::Text { content, size, style, color, .. } if content == "Page 1" => {
                Some((*size, *style, *color))
            }
            _ => None,
        });
        assert_eq!(footer, Some((FOOTER_SIZE, FontStyle::Italic, GRAY)));
    }

    #[test]
    fn test_cookbook_title_page() {
        let cookbook = Cookbook {
            title: "Family".to_string(),
            recipes: vec![recipe(1, 1)],
            ..Default::default()
        };
        let doc = cookbook_document(&cookbook, Path::new("/nonexistent"));

        let title: Vec<_> = doc.pages[0].texts().collect();
        assert_eq!(title, vec!["Family", "breakfast", "1 recipe"]);
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[1].texts().any(|t| t == "Page 1"));
    }
}
