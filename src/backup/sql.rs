//! SQL fragments stored in user backups.
//!
//! Inserts reference rows by natural keys (recipe name, cookbook title and
//! user id) so they resolve after the recipes are imported again with new ids.

use std::collections::HashMap;
use std::fmt::Write;

use log::warn;
use uuid::Uuid;

use crate::model::{Cookbook, Recipe, ShareLink, ShareTarget};

/// Quote a string literal for SQLite.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_image(image: Option<Uuid>) -> String {
    image.map_or_else(|| "NULL".to_string(), |id| quote(&id.to_string()))
}

fn recipe_by_name(name: &str, user_id: i64) -> String {
    format!(
        "(SELECT r.id FROM recipes AS r JOIN user_recipe AS ur ON ur.recipe_id = r.id \
         WHERE r.name = {} AND ur.user_id = {user_id} ORDER BY r.id LIMIT 1)",
        quote(name)
    )
}

fn cookbook_by_title(title: &str, user_id: i64) -> String {
    format!(
        "(SELECT id FROM cookbooks WHERE title = {} AND user_id = {user_id} ORDER BY id LIMIT 1)",
        quote(title)
    )
}

/// Statements purging everything the restore is about to rebuild.
pub fn deletes(user_id: i64) -> String {
    [
        format!("DELETE FROM share_recipes WHERE user_id = {user_id};"),
        format!("DELETE FROM share_cookbooks WHERE user_id = {user_id};"),
        format!(
            "DELETE FROM cookbook_recipes WHERE cookbook_id IN (SELECT id FROM cookbooks WHERE user_id = {user_id});"
        ),
        format!("DELETE FROM cookbooks WHERE user_id = {user_id};"),
        format!(
            "DELETE FROM recipes WHERE id IN (SELECT recipe_id FROM user_recipe WHERE user_id = {user_id});"
        ),
        format!("DELETE FROM user_recipe WHERE user_id = {user_id};"),
    ]
    .join("\n")
}

/// Statements rebuilding cookbooks, their membership and share links.
pub fn inserts(user_id: i64, recipes: &[Recipe], cookbooks: &[Cookbook], links: &[ShareLink]) -> String {
    let mut sql = String::from("PRAGMA foreign_keys = ON;\n");

    for cookbook in cookbooks {
        let _ = writeln!(
            sql,
            "INSERT INTO cookbooks (title, image, user_id) VALUES ({}, {}, {user_id});",
            quote(&cookbook.title),
            quote_image(cookbook.image)
        );
        for (position, recipe) in cookbook.recipes.iter().enumerate() {
            let _ = writeln!(
                sql,
                "INSERT INTO cookbook_recipes (cookbook_id, recipe_id, order_index) VALUES ({}, {}, {});",
                cookbook_by_title(&cookbook.title, user_id),
                recipe_by_name(&recipe.name, user_id),
                position + 1
            );
        }
    }

    let recipe_names: HashMap<i64, &str> = recipes.iter().map(|r| (r.id, r.name.as_str())).collect();
    let cookbook_titles: HashMap<i64, &str> =
        cookbooks.iter().map(|c| (c.id, c.title.as_str())).collect();

    for link in links {
        let statement = match link.target {
            ShareTarget::Recipe(id) => recipe_names.get(&id).map(|name| {
                format!(
                    "INSERT INTO share_recipes (link, recipe_id, user_id) VALUES ({}, {}, {user_id});",
                    quote(&link.link.to_string()),
                    recipe_by_name(name, user_id)
                )
            }),
            ShareTarget::Cookbook(id) => cookbook_titles.get(&id).map(|title| {
                format!(
                    "INSERT INTO share_cookbooks (link, cookbook_id, user_id) VALUES ({}, {}, {user_id});",
                    quote(&link.link.to_string()),
                    cookbook_by_title(title, user_id)
                )
            }),
        };
        match statement {
            Some(statement) => {
                sql.push_str(&statement);
                sql.push('\n');
            }
            None => warn!("Share link {} points at nothing, skipping", link.link),
        }
    }

    sql.trim_end().to_string()
}
