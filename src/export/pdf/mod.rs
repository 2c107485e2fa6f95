//! PDF documents for recipes and cookbooks.

pub mod layout;
mod render;

use std::path::Path;

use crate::error::Result;
use crate::model::{Cookbook, Recipe};

pub use render::render;

pub fn recipe_to_pdf(recipe: &Recipe) -> Result<Vec<u8>> {
    render(&layout::recipe_document(recipe))
}

pub fn cookbook_to_pdf(cookbook: &Cookbook, images_dir: &Path) -> Result<Vec<u8>> {
    render(&layout::cookbook_document(cookbook, images_dir))
}
