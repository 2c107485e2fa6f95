//! Archive export of recipes as JSON or PDF.

pub mod pdf;

use std::collections::HashSet;
use std::fmt;
use std::io::{Cursor, Write};
use std::path::Path;
use std::str::FromStr;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{RecipyaError, Result};
use crate::model::Recipe;

/// Format of the files inside an export archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Json,
    Pdf,
}

impl FromStr for FileType {
    type Err = RecipyaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(FileType::Json),
            "pdf" => Ok(FileType::Pdf),
            other => Err(RecipyaError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Json => f.write_str("json"),
            FileType::Pdf => f.write_str("pdf"),
        }
    }
}

/// Build a ZIP of `recipes` in the requested format.
///
/// With `progress`, the one-based index of each recipe is sent once its
/// entries are written.
pub fn export_recipes(
    recipes: &[Recipe],
    file_type: FileType,
    images_dir: &Path,
    progress: Option<&UnboundedSender<usize>>,
) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used_names: HashSet<String> = HashSet::new();

    for (index, recipe) in recipes.iter().enumerate() {
        match file_type {
            FileType::Json => {
                let folder = unique_folder_name(&recipe.name, &mut used_names);
                write_json(&mut writer, options, &folder, recipe, images_dir)?;
            }
            FileType::Pdf => {
                let name = unique_pdf_name(&recipe.name, &mut used_names);
                let data = pdf::recipe_to_pdf(recipe)?;
                writer.start_file(name, options)?;
                writer.write_all(&data)?;
            }
        }
        if let Some(sender) = progress {
            if sender.send(index + 1).is_err() {
                debug!("Export progress receiver dropped");
            }
        }
    }

    let data = writer.finish()?.into_inner();
    info!(
        "Exported {} recipes as {} ({} bytes)",
        recipes.len(),
        file_type,
        data.len()
    );
    Ok(data)
}

fn write_json<W: Write + std::io::Seek>(
    writer: &mut ZipWriter<W>,
    options: SimpleFileOptions,
    folder: &str,
    recipe: &Recipe,
    images_dir: &Path,
) -> Result<()> {
    writer.start_file(format!("{folder}/recipe.json"), options)?;
    writer.write_all(&recipe.schema().to_json_pretty()?)?;

    if let Some(id) = recipe.image {
        let path = images_dir.join(format!("{id}.jpg"));
        match std::fs::read(&path) {
            Ok(image) => {
                writer.start_file(format!("{folder}/image.jpg"), options)?;
                writer.write_all(&image)?;
            }
            Err(err) => debug!("No image file for '{}': {}", recipe.name, err),
        }
    }
    Ok(())
}

/// The recipe name, or `{name} (n)` for the n-th recipe sharing it.
fn unique_folder_name(recipe_name: &str, used: &mut HashSet<String>) -> String {
    let mut name = recipe_name.to_string();
    let mut n = 1;
    while used.contains(&name) {
        n += 1;
        name = format!("{recipe_name} ({n})");
    }
    used.insert(name.clone());
    name
}

/// `{name}.pdf` with `/` replaced, suffixed with four hex digits of a fresh
/// identifier when the name is already taken.
fn unique_pdf_name(recipe_name: &str, used: &mut HashSet<String>) -> String {
    let base = recipe_name.replace('/', "_");
    let mut name = format!("{base}.pdf");
    while used.contains(&name) {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(4).collect();
        name = format!("{base}_{suffix}.pdf");
    }
    used.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert_eq!("json".parse::<FileType>().unwrap(), FileType::Json);
        assert_eq!(" PDF ".parse::<FileType>().unwrap(), FileType::Pdf);
        assert!(matches!(
            "docx".parse::<FileType>(),
            Err(RecipyaError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unique_pdf_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_pdf_name("Soup/Stew", &mut used), "Soup_Stew.pdf");

        let second = unique_pdf_name("Soup/Stew", &mut used);
        assert_ne!(second, "Soup_Stew.pdf");
        assert!(second.starts_with("Soup_Stew_"));
        assert_eq!(second.len(), "Soup_Stew_XXXX.pdf".len());
        assert!(second[10..14].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unique_folder_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_folder_name("Soup", &mut used), "Soup");
        assert_eq!(unique_folder_name("Soup", &mut used), "Soup (2)");
        assert_eq!(unique_folder_name("Soup", &mut used), "Soup (3)");
        assert_eq!(unique_folder_name("Soup (2)", &mut used), "Soup (2) (2)");
    }
}
