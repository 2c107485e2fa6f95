//! Bulk recipe ingestion from uploaded files.

pub mod mastercook;
pub mod text;

use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::{RecipyaError, Result};
use crate::images::UploadImage;
use crate::model::{Recipe, Recipes};
use crate::schema::RecipeSchema;

/// Images inside archives smaller than this are thumbnails or noise.
pub const MIN_ARCHIVE_IMAGE_BYTES: u64 = 4096;

/// One uploaded file of a multipart form.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub content_type: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn new(content_type: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            file_name: file_name.into(),
            data,
        }
    }
}

/// Recipes recovered from a batch of uploads along with the failures met on the way.
#[derive(Debug, Default)]
pub struct Extraction {
    pub recipes: Recipes,
    pub errors: Vec<RecipyaError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Zip,
    Json,
    MasterCook,
    Ignored,
}

fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn kind_of(part: &FilePart) -> Kind {
    let content_type = part.content_type.to_lowercase();
    if content_type.contains("zip") {
        Kind::Zip
    } else if content_type.contains("json") {
        Kind::Json
    } else if content_type == "application/octet-stream" && extension(&part.file_name) == "mxp" {
        Kind::MasterCook
    } else {
        Kind::Ignored
    }
}

/// Process uploads concurrently, one blocking worker per file.
///
/// Recipes of one file keep their order; blocks from different files are
/// appended as their workers finish. A failing or panicking worker is
/// logged and reported in [`Extraction::errors`] without affecting the others.
pub async fn extract_recipes(parts: Vec<FilePart>, images: Arc<dyn UploadImage>) -> Extraction {
    let recipes: Arc<Mutex<Recipes>> = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = parts
        .into_iter()
        .map(|part| {
            let recipes = Arc::clone(&recipes);
            let images = Arc::clone(&images);
            let file_name = part.file_name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let extracted = process_file(&part, images.as_ref())?;
                let mut guard = recipes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.extend(extracted);
                Ok::<(), RecipyaError>(())
            });
            (file_name, handle)
        })
        .collect();

    let mut errors = Vec::new();
    for (file_name, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!("Failed to extract recipes from '{}': {}", file_name, err);
                errors.push(err);
            }
            Err(join_err) => {
                error!("Worker for '{}' failed: {}", file_name, join_err);
                errors.push(RecipyaError::Worker(format!("{file_name}: {join_err}")));
            }
        }
    }

    let recipes = match Arc::try_unwrap(recipes) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
        Err(shared) => shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone(),
    };

    info!("Extracted {} recipes ({} errors)", recipes.len(), errors.len());
    Extraction { recipes, errors }
}

/// Extract the recipes of a single uploaded file.
pub fn process_file(part: &FilePart, images: &dyn UploadImage) -> Result<Recipes> {
    match kind_of(part) {
        Kind::Zip => process_zip(Cursor::new(part.data.as_slice()), images),
        Kind::Json => Ok(vec![process_json(&part.data)?]),
        Kind::MasterCook => Ok(mastercook::parse(&String::from_utf8_lossy(&part.data))),
        Kind::Ignored => {
            debug!(
                "Ignoring '{}' of type '{}'",
                part.file_name, part.content_type
            );
            Ok(Vec::new())
        }
    }
}

/// Image identifiers found in uploaded JSON never refer to this store.
fn process_json(data: &[u8]) -> Result<Recipe> {
    let mut recipe = RecipeSchema::from_slice(data)?.recipe()?;
    recipe.image = None;
    Ok(recipe)
}

fn is_image(ext: &str) -> bool {
    matches!(ext, "jpg" | "jpeg" | "png")
}

fn is_junk(name: &str) -> bool {
    name.starts_with("__MACOSX/")
        || Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("._"))
}

fn parent_dir(name: &str) -> &str {
    name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Give the pending image to the last recipe if it has none; otherwise drop it.
fn flush_pending(pending: &mut Option<Uuid>, recipes: &mut Recipes) {
    if let Some(id) = pending.take() {
        match recipes.last_mut() {
            Some(last) if last.image.is_none() => last.image = Some(id),
            _ => debug!("Dropping unpaired image {}", id),
        }
    }
}

/// Walk an archive in entry order, pairing images with recipes.
///
/// An image is uploaded only when no other image is pending. A pending image
/// goes to the recipe parsed right after it, or to the last recipe when the
/// archive moves to another directory or ends.
pub fn process_zip<R: Read + Seek>(reader: R, images: &dyn UploadImage) -> Result<Recipes> {
    let mut archive = ZipArchive::new(reader)?;
    let mut recipes: Recipes = Vec::new();
    let mut pending: Option<Uuid> = None;
    let mut current_dir: Option<String> = None;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if is_junk(&name) {
            continue;
        }

        let dir = parent_dir(&name);
        if current_dir.as_deref() != Some(dir) {
            if current_dir.is_some() {
                flush_pending(&mut pending, &mut recipes);
            }
            current_dir = Some(dir.to_string());
        }

        let ext = extension(&name);
        if is_image(&ext) {
            if pending.is_some() || entry.size() < MIN_ARCHIVE_IMAGE_BYTES {
                debug!("Skipping image '{}'", name);
                continue;
            }
            match images.upload_image(&mut entry) {
                Ok(id) => pending = Some(id),
                Err(err) => warn!("Could not store image '{}': {}", name, err),
            }
            continue;
        }

        let parsed: Recipes = match ext.as_str() {
            "json" | "mxp" | "txt" => {
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| RecipyaError::io(format!("Failed to read '{name}'"), e))?;
                match ext.as_str() {
                    "json" => match process_json(&data) {
                        Ok(recipe) => vec![recipe],
                        Err(err) => {
                            warn!("Skipping '{}': {}", name, err);
                            continue;
                        }
                    },
                    "mxp" => mastercook::parse(&String::from_utf8_lossy(&data)),
                    _ => match text::parse(&String::from_utf8_lossy(&data)) {
                        Ok(recipe) => vec![recipe],
                        Err(err) => {
                            warn!("Skipping '{}': {}", name, err);
                            continue;
                        }
                    },
                }
            }
            _ => continue,
        };

        if parsed.is_empty() {
            continue;
        }
        recipes.extend(parsed.into_iter().map(|mut recipe| {
            recipe.image = None;
            recipe
        }));
        flush_pending(&mut pending, &mut recipes);
    }

    flush_pending(&mut pending, &mut recipes);
    Ok(recipes)
}
