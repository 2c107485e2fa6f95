use std::io::{Cursor, Write};
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use recipya::config::ImageConfig;
use recipya::ingest;
use recipya::{extract_recipes, FilePart, ImageStore, UploadImage};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn noisy_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let [r, g, b, _] = seed.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn recipe_json(name: &str) -> Vec<u8> {
    format!(
        r#"{{"@context":"https://schema.org","@type":"Recipe","name":"{name}","image":"https://example.com/{name}.png","recipeIngredient":["1 egg"],"recipeInstructions":["Cook."]}}"#
    )
    .into_bytes()
}

fn store(dir: &TempDir) -> ImageStore {
    ImageStore::new(dir.path(), ImageConfig::default())
}

#[test]
fn test_image_before_recipe_is_paired() {
    let dir = TempDir::new().unwrap();
    let images = store(&dir);
    let photo = noisy_image(120, 120, ImageFormat::Jpeg);
    assert!(photo.len() >= 8 * 1024);

    let data = archive(&[("image.jpg", &photo), ("recipe.json", &recipe_json("Stew"))]);
    let recipes = ingest::process_zip(Cursor::new(data), &images).unwrap();

    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].name, "Stew");
    let id = recipes[0].image.expect("image should be paired");
    assert!(images.path(id).exists());
}

#[test]
fn test_recipe_json_image_url_is_not_kept() {
    let dir = TempDir::new().unwrap();
    let images = store(&dir);

    let data = archive(&[("Stew/recipe.json", &recipe_json("Stew"))]);
    let recipes = ingest::process_zip(Cursor::new(data), &images).unwrap();

    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].image, None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_folders_pair_their_own_images() {
    let dir = TempDir::new().unwrap();
    let images = store(&dir);
    let photo = noisy_image(96, 96, ImageFormat::Png);

    let data = archive(&[
        ("Soup/recipe.json", &recipe_json("Soup")),
        ("Soup/image.png", &photo),
        ("Cake/recipe.json", &recipe_json("Cake")),
    ]);
    let recipes = ingest::process_zip(Cursor::new(data), &images).unwrap();

    let names: Vec<_> = recipes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Soup", "Cake"]);
    assert!(recipes[0].image.is_some());
    assert!(recipes[1].image.is_none());
}

#[tokio::test]
async fn test_extract_from_several_uploads() {
    let dir = TempDir::new().unwrap();
    let images: Arc<dyn UploadImage> = Arc::new(store(&dir));

    let mastercook = "\
*  Exported from  MasterCook  *

                               Pancakes

Recipe By     :
Serving Size  : 4     Preparation Time :0:20
Categories    : Breakfast

  Amount  Measure       Ingredient -- Preparation Method
--------  ------------  --------------------------------
   1      cup           flour
   1                    egg

Whisk everything together.

Fry in a hot pan.
";

    let parts = vec![
        FilePart::new("application/zip", "export.zip", archive(&[("a/recipe.json", &recipe_json("Soup"))])),
        FilePart::new("application/json", "cake.json", recipe_json("Cake")),
        FilePart::new("application/octet-stream", "pancakes.mxp", mastercook.as_bytes().to_vec()),
        FilePart::new("text/plain", "notes.txt", b"not a recipe".to_vec()),
        FilePart::new("application/json", "broken.json", b"{".to_vec()),
    ];

    let extraction = extract_recipes(parts, images).await;

    let mut names: Vec<_> = extraction.recipes.iter().map(|r| r.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Cake", "Pancakes", "Soup"]);
    assert_eq!(extraction.errors.len(), 1);

    let pancakes = extraction.recipes.iter().find(|r| r.name == "Pancakes").unwrap();
    assert_eq!(pancakes.yields, 4);
    assert_eq!(pancakes.category, "Breakfast");
    assert_eq!(pancakes.ingredients.len(), 2);
}

#[tokio::test]
async fn test_out_of_range_time_skips_only_that_recipe() {
    let dir = TempDir::new().unwrap();
    let images: Arc<dyn UploadImage> = Arc::new(store(&dir));
    let bad = br#"{"@type":"Recipe","name":"Forever","cookTime":"PT99999999999999999999H"}"#;

    let data = archive(&[("good.json", &recipe_json("Soup")), ("bad.json", bad)]);
    let extraction = extract_recipes(vec![FilePart::new("application/zip", "r.zip", data)], images).await;

    assert!(extraction.errors.is_empty());
    let names: Vec<_> = extraction.recipes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Soup"]);
}
