//! On-disk image store. Every upload is re-encoded as a small JPEG and
//! stored under a fresh identifier.

use std::fs::OpenOptions;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use log::debug;
use uuid::Uuid;

use crate::config::ImageConfig;
use crate::error::{RecipyaError, Result};

/// Formats accepted for recipe images.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png];

/// Anything able to persist an image and hand back its identifier.
pub trait UploadImage: Send + Sync {
    fn upload_image(&self, reader: &mut dyn Read) -> Result<Uuid>;
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    config: ImageConfig,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, config: ImageConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a stored image, whether or not it exists.
    pub fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.jpg"))
    }

    /// Decode, shrink, re-encode and persist an image.
    pub fn upload(&self, reader: &mut dyn Read) -> Result<Uuid> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to read image: {e}")))?;

        let encoded = self.process(&data)?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to create image directory: {e}")))?;

        let id = Uuid::new_v4();
        let path = self.path(id);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to create {}: {e}", path.display())))?;
        file.write_all(&encoded)
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to write {}: {e}", path.display())))?;

        debug!("Stored image {} ({} bytes)", id, encoded.len());
        Ok(id)
    }

    fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to read image: {e}")))?;

        let format = reader
            .format()
            .ok_or_else(|| RecipyaError::ImageRejected("Could not detect image format".to_string()))?;
        if !ALLOWED_FORMATS.contains(&format) {
            return Err(RecipyaError::ImageRejected(format!(
                "Unsupported image format: {format:?}. Allowed: JPEG, PNG"
            )));
        }

        let mut img = reader
            .decode()
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to decode image: {e}")))?;

        if img.width().max(img.height()) > self.config.max_dimension {
            img = img.resize_exact(img.width() / 2, img.height() / 2, FilterType::Nearest);
        }

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality)
            .encode_image(&img.to_rgb8())
            .map_err(|e| RecipyaError::ImageRejected(format!("Failed to encode image: {e}")))?;
        Ok(buf)
    }
}

impl UploadImage for ImageStore {
    fn upload_image(&self, reader: &mut dyn Read) -> Result<Uuid> {
        self.upload(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn stored_dimensions(store: &ImageStore, id: Uuid) -> (u32, u32) {
        let img = image::open(store.path(id)).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_large_image_is_halved() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), ImageConfig::default());

        let id = store.upload(&mut Cursor::new(png(1000, 600))).unwrap();

        assert!(store.path(id).exists());
        assert_eq!(stored_dimensions(&store, id), (500, 300));
    }

    #[test]
    fn test_small_image_keeps_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), ImageConfig::default());

        let id = store.upload(&mut Cursor::new(png(800, 400))).unwrap();

        assert_eq!(stored_dimensions(&store, id), (800, 400));
    }

    #[test]
    fn test_every_upload_gets_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), ImageConfig::default());
        let data = png(20, 20);

        let first = store.upload(&mut Cursor::new(data.clone())).unwrap();
        let second = store.upload(&mut Cursor::new(data)).unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), ImageConfig::default());

        let result = store.upload(&mut Cursor::new(b"not an image".to_vec()));

        assert!(matches!(result, Err(RecipyaError::ImageRejected(_))));
        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }
}
