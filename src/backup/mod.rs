//! Dated backup archives of the data directory and of each user's data.

pub mod scheduler;
pub mod sql;

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{AppConfig, AUXILIARY_DATABASE_FILE, DATABASE_FILE};
use crate::error::{RecipyaError, Result};
use crate::export::{self, FileType};
use crate::images::ImageStore;
use crate::ingest;
use crate::model::{Cookbook, Recipes, ShareLink};
use crate::store::Repository;

const RECIPES_ENTRY: &str = "recipes.zip";
const DELETES_ENTRY: &str = "backup-deletes.sql";
const INSERTS_ENTRY: &str = "backup-inserts.sql";
const IMAGES_PREFIX: &str = "images/";

/// A user backup unpacked and ready to be applied by the persistence layer.
#[derive(Debug)]
pub struct UserBackup {
    pub user_id: i64,
    pub deletes: String,
    pub inserts: String,
    /// Directory holding the cookbook images of the backup
    pub images_dir: PathBuf,
    pub recipes: Recipes,
}

pub fn archive_name(date: NaiveDate) -> String {
    format!("recipya.{}.zip", date.format("%Y-%m-%d"))
}

fn parse_archive_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix("recipya.")?.strip_suffix(".zip")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn io_err(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> RecipyaError {
    let context = context.into();
    move |source| RecipyaError::io(context, source)
}

/// Keep the `keep` most recently modified files of `dir`, removing the rest.
/// Returns the number of files removed.
pub fn apply_retention(dir: &Path, keep: usize) -> Result<usize> {
    let mut files: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(format!("Failed to list {}", dir.display())))? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        files.push((modified, entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }

    // Newest first; names carry the date and settle equal timestamps
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    let mut removed = 0;
    for (_, _, path) in files.into_iter().skip(keep) {
        fs::remove_file(&path).map_err(io_err(format!("Failed to remove {}", path.display())))?;
        debug!("Removed old backup {}", path.display());
        removed += 1;
    }
    Ok(removed)
}

/// Whether a data-directory file belongs in the global backup.
fn include_in_global(relative: &Path) -> bool {
    let in_backups = relative
        .components()
        .any(|c| matches!(c.as_os_str().to_str(), Some("backup" | "backups")));
    if in_backups {
        return false;
    }
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name != format!("{DATABASE_FILE}-wal")
        && name != format!("{DATABASE_FILE}-shm")
        && name != AUXILIARY_DATABASE_FILE
}

/// Write `build`'s archive next to `path` and move it into place once complete.
fn write_atomically(path: &Path, build: impl FnOnce(&mut ZipWriter<File>) -> Result<()>) -> Result<()> {
    let tmp = path.with_extension("zip.tmp");
    let file = File::create(&tmp).map_err(io_err(format!("Failed to create {}", tmp.display())))?;
    let mut writer = ZipWriter::new(file);
    let result = build(&mut writer).and_then(|()| {
        writer.finish()?;
        Ok(())
    });
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).map_err(io_err(format!("Failed to move {}", path.display())))
}

fn build_global(data_dir: &Path, target: &Path) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    write_atomically(target, |writer| {
        for entry in WalkDir::new(data_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let context = format!("Failed to walk {}", data_dir.display());
                RecipyaError::io(context, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(data_dir) else {
                continue;
            };
            if !include_in_global(relative) {
                continue;
            }
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let data = fs::read(entry.path()).map_err(io_err(format!("Failed to read {}", entry.path().display())))?;
            writer.start_file(name, options)?;
            writer.write_all(&data)?;
        }
        Ok(())
    })
}

struct UserData {
    recipes: Recipes,
    cookbooks: Vec<Cookbook>,
    links: Vec<ShareLink>,
}

fn build_user(user_id: i64, data: &UserData, images_dir: &Path, target: &Path) -> Result<()> {
    let recipes_zip = export::export_recipes(&data.recipes, FileType::Json, images_dir, None)?;
    let deletes = sql::deletes(user_id);
    let inserts = sql::inserts(user_id, &data.recipes, &data.cookbooks, &data.links);

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    write_atomically(target, |writer| {
        writer.start_file(RECIPES_ENTRY, stored)?;
        writer.write_all(&recipes_zip)?;
        writer.start_file(DELETES_ENTRY, deflated)?;
        writer.write_all(deletes.as_bytes())?;
        writer.start_file(INSERTS_ENTRY, deflated)?;
        writer.write_all(inserts.as_bytes())?;

        for id in data.cookbooks.iter().filter_map(|c| c.image) {
            let path = images_dir.join(format!("{id}.jpg"));
            match fs::read(&path) {
                Ok(image) => {
                    writer.start_file(format!("{IMAGES_PREFIX}{id}.jpg"), deflated)?;
                    writer.write_all(&image)?;
                }
                Err(err) => warn!("Cookbook image {} missing from backup: {}", id, err),
            }
        }
        Ok(())
    })
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name)?;
    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(io_err(format!("Failed to read {name}")))?;
    Ok(data)
}

fn extract_user(path: &Path, user_id: i64, staging: &Path, images: &ImageStore) -> Result<UserBackup> {
    let file = File::open(path).map_err(io_err(format!("Failed to open {}", path.display())))?;
    let mut archive = ZipArchive::new(file)?;

    let deletes = String::from_utf8_lossy(&read_entry(&mut archive, DELETES_ENTRY)?).into_owned();
    let inserts = String::from_utf8_lossy(&read_entry(&mut archive, INSERTS_ENTRY)?).into_owned();
    let recipes_zip = read_entry(&mut archive, RECIPES_ENTRY)?;
    let recipes = ingest::process_zip(Cursor::new(recipes_zip), images)?;

    let images_dir = staging.join("images");
    fs::create_dir_all(&images_dir).map_err(io_err(format!("Failed to create {}", images_dir.display())))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(file_name) = entry.name().strip_prefix(IMAGES_PREFIX).map(str::to_string) else {
            continue;
        };
        // Only plain file names; anything else could escape the staging directory
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            continue;
        }
        let target = images_dir.join(&file_name);
        let mut out = File::create(&target).map_err(io_err(format!("Failed to create {}", target.display())))?;
        std::io::copy(&mut entry, &mut out).map_err(io_err(format!("Failed to extract {file_name}")))?;
    }

    Ok(UserBackup {
        user_id,
        deletes,
        inserts,
        images_dir,
        recipes,
    })
}

fn join_err(err: tokio::task::JoinError) -> RecipyaError {
    RecipyaError::Worker(err.to_string())
}

/// Creates, lists, prunes and unpacks backups.
pub struct BackupEngine {
    config: AppConfig,
    repository: Arc<dyn Repository>,
    images: Arc<ImageStore>,
}

impl BackupEngine {
    pub fn new(config: AppConfig, repository: Arc<dyn Repository>, images: Arc<ImageStore>) -> Self {
        Self {
            config,
            repository,
            images,
        }
    }

    /// Archive the data directory except backups, database sidecars and the
    /// auxiliary database.
    pub async fn global_backup(&self) -> Result<PathBuf> {
        let dir = self.config.global_backup_dir();
        fs::create_dir_all(&dir).map_err(io_err(format!("Failed to create {}", dir.display())))?;
        let target = dir.join(archive_name(today()));
        let data_dir = self.config.data_dir();

        let path = target.clone();
        tokio::task::spawn_blocking(move || build_global(&data_dir, &path))
            .await
            .map_err(join_err)??;

        let removed = apply_retention(&dir, self.config.backup.retention)?;
        info!("Global backup written to {} ({} old removed)", target.display(), removed);
        Ok(target)
    }

    /// Back up a user for today. Returns `None` when today's archive exists.
    pub async fn user_backup(&self, user_id: i64) -> Result<Option<PathBuf>> {
        self.user_backup_on(user_id, today()).await
    }

    /// Back up a user under the given date. A no-op when that archive exists.
    pub async fn user_backup_on(&self, user_id: i64, date: NaiveDate) -> Result<Option<PathBuf>> {
        let dir = self.config.user_backup_dir(user_id);
        let target = dir.join(archive_name(date));
        if target.exists() {
            debug!("Backup {} already exists", target.display());
            return Ok(None);
        }
        fs::create_dir_all(&dir).map_err(io_err(format!("Failed to create {}", dir.display())))?;

        let data = UserData {
            recipes: self.repository.recipes(user_id).await?,
            cookbooks: self.repository.cookbooks(user_id).await?,
            links: self.repository.share_links(user_id).await?,
        };
        let images_dir = self.images.dir().to_path_buf();
        let path = target.clone();
        tokio::task::spawn_blocking(move || build_user(user_id, &data, &images_dir, &path))
            .await
            .map_err(join_err)??;

        let removed = apply_retention(&dir, self.config.backup.retention)?;
        info!("Backup of user {} written to {} ({} old removed)", user_id, target.display(), removed);
        Ok(Some(target))
    }

    /// Dates of the user's backups, newest first.
    pub fn list_backups(&self, user_id: i64) -> Result<Vec<NaiveDate>> {
        let dir = self.config.user_backup_dir(user_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut dates: Vec<NaiveDate> = fs::read_dir(&dir)
            .map_err(io_err(format!("Failed to list {}", dir.display())))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_archive_name(&entry.file_name().to_string_lossy()))
            .collect();
        dates.sort_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    /// Unpack a user's backup: SQL blobs, recipes re-ingested through the
    /// image store, and cookbook images staged under the restore directory.
    pub async fn extract_user_backup(&self, user_id: i64, date: NaiveDate) -> Result<UserBackup> {
        let path = self.config.user_backup_dir(user_id).join(archive_name(date));
        let staging = self.config.restore_dir(user_id);
        let images = Arc::clone(&self.images);

        tokio::task::spawn_blocking(move || extract_user(&path, user_id, &staging, &images))
            .await
            .map_err(join_err)?
    }

    /// The global backup followed by every user's backup. Failures are logged.
    pub async fn run_all(&self) {
        if let Err(err) = self.global_backup().await {
            warn!("Global backup failed: {}", err);
        }
        let users = match self.repository.user_ids().await {
            Ok(users) => users,
            Err(err) => {
                warn!("Could not list users for backup: {}", err);
                return;
            }
        };
        for user_id in users {
            if let Err(err) = self.user_backup(user_id).await {
                warn!("Backup of user {} failed: {}", user_id, err);
            }
        }
    }
}
