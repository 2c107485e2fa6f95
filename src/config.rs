use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Base directory holding images, backups and the database
    pub data_dir: DataDir,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Backup schedule and retention
    pub backup: BackupConfig,
    /// Image store settings
    pub images: ImageConfig,
}

/// Base data directory with the layout the core expects under it
#[derive(Debug, Deserialize, Clone)]
#[serde(transparent)]
pub struct DataDir(pub PathBuf);

impl Default for DataDir {
    fn default() -> Self {
        DataDir(PathBuf::from("data"))
    }
}

/// Configuration for the HTTP surface
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request deadline in seconds
    pub request_timeout: u64,
    /// Drain window on shutdown in seconds
    pub shutdown_grace: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: 15,
            shutdown_grace: 10,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

/// Configuration for scheduled backups
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackupConfig {
    /// Whether the scheduler runs at all
    pub enabled: bool,
    /// Number of archives kept per backup directory
    pub retention: usize,
    /// Hours between scheduled runs
    pub interval_hours: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention: default_retention(),
            interval_hours: 24,
        }
    }
}

/// Configuration for image processing
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImageConfig {
    /// Images wider or taller than this are halved
    pub max_dimension: u32,
    /// JPEG quality used when re-encoding
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            jpeg_quality: 33,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8078
}

fn default_retention() -> usize {
    10
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPYA__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPYA__SERVER__PORT
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.0.clone()
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.0.join("images")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.0.join(DATABASE_FILE)
    }

    pub fn global_backup_dir(&self) -> PathBuf {
        self.data_dir.0.join("backups").join("global")
    }

    pub fn user_backup_dir(&self, user_id: i64) -> PathBuf {
        self.data_dir
            .0
            .join("backups")
            .join("users")
            .join(user_id.to_string())
    }

    pub fn restore_dir(&self, user_id: i64) -> PathBuf {
        self.data_dir
            .0
            .join("backups")
            .join("restore")
            .join(user_id.to_string())
    }
}

/// File name of the primary database inside the data directory
pub const DATABASE_FILE: &str = "recipya.db";

/// Read-only nutrition database shipped next to the primary one
pub const AUXILIARY_DATABASE_FILE: &str = "fdc.db";

/// Load configuration from file and environment variables
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("config").required(false))
        // Use double underscore for nested: RECIPYA__SERVER__PORT
        .add_source(
            Environment::with_prefix("RECIPYA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8078);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(config.backup.retention, 10);
        assert_eq!(config.images.max_dimension, 800);
        assert_eq!(config.images.jpeg_quality, 33);
    }

    #[test]
    fn test_layout_paths() {
        let config = AppConfig {
            data_dir: DataDir(PathBuf::from("/srv/recipya")),
            ..Default::default()
        };

        assert_eq!(config.images_dir(), Path::new("/srv/recipya/images"));
        assert_eq!(
            config.global_backup_dir(),
            Path::new("/srv/recipya/backups/global")
        );
        assert_eq!(
            config.user_backup_dir(7),
            Path::new("/srv/recipya/backups/users/7")
        );
        assert_eq!(
            config.restore_dir(7),
            Path::new("/srv/recipya/backups/restore/7")
        );
        assert_eq!(config.database_path(), Path::new("/srv/recipya/recipya.db"));
    }

    #[test]
    fn test_load_config_without_file() {
        // Every field is defaulted, so an empty environment still deserializes
        let config = load_config().unwrap();
        assert!(config.backup.retention > 0);
        assert!(!config.server.host.is_empty());
    }
}
