pub mod backup;
pub mod broker;
pub mod config;
pub mod duration;
pub mod error;
pub mod export;
pub mod images;
pub mod ingest;
pub mod model;
pub mod nextcloud;
pub mod operations;
pub mod schema;
pub mod store;
pub mod units;

pub use backup::BackupEngine;
pub use broker::BrokerRegistry;
pub use config::AppConfig;
pub use error::{RecipyaError, Result};
pub use export::{export_recipes, FileType};
pub use images::{ImageStore, UploadImage};
pub use ingest::{extract_recipes, Extraction, FilePart};
pub use model::{Cookbook, Nutrition, Recipe, Recipes, ShareLink, ShareTarget, Times};
pub use nextcloud::NextcloudImporter;
pub use schema::RecipeSchema;
pub use store::{MemoryRepository, Repository};
pub use units::MeasurementSystem;
