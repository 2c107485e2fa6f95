use thiserror::Error;

use crate::units::MeasurementSystem;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, RecipyaError>;

/// Errors that can occur while ingesting, transforming, exporting or backing up recipes
#[derive(Error, Debug)]
pub enum RecipyaError {
    /// Duration is neither ISO-8601 nor colon separated
    #[error("Malformed duration: {0}")]
    MalformedDuration(String),

    /// Schema recipe lacks a required field
    #[error("Incomplete recipe: missing {0}")]
    IncompleteRecipe(String),

    /// No ingredient carries a recognizable unit
    #[error("Could not determine measurement system")]
    UnknownSystem,

    /// Conversion target equals the recipe's current system
    #[error("Recipe is already in the {0} system")]
    AlreadyInTargetSystem(MeasurementSystem),

    /// Scaling target below one serving
    #[error("Invalid yield: {0}")]
    InvalidYield(i64),

    /// Image could not be decoded, resized, encoded or persisted
    #[error("Image rejected: {0}")]
    ImageRejected(String),

    /// Export file type not recognized
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The user has no live notification channel
    #[error("User is not connected")]
    NotConnected,

    /// Disk or socket failure with context
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to talk to a remote cookbook
    #[error("HTTP request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Failed to decode or encode JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or write a ZIP archive
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// PDF document could not be assembled
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    /// A concurrent worker panicked or was cancelled
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RecipyaError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RecipyaError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<std::io::Error> for RecipyaError {
    fn from(source: std::io::Error) -> Self {
        RecipyaError::io("I/O error", source)
    }
}
