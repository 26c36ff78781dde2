use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockmetaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Credential error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Batch error: {0}")]
    Batch(#[from] crate::batch::BatchError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Model '{model}' is not configured for service '{service}'")]
    UnknownModel { service: String, model: String },

    #[error("No credential configured for service '{service}': {reason}")]
    MissingCredential { service: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory scan failed for '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, StockmetaError>;
