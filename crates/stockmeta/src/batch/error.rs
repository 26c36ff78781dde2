use thiserror::Error;

use super::validation::{CostEstimate, RunMode};
use crate::db::DatabaseError;
use crate::error::ConfigError;

/// Reasons a run could not be started or joined.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("A generation run is already in progress")]
    AlreadyRunning,

    #[error("{}", .mode.empty_message())]
    NoEligibleFiles { mode: RunMode },

    #[error("{} file(s) no longer exist:\n{}", .paths.len(), .paths.join("\n"))]
    MissingFiles { paths: Vec<String> },

    #[error(
        "Run over {} files (about {} tokens) was not confirmed",
        .estimate.files,
        .estimate.total_tokens
    )]
    Declined { estimate: CostEstimate },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to spawn batch thread: {0}")]
    SpawnFailed(String),

    #[error("Batch thread panicked")]
    WorkerPanicked,
}
