//! Checks that run before any chunk is dispatched.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::BatchError;
use crate::db::{AssetRow, AssetStatus, AssetStore};

/// Which records a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every imported record that has not succeeded yet.
    All,
    /// The selected records that have not succeeded yet.
    Selected,
    /// Records whose previous attempt failed.
    Failed,
}

impl RunMode {
    /// User-facing explanation for a mode that matched nothing.
    pub fn empty_message(&self) -> &'static str {
        match self {
            RunMode::All => "No files left to process. Import some images or videos first.",
            RunMode::Selected => "No files selected. Select at least one row to generate metadata.",
            RunMode::Failed => "No failed files to retry.",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::All => "all",
            RunMode::Selected => "selected",
            RunMode::Failed => "failed",
        })
    }
}

/// Token cost estimate shown before a large run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub files: usize,
    pub tokens_per_file: u64,
    pub total_tokens: u64,
}

impl CostEstimate {
    pub fn new(files: usize, tokens_per_file: u64) -> Self {
        Self {
            files,
            tokens_per_file,
            total_tokens: files as u64 * tokens_per_file,
        }
    }
}

/// Records in these statuses may enter `processing`.
pub fn is_eligible(status: AssetStatus) -> bool {
    matches!(
        status,
        AssetStatus::Draft | AssetStatus::Failed | AssetStatus::Stopped
    )
}

/// Returns the records a run in `mode` covers, in store order for `all` and
/// `failed` and in selection order for `selected`. Successful records are
/// never picked up again.
pub fn select_records(
    store: &dyn AssetStore,
    mode: RunMode,
    selected: &[String],
) -> Result<Vec<AssetRow>, BatchError> {
    let records = match mode {
        RunMode::All => store
            .get_all_records()?
            .into_iter()
            .filter(|r| is_eligible(r.status))
            .collect(),
        RunMode::Failed => store.get_records_by_status(AssetStatus::Failed)?,
        RunMode::Selected => {
            let all = store.get_all_records()?;
            let mut seen = HashSet::new();
            let mut picked = Vec::with_capacity(selected.len());
            for path in selected {
                if !seen.insert(path.as_str()) {
                    continue;
                }
                match all.iter().find(|r| &r.filepath == path) {
                    Some(record) if is_eligible(record.status) => picked.push(record.clone()),
                    Some(record) => {
                        log::info!("Skipping {} file: {}", record.status, path)
                    }
                    None => log::warn!("Selected file is not imported, skipping: {}", path),
                }
            }
            picked
        }
    };

    if records.is_empty() {
        return Err(BatchError::NoEligibleFiles { mode });
    }
    Ok(records)
}

/// Paths of records whose file is gone from disk.
pub fn find_missing_files(records: &[AssetRow]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !Path::new(&r.filepath).is_file())
        .map(|r| r.filepath.clone())
        .collect()
}

/// Fails with every missing path at once.
pub fn ensure_files_exist(records: &[AssetRow]) -> Result<(), BatchError> {
    let paths = find_missing_files(records);
    if paths.is_empty() {
        Ok(())
    } else {
        Err(BatchError::MissingFiles { paths })
    }
}

/// Only `all` runs over the threshold ask for confirmation.
pub fn needs_confirmation(mode: RunMode, files: usize, threshold: usize) -> bool {
    mode == RunMode::All && files > threshold
}
