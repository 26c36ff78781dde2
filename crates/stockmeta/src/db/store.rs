//! Persistence seam used by the batch engine.

use super::{asset_repo, category_repo, token_repo, AssetRow, AssetStatus, Database, DatabaseError};
use crate::generation::CategoryAssignment;
use crate::stats::TokenTotals;

pub use token_repo::TokenUsage;

/// Store keyed by file path that receives batch results.
///
/// The batch engine writes through this trait from a single thread, after
/// each chunk completes.
pub trait AssetStore: Send + Sync {
    fn update_metadata(
        &self,
        filepath: &str,
        title: &str,
        description: &str,
        tags: &str,
        status: AssetStatus,
    ) -> Result<(), DatabaseError>;

    fn update_status(&self, filepath: &str, status: AssetStatus) -> Result<(), DatabaseError>;

    fn upsert_categories(
        &self,
        filepath: &str,
        categories: &[CategoryAssignment],
    ) -> Result<(), DatabaseError>;

    fn append_token_usage(&self, usage: &TokenUsage<'_>) -> Result<(), DatabaseError>;

    fn get_all_records(&self) -> Result<Vec<AssetRow>, DatabaseError>;

    fn get_records_by_status(&self, status: AssetStatus) -> Result<Vec<AssetRow>, DatabaseError>;

    fn get_aggregate_token_usage(&self) -> Result<TokenTotals, DatabaseError>;
}

impl AssetStore for Database {
    fn update_metadata(
        &self,
        filepath: &str,
        title: &str,
        description: &str,
        tags: &str,
        status: AssetStatus,
    ) -> Result<(), DatabaseError> {
        asset_repo::update_metadata(self, filepath, title, description, tags, status)
    }

    fn update_status(&self, filepath: &str, status: AssetStatus) -> Result<(), DatabaseError> {
        asset_repo::update_status(self, filepath, status)
    }

    fn upsert_categories(
        &self,
        filepath: &str,
        categories: &[CategoryAssignment],
    ) -> Result<(), DatabaseError> {
        if categories.is_empty() {
            return Ok(());
        }
        let asset = asset_repo::find_by_filepath(self, filepath)?
            .ok_or_else(|| DatabaseError::UnknownAsset(filepath.to_string()))?;
        for assignment in categories {
            if !assignment.is_valid() {
                log::warn!(
                    "Skipping invalid {} category slot {:?} for {}",
                    assignment.platform,
                    assignment.slot,
                    filepath
                );
                continue;
            }
            category_repo::upsert(self, asset.id, assignment)?;
        }
        Ok(())
    }

    fn append_token_usage(&self, usage: &TokenUsage<'_>) -> Result<(), DatabaseError> {
        token_repo::append(self, usage)
    }

    fn get_all_records(&self) -> Result<Vec<AssetRow>, DatabaseError> {
        asset_repo::list_all(self)
    }

    fn get_records_by_status(&self, status: AssetStatus) -> Result<Vec<AssetRow>, DatabaseError> {
        asset_repo::list_by_status(self, status)
    }

    fn get_aggregate_token_usage(&self) -> Result<TokenTotals, DatabaseError> {
        token_repo::aggregate(self)
    }
}
