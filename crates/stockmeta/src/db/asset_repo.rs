//! Asset repository: CRUD operations for the `assets` table.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{now_rfc3339, Database, DatabaseError};

/// Lifecycle status of an asset record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Draft,
    Processing,
    Success,
    Failed,
    Stopping,
    Stopped,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Draft => "draft",
            AssetStatus::Processing => "processing",
            AssetStatus::Success => "success",
            AssetStatus::Failed => "failed",
            AssetStatus::Stopping => "stopping",
            AssetStatus::Stopped => "stopped",
        }
    }

    /// True for the statuses a run can leave a record in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssetStatus::Success | AssetStatus::Failed | AssetStatus::Stopped
        )
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown asset status '{0}'")]
pub struct ParseStatusError(String);

impl FromStr for AssetStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(AssetStatus::Draft),
            "processing" => Ok(AssetStatus::Processing),
            "success" => Ok(AssetStatus::Success),
            "failed" => Ok(AssetStatus::Failed),
            "stopping" => Ok(AssetStatus::Stopping),
            "stopped" => Ok(AssetStatus::Stopped),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl ToSql for AssetStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AssetStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A raw asset row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRow {
    pub id: i64,
    pub filepath: String,
    pub filename: String,
    pub title: String,
    pub description: String,
    /// Comma-joined tag list.
    pub tags: String,
    pub status: AssetStatus,
    pub original_filename: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AssetRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filepath: row.get("filepath")?,
            filename: row.get("filename")?,
            title: row.get("title")?,
            description: row.get("description")?,
            tags: row.get("tags")?,
            status: row.get("status")?,
            original_filename: row.get("original_filename")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn filename_of(filepath: &str) -> String {
    Path::new(filepath)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| filepath.to_string())
}

/// Registers a file as a draft asset. Importing an already known path
/// returns the existing row unchanged.
pub fn import(db: &Database, filepath: &str) -> Result<AssetRow, DatabaseError> {
    let filename = filename_of(filepath);
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO assets (filepath, filename, original_filename, status,
             created_at, updated_at)
             VALUES (?1, ?2, ?2, ?3, ?4, ?4)",
            params![filepath, filename, AssetStatus::Draft, now],
        )?;
        Ok(())
    })?;

    find_by_filepath(db, filepath)?.ok_or_else(|| DatabaseError::UnknownAsset(filepath.to_string()))
}

/// Finds an asset by its file path.
pub fn find_by_filepath(db: &Database, filepath: &str) -> Result<Option<AssetRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM assets WHERE filepath = ?1",
                params![filepath],
                AssetRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists every asset in import order.
pub fn list_all(db: &Database) -> Result<Vec<AssetRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM assets ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], AssetRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists assets with the given status in import order.
pub fn list_by_status(db: &Database, status: AssetStatus) -> Result<Vec<AssetRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM assets WHERE status = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![status], AssetRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts assets with the given status.
pub fn count_by_status(db: &Database, status: AssetStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM assets WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Overwrites the generated fields and status of an asset.
pub fn update_metadata(
    db: &Database,
    filepath: &str,
    title: &str,
    description: &str,
    tags: &str,
    status: AssetStatus,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    let changed = db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE assets SET title = ?2, description = ?3, tags = ?4, status = ?5,
             updated_at = ?6 WHERE filepath = ?1",
            params![filepath, title, description, tags, status, now],
        )?;
        Ok(changed)
    })?;
    if changed == 0 {
        return Err(DatabaseError::UnknownAsset(filepath.to_string()));
    }
    Ok(())
}

/// Updates only the status and updated_at of an asset.
pub fn update_status(
    db: &Database,
    filepath: &str,
    status: AssetStatus,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    let changed = db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE assets SET status = ?2, updated_at = ?3 WHERE filepath = ?1",
            params![filepath, status, now],
        )?;
        Ok(changed)
    })?;
    if changed == 0 {
        return Err(DatabaseError::UnknownAsset(filepath.to_string()));
    }
    Ok(())
}

/// Deletes an asset and, through the foreign key, its category mappings.
pub fn delete(db: &Database, filepath: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM assets WHERE filepath = ?1", params![filepath])?;
        Ok(changed > 0)
    })
}
