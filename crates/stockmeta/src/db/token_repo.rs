//! Token usage log: append-only rows in `token_usage`, read back only as sums.

use rusqlite::params;

use super::{now_rfc3339, Database, DatabaseError};
use crate::stats::TokenTotals;

/// One generation attempt's token counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUsage<'a> {
    pub filepath: &'a str,
    pub service: &'a str,
    pub model: &'a str,
    pub token_input: u64,
    pub token_output: u64,
    pub token_total: u64,
}

/// Appends a usage row stamped with the current time.
pub fn append(db: &Database, usage: &TokenUsage<'_>) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO token_usage (filepath, service, model, token_input, token_output,
             token_total, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                usage.filepath,
                usage.service,
                usage.model,
                usage.token_input as i64,
                usage.token_output as i64,
                usage.token_total as i64,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Sums every recorded attempt.
pub fn aggregate(db: &Database) -> Result<TokenTotals, DatabaseError> {
    db.with_conn(|conn| {
        let (input, output, total): (i64, i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(token_input), 0), COALESCE(SUM(token_output), 0),
             COALESCE(SUM(token_total), 0) FROM token_usage",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        Ok(TokenTotals::new(input as u64, output as u64, total as u64))
    })
}

/// Sums attempts grouped by service, ordered by service name.
pub fn aggregate_by_service(db: &Database) -> Result<Vec<(String, TokenTotals)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT service, SUM(token_input), SUM(token_output), SUM(token_total)
             FROM token_usage GROUP BY service ORDER BY service ASC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let service: String = r.get(0)?;
                let input: i64 = r.get(1)?;
                let output: i64 = r.get(2)?;
                let total: i64 = r.get(3)?;
                Ok((
                    service,
                    TokenTotals::new(input as u64, output as u64, total as u64),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of recorded attempts.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let n: u64 = conn.query_row("SELECT COUNT(*) FROM token_usage", [], |r| r.get(0))?;
        Ok(n)
    })
}
