//! Category mapping repository for the `asset_categories` table.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::generation::{CategoryAssignment, CategorySlot, StockPlatform};

/// Inserts or replaces the category of one platform slot of an asset.
pub fn upsert(
    db: &Database,
    file_id: i64,
    assignment: &CategoryAssignment,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO asset_categories (file_id, platform, slot, category_id, category_name)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_id, platform, slot) DO UPDATE SET
               category_id = excluded.category_id,
               category_name = excluded.category_name",
            params![
                file_id,
                assignment.platform.as_str(),
                assignment.slot.number(),
                assignment.category_id,
                assignment.category_name,
            ],
        )?;
        Ok(())
    })
}

/// Lists the category assignments of an asset ordered by platform and slot.
pub fn list_for_file(db: &Database, file_id: i64) -> Result<Vec<CategoryAssignment>, DatabaseError> {
    let raw: Vec<(String, u8, String, String)> = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT platform, slot, category_id, category_name FROM asset_categories
             WHERE file_id = ?1 ORDER BY platform ASC, slot ASC",
        )?;
        let rows = stmt
            .query_map(params![file_id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    raw.into_iter()
        .map(|(platform, slot, category_id, category_name)| {
            let platform = platform.parse::<StockPlatform>().map_err(|_| DatabaseError::InvalidValue {
                column: "platform",
                value: platform.clone(),
            })?;
            let slot = CategorySlot::from_number(slot).ok_or(DatabaseError::InvalidValue {
                column: "slot",
                value: slot.to_string(),
            })?;
            Ok(CategoryAssignment {
                platform,
                slot,
                category_id,
                category_name,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::asset_repo;

    #[test]
    fn test_upsert_replaces_same_slot() {
        let db = Database::open_in_memory().unwrap();
        let asset = asset_repo::import(&db, "/p/a.jpg").unwrap();

        let first = CategoryAssignment::new(StockPlatform::Shutterstock, CategorySlot::Primary, "12", "Nature");
        let second = CategoryAssignment::new(StockPlatform::Shutterstock, CategorySlot::Primary, "3", "Animals");
        upsert(&db, asset.id, &first).unwrap();
        upsert(&db, asset.id, &second).unwrap();

        let stored = list_for_file(&db, asset.id).unwrap();
        assert_eq!(stored, vec![second]);
    }

    #[test]
    fn test_two_slots_and_single_slot_platform() {
        let db = Database::open_in_memory().unwrap();
        let asset = asset_repo::import(&db, "/p/a.jpg").unwrap();

        let assignments = vec![
            CategoryAssignment::new(StockPlatform::Shutterstock, CategorySlot::Secondary, "7", "Business"),
            CategoryAssignment::new(StockPlatform::AdobeStock, CategorySlot::Primary, "11", "Landscapes"),
            CategoryAssignment::new(StockPlatform::Shutterstock, CategorySlot::Primary, "12", "Nature"),
        ];
        for a in &assignments {
            upsert(&db, asset.id, a).unwrap();
        }

        let stored = list_for_file(&db, asset.id).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].platform, StockPlatform::AdobeStock);
        assert_eq!(stored[1].slot, CategorySlot::Primary);
        assert_eq!(stored[2].slot, CategorySlot::Secondary);
    }

    #[test]
    fn test_categories_removed_with_asset() {
        let db = Database::open_in_memory().unwrap();
        let asset = asset_repo::import(&db, "/p/a.jpg").unwrap();
        let a = CategoryAssignment::new(StockPlatform::AdobeStock, CategorySlot::Primary, "11", "Landscapes");
        upsert(&db, asset.id, &a).unwrap();

        asset_repo::delete(&db, "/p/a.jpg").unwrap();
        assert!(list_for_file(&db, asset.id).unwrap().is_empty());
    }
}
