//! Write-back of the channel threshold into the per-unit status table

use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_STATUS_TABLE: &str = "huc12_status";

// Table names are interpolated into SQL, so only plain identifiers pass
fn check_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid status table name {:?}", table)))
    }
}

/// Store `threshold` on the unit's row. Returns false when no row matched.
pub fn write_threshold(db_path: &Path, table: &str, unit_id: &str, threshold: i64) -> Result<bool> {
    check_table_name(table)?;
    // An existing store is required; never create an empty one
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    let query = format!(
        "UPDATE {} SET ChannelThreshold = ?1 WHERE HUC12 = ?2",
        table
    );
    let updated = conn.execute(&query, rusqlite::params![threshold, unit_id])?;
    if updated == 0 {
        warn!("No status row for unit {} in {}", unit_id, table);
        return Ok(false);
    }
    info!("Stored channel threshold {} for unit {}", threshold, unit_id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_db(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("status.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE huc12_status (HUC12 TEXT PRIMARY KEY, ChannelThreshold INTEGER);
             INSERT INTO huc12_status VALUES ('070801050302', NULL);",
        )
        .unwrap();
        path
    }

    fn stored(path: &Path) -> Option<i64> {
        let conn = Connection::open(path).unwrap();
        conn.query_row(
            "SELECT ChannelThreshold FROM huc12_status WHERE HUC12 = '070801050302'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn threshold_is_written_to_the_unit_row() {
        let dir = tempfile::tempdir().unwrap();
        let db = status_db(dir.path());
        assert!(write_threshold(&db, DEFAULT_STATUS_TABLE, "070801050302", 1349).unwrap());
        assert_eq!(stored(&db), Some(1349));
    }

    #[test]
    fn missing_row_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db = status_db(dir.path());
        assert!(!write_threshold(&db, DEFAULT_STATUS_TABLE, "999999999999", 1000).unwrap());
        assert_eq!(stored(&db), None);
    }

    #[test]
    fn table_names_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let db = status_db(dir.path());
        for bad in ["", "1status", "huc12_status; DROP TABLE x", "a-b"] {
            assert!(matches!(
                write_threshold(&db, bad, "070801050302", 1000),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("absent.db");
        assert!(matches!(
            write_threshold(&db, DEFAULT_STATUS_TABLE, "070801050302", 1000),
            Err(Error::Sqlite(_))
        ));
        assert!(!db.exists());
    }
}
