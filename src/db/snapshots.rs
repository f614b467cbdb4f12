use chrono::Utc;

use super::connection::{parse_column, parse_opt_timestamp, parse_timestamp, timestamp};
use super::Database;
use crate::errors::AttestorError;
use crate::models::{Snapshot, SnapshotStatus};

pub(crate) const SNAPSHOT_COLUMNS: &str = "id, organization_id, extracted_path, status, current_phase, analysis_started_at, analysis_completed_at, error_message, created_at";

pub(crate) fn snapshot_from_row(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        extracted_path: row.get(2)?,
        status: parse_column(3, row.get(3)?)?,
        current_phase: row.get(4)?,
        analysis_started_at: parse_opt_timestamp(5, row.get(5)?)?,
        analysis_completed_at: parse_opt_timestamp(6, row.get(6)?)?,
        error_message: row.get(7)?,
        created_at: parse_timestamp(8, row.get(8)?)?,
    })
}

impl Database {
    /// Registers an extracted snapshot. Normally done by the ingestion side.
    pub fn create_snapshot(
        &self,
        organization_id: &str,
        extracted_path: &str,
        status: SnapshotStatus,
    ) -> Result<Snapshot, AttestorError> {
        let snapshot = Snapshot {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            extracted_path: extracted_path.to_string(),
            status,
            current_phase: None,
            analysis_started_at: None,
            analysis_completed_at: None,
            error_message: None,
            created_at: Utc::now(),
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (id, organization_id, extracted_path, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                snapshot.id,
                snapshot.organization_id,
                snapshot.extracted_path,
                snapshot.status.as_str(),
                timestamp(snapshot.created_at),
            ],
        ).map_err(|e| AttestorError::Database(format!("Failed to create snapshot: {}", e)))?;
        Ok(snapshot)
    }

    pub fn get_snapshot(&self, id: &str, organization_id: &str) -> Result<Option<Snapshot>, AttestorError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM snapshots WHERE id = ?1 AND organization_id = ?2",
            SNAPSHOT_COLUMNS
        );
        let result = conn.query_row(&sql, rusqlite::params![id, organization_id], snapshot_from_row);
        match result {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AttestorError::Database(format!("Query error: {}", e))),
        }
    }

    /// Set a snapshot's lifecycle status outside of analysis (ingestion,
    /// re-indexing after a failed run). Rejects transitions the lifecycle
    /// does not allow.
    pub fn set_snapshot_status(
        &self,
        id: &str,
        organization_id: &str,
        status: SnapshotStatus,
    ) -> Result<(), AttestorError> {
        let current = self
            .get_snapshot(id, organization_id)?
            .ok_or_else(|| AttestorError::not_found("Snapshot", id))?;
        if !current.status.can_transition_to(status) {
            return Err(AttestorError::Conflict(format!(
                "Snapshot {} cannot move from {} to {}",
                id, current.status, status
            )));
        }
        let conn = self.lock()?;
        let cleared_error: Option<String> = None;
        conn.execute(
            "UPDATE snapshots SET status = ?2, error_message = ?3 WHERE id = ?1",
            rusqlite::params![id, status.as_str(), cleared_error],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_create_and_get_snapshot() {
        let db = Database::in_memory().unwrap();
        let created = db.create_snapshot("org-1", "/data/snap", SnapshotStatus::Indexed).unwrap();

        let fetched = db.get_snapshot(&created.id, "org-1").unwrap().unwrap();
        assert_eq!(fetched.extracted_path, "/data/snap");
        assert_eq!(fetched.status, SnapshotStatus::Indexed);
        assert!(fetched.analysis_started_at.is_none());
    }

    #[test]
    fn test_db_snapshot_scoped_to_org() {
        let db = Database::in_memory().unwrap();
        let created = db.create_snapshot("org-1", "/data/snap", SnapshotStatus::Indexed).unwrap();
        assert!(db.get_snapshot(&created.id, "org-2").unwrap().is_none());
    }

    #[test]
    fn test_db_set_snapshot_status_validates_transition() {
        let db = Database::in_memory().unwrap();
        let created = db.create_snapshot("org-1", "/data/snap", SnapshotStatus::Extracted).unwrap();

        assert!(db.set_snapshot_status(&created.id, "org-1", SnapshotStatus::Completed).is_err());
        db.set_snapshot_status(&created.id, "org-1", SnapshotStatus::Indexed).unwrap();
        let fetched = db.get_snapshot(&created.id, "org-1").unwrap().unwrap();
        assert_eq!(fetched.status, SnapshotStatus::Indexed);
    }

    #[test]
    fn test_db_set_status_missing_snapshot() {
        let db = Database::in_memory().unwrap();
        let err = db.set_snapshot_status("nope", "org-1", SnapshotStatus::Indexed).unwrap_err();
        assert!(matches!(err, AttestorError::NotFound(_)));
    }
}
