use super::connection::{now, parse_timestamp};
use super::Database;
use crate::audit::{AuditEntry, AuditRecord};
use crate::errors::AttestorError;

impl Database {
    pub fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<(), AttestorError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audit_log (id, action, entity_type, entity_id, user_id, organization_id, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                uuid::Uuid::new_v4().to_string(),
                entry.action.as_str(),
                entry.entity_type,
                entry.entity_id,
                entry.user_id,
                entry.organization_id,
                entry.metadata.to_string(),
                now(),
            ],
        ).map_err(|e| AttestorError::Database(format!("Failed to write audit entry: {}", e)))?;
        Ok(())
    }

    pub fn list_audit_entries(&self, entity_id: &str) -> Result<Vec<AuditRecord>, AttestorError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT action, entity_type, entity_id, user_id, organization_id, metadata, created_at FROM audit_log WHERE entity_id = ?1 ORDER BY created_at, rowid"
        ).map_err(|e| AttestorError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map(rusqlite::params![entity_id], |row| {
            let metadata: String = row.get(5)?;
            Ok(AuditRecord {
                action: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                user_id: row.get(3)?,
                organization_id: row.get(4)?,
                metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                created_at: parse_timestamp(6, row.get(6)?)?,
            })
        }).map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| AttestorError::Database(format!("Row error: {}", e)))?);
        }
        Ok(entries)
    }
}
