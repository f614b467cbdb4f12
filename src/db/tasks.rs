use super::connection::{parse_column, parse_timestamp, timestamp};
use super::Database;
use crate::errors::AttestorError;
use crate::models::RepositoryTask;

impl Database {
    pub fn insert_task(&self, task: &RepositoryTask) -> Result<(), AttestorError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO repository_tasks (id, snapshot_id, finding_id, title, description, category, priority, status, assigned_role, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                task.id,
                task.snapshot_id,
                task.finding_id,
                task.title,
                task.description,
                task.category.as_str(),
                task.priority.as_str(),
                task.status.as_str(),
                task.assigned_role,
                timestamp(task.created_at),
            ],
        ).map_err(|e| AttestorError::Database(format!("Failed to insert task: {}", e)))?;
        Ok(())
    }

    pub fn list_tasks(&self, snapshot_id: &str, organization_id: &str) -> Result<Vec<RepositoryTask>, AttestorError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.snapshot_id, t.finding_id, t.title, t.description, t.category, t.priority, t.status, t.assigned_role, t.created_at FROM repository_tasks t JOIN snapshots s ON s.id = t.snapshot_id WHERE t.snapshot_id = ?1 AND s.organization_id = ?2 ORDER BY t.created_at, t.rowid"
        ).map_err(|e| AttestorError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map(rusqlite::params![snapshot_id, organization_id], |row| {
            Ok(RepositoryTask {
                id: row.get(0)?,
                snapshot_id: row.get(1)?,
                finding_id: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                category: parse_column(5, row.get(5)?)?,
                priority: parse_column(6, row.get(6)?)?,
                status: parse_column(7, row.get(7)?)?,
                assigned_role: row.get(8)?,
                created_at: parse_timestamp(9, row.get(9)?)?,
            })
        }).map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|e| AttestorError::Database(format!("Row error: {}", e)))?);
        }
        Ok(tasks)
    }
}
