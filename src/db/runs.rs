use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::connection::{
    is_constraint_violation, now, parse_column, parse_json, parse_opt_timestamp, parse_timestamp, timestamp,
};
use super::Database;
use crate::errors::AttestorError;
use crate::models::{
    AnalysisDepth, AnalysisRun, AnalysisStatus, Framework, PhaseErrorEntry, PhaseStatus, PhaseTransition,
    RunMetrics, SnapshotStatus,
};

const RUN_COLUMNS: &str = "r.id, r.snapshot_id, r.frameworks, r.depth, r.phase, r.phase_status, r.progress, r.metrics, r.error_log, r.phase_history, r.created_by, r.heartbeat_at, r.started_at, r.completed_at";

fn run_from_row(row: &rusqlite::Row) -> rusqlite::Result<AnalysisRun> {
    let progress: i64 = row.get(6)?;
    Ok(AnalysisRun {
        id: row.get(0)?,
        snapshot_id: row.get(1)?,
        frameworks: parse_json(2, row.get(2)?)?,
        depth: parse_column(3, row.get(3)?)?,
        phase: row.get(4)?,
        phase_status: parse_column(5, row.get(5)?)?,
        progress: progress.clamp(0, 100) as u8,
        metrics: parse_json(7, row.get(7)?)?,
        error_log: parse_json(8, row.get(8)?)?,
        phase_history: parse_json(9, row.get(9)?)?,
        created_by: row.get(10)?,
        heartbeat_at: parse_opt_timestamp(11, row.get(11)?)?,
        started_at: parse_timestamp(12, row.get(12)?)?,
        completed_at: parse_opt_timestamp(13, row.get(13)?)?,
    })
}

/// A run whose heartbeat went quiet, as seen by the sweeper.
#[derive(Debug, Clone)]
pub struct StaleRun {
    pub run_id: String,
    pub snapshot_id: String,
    pub organization_id: String,
}

/// Append one entry to a JSON array column of `analysis_runs`.
fn append_json_entry<T: Serialize>(
    conn: &Connection,
    run_id: &str,
    column: &str,
    entry: &T,
) -> Result<(), AttestorError> {
    let current: String = conn
        .query_row(
            &format!("SELECT {} FROM analysis_runs WHERE id = ?1", column),
            rusqlite::params![run_id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AttestorError::not_found("Run", run_id),
            other => AttestorError::Database(format!("Query error: {}", other)),
        })?;
    let mut entries: Vec<serde_json::Value> = serde_json::from_str(&current)?;
    entries.push(serde_json::to_value(entry)?);
    conn.execute(
        &format!("UPDATE analysis_runs SET {} = ?2 WHERE id = ?1", column),
        rusqlite::params![run_id, serde_json::to_string(&entries)?],
    ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
    Ok(())
}

fn record_transition(conn: &Connection, run_id: &str, phase: &str, status: PhaseStatus) -> Result<(), AttestorError> {
    let transition = PhaseTransition {
        phase: phase.to_string(),
        status,
        at: Utc::now(),
    };
    append_json_entry(conn, run_id, "phase_history", &transition)
}

impl Database {
    /// Atomically validate the snapshot, claim its analysis slot and create a
    /// `pending` run. The whole check-and-insert happens in one transaction and
    /// the partial unique index backs it up at the storage layer.
    pub fn create_run_for_snapshot(
        &self,
        snapshot_id: &str,
        organization_id: &str,
        frameworks: &[Framework],
        depth: AnalysisDepth,
        user_id: &str,
        first_phase: &str,
    ) -> Result<AnalysisRun, AttestorError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()
            .map_err(|e| AttestorError::Database(format!("Failed to begin transaction: {}", e)))?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM snapshots WHERE id = ?1 AND organization_id = ?2",
                rusqlite::params![snapshot_id, organization_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;
        let status: SnapshotStatus = match status {
            Some(s) => s.parse().map_err(AttestorError::Database)?,
            None => return Err(AttestorError::not_found("Snapshot", snapshot_id)),
        };

        let active: Option<String> = tx
            .query_row(
                "SELECT id FROM analysis_runs WHERE snapshot_id = ?1 AND completed_at IS NULL LIMIT 1",
                rusqlite::params![snapshot_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;
        if let Some(run_id) = active {
            return Err(AttestorError::Conflict(format!(
                "Snapshot {} already has analysis {} in progress",
                snapshot_id, run_id
            )));
        }
        if status != SnapshotStatus::Indexed {
            return Err(AttestorError::Conflict(format!(
                "Snapshot {} is not ready for analysis (status: {})",
                snapshot_id, status
            )));
        }

        let started_at = Utc::now();
        let run = AnalysisRun {
            id: uuid::Uuid::new_v4().to_string(),
            snapshot_id: snapshot_id.to_string(),
            frameworks: frameworks.to_vec(),
            depth,
            phase: None,
            phase_status: PhaseStatus::Pending,
            progress: 0,
            metrics: RunMetrics::default(),
            error_log: Vec::new(),
            phase_history: Vec::new(),
            created_by: user_id.to_string(),
            heartbeat_at: Some(started_at),
            started_at,
            completed_at: None,
        };

        tx.execute(
            "INSERT INTO analysis_runs (id, snapshot_id, frameworks, depth, phase_status, progress, metrics, created_by, heartbeat_at, started_at) VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                run.id,
                run.snapshot_id,
                serde_json::to_string(&run.frameworks)?,
                run.depth.as_str(),
                serde_json::to_string(&run.metrics)?,
                run.created_by,
                timestamp(started_at),
            ],
        ).map_err(|e| {
            if is_constraint_violation(&e) {
                AttestorError::Conflict(format!("Snapshot {} already has an analysis in progress", snapshot_id))
            } else {
                AttestorError::Database(format!("Failed to create run: {}", e))
            }
        })?;

        tx.execute(
            "UPDATE snapshots SET status = 'analyzing', current_phase = ?2, analysis_started_at = ?3, analysis_completed_at = NULL, error_message = NULL WHERE id = ?1",
            rusqlite::params![snapshot_id, first_phase, timestamp(started_at)],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;

        tx.commit()
            .map_err(|e| AttestorError::Database(format!("Failed to commit run creation: {}", e)))?;
        Ok(run)
    }

    /// Mark `phase` as running. Fails with `Conflict` once the run has been
    /// finalized, e.g. by the stale-run sweeper.
    pub fn begin_phase(
        &self,
        run_id: &str,
        snapshot_id: &str,
        phase: &str,
        progress: u8,
    ) -> Result<(), AttestorError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE analysis_runs SET phase = ?2, phase_status = 'running', progress = ?3, heartbeat_at = ?4 WHERE id = ?1 AND completed_at IS NULL",
            rusqlite::params![run_id, phase, progress as i64, now()],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Err(AttestorError::Conflict(format!("Run {} is no longer active", run_id)));
        }
        conn.execute(
            "UPDATE snapshots SET current_phase = ?2 WHERE id = ?1",
            rusqlite::params![snapshot_id, phase],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        record_transition(&conn, run_id, phase, PhaseStatus::Running)
    }

    pub fn complete_phase(&self, run_id: &str, phase: &str) -> Result<(), AttestorError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE analysis_runs SET phase_status = 'completed', heartbeat_at = ?2 WHERE id = ?1 AND completed_at IS NULL",
            rusqlite::params![run_id, now()],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Err(AttestorError::Conflict(format!("Run {} is no longer active", run_id)));
        }
        record_transition(&conn, run_id, phase, PhaseStatus::Completed)
    }

    /// Append `{phase, error, timestamp}` to the error log and mark the phase.
    /// A run that was already finalized is left untouched.
    pub fn record_phase_failure(
        &self,
        run_id: &str,
        phase: &str,
        status: PhaseStatus,
        error: &str,
    ) -> Result<(), AttestorError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE analysis_runs SET phase = COALESCE(phase, ?3), phase_status = ?2 WHERE id = ?1 AND completed_at IS NULL",
            rusqlite::params![run_id, status.as_str(), phase],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Ok(());
        }
        let entry = PhaseErrorEntry {
            phase: phase.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        };
        append_json_entry(&conn, run_id, "error_log", &entry)?;
        record_transition(&conn, run_id, phase, status)
    }

    pub fn complete_run(&self, run_id: &str, snapshot_id: &str, metrics: &RunMetrics) -> Result<(), AttestorError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()
            .map_err(|e| AttestorError::Database(format!("Failed to begin transaction: {}", e)))?;
        let at = now();
        let updated = tx.execute(
            "UPDATE analysis_runs SET phase_status = 'completed', progress = 100, metrics = ?2, completed_at = ?3, heartbeat_at = ?3 WHERE id = ?1 AND completed_at IS NULL",
            rusqlite::params![run_id, serde_json::to_string(metrics)?, at],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Err(AttestorError::Conflict(format!("Run {} is no longer active", run_id)));
        }
        tx.execute(
            "UPDATE snapshots SET status = 'completed', analysis_completed_at = ?2 WHERE id = ?1",
            rusqlite::params![snapshot_id, at],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        tx.commit()
            .map_err(|e| AttestorError::Database(format!("Failed to commit completion: {}", e)))?;
        Ok(())
    }

    /// Terminal failure: run gets `status` (failed or timed_out), snapshot gets
    /// `failed` with the same error message. Returns `false` when the run had
    /// already been finalized and nothing changed.
    pub fn fail_run(
        &self,
        run_id: &str,
        snapshot_id: &str,
        status: PhaseStatus,
        error: &str,
        metrics: &RunMetrics,
    ) -> Result<bool, AttestorError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()
            .map_err(|e| AttestorError::Database(format!("Failed to begin transaction: {}", e)))?;
        let at = now();
        let updated = tx.execute(
            "UPDATE analysis_runs SET phase_status = ?2, metrics = ?3, completed_at = ?4 WHERE id = ?1 AND completed_at IS NULL",
            rusqlite::params![run_id, status.as_str(), serde_json::to_string(metrics)?, at],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Ok(false);
        }
        tx.execute(
            "UPDATE snapshots SET status = 'failed', error_message = ?2, analysis_completed_at = ?3 WHERE id = ?1",
            rusqlite::params![snapshot_id, error, at],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        tx.commit()
            .map_err(|e| AttestorError::Database(format!("Failed to commit failure: {}", e)))?;
        Ok(true)
    }

    pub fn touch_heartbeat(&self, run_id: &str) -> Result<(), AttestorError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE analysis_runs SET heartbeat_at = ?2 WHERE id = ?1 AND completed_at IS NULL",
            rusqlite::params![run_id, now()],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        Ok(())
    }

    /// Run joined with its snapshot, scoped to the owning organization.
    pub fn get_run(&self, run_id: &str, organization_id: &str) -> Result<Option<AnalysisStatus>, AttestorError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {}, s.status, s.error_message FROM analysis_runs r JOIN snapshots s ON s.id = r.snapshot_id WHERE r.id = ?1 AND s.organization_id = ?2",
            RUN_COLUMNS
        );
        let result = conn.query_row(&sql, rusqlite::params![run_id, organization_id], |row| {
            Ok(AnalysisStatus {
                run: run_from_row(row)?,
                snapshot_status: parse_column(14, row.get(14)?)?,
                error_message: row.get(15)?,
            })
        });
        match result {
            Ok(status) => Ok(Some(status)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AttestorError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn list_runs(&self, snapshot_id: &str, organization_id: &str) -> Result<Vec<AnalysisRun>, AttestorError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM analysis_runs r JOIN snapshots s ON s.id = r.snapshot_id WHERE r.snapshot_id = ?1 AND s.organization_id = ?2 ORDER BY r.started_at DESC",
            RUN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)
            .map_err(|e| AttestorError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt.query_map(rusqlite::params![snapshot_id, organization_id], run_from_row)
            .map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row.map_err(|e| AttestorError::Database(format!("Row error: {}", e)))?);
        }
        Ok(runs)
    }

    /// Active runs whose heartbeat is older than `cutoff`.
    pub fn find_stale_runs(&self, cutoff: DateTime<Utc>) -> Result<Vec<StaleRun>, AttestorError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT r.id, r.snapshot_id, s.organization_id FROM analysis_runs r JOIN snapshots s ON s.id = r.snapshot_id WHERE r.completed_at IS NULL AND COALESCE(r.heartbeat_at, r.started_at) < ?1 ORDER BY r.started_at"
        ).map_err(|e| AttestorError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt.query_map(rusqlite::params![timestamp(cutoff)], |row| {
            Ok(StaleRun {
                run_id: row.get(0)?,
                snapshot_id: row.get(1)?,
                organization_id: row.get(2)?,
            })
        }).map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let mut stale = Vec::new();
        for row in rows {
            stale.push(row.map_err(|e| AttestorError::Database(format!("Row error: {}", e)))?);
        }
        Ok(stale)
    }
}
