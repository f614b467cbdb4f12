use chrono::{DateTime, Utc};

use super::connection::{parse_column, parse_json, parse_opt_timestamp, parse_timestamp, timestamp};
use super::Database;
use crate::errors::AttestorError;
use crate::models::{
    Confidence, ControlFinding, FindingStatus, FindingSummary, Framework, HumanOverride, RepositoryFinding,
};

const FINDING_COLUMNS: &str = "f.id, f.snapshot_id, f.control_id, f.framework, f.status, f.confidence, f.signal_type, f.summary, f.detail, f.evidence, f.recommendation, f.human_override, f.reviewed_by, f.reviewed_at, f.created_at, f.updated_at";

fn finding_from_row(row: &rusqlite::Row) -> rusqlite::Result<RepositoryFinding> {
    let human_override: Option<String> = row.get(11)?;
    Ok(RepositoryFinding {
        id: row.get(0)?,
        snapshot_id: row.get(1)?,
        control_id: row.get(2)?,
        framework: parse_column(3, row.get(3)?)?,
        status: parse_column(4, row.get(4)?)?,
        confidence: parse_column(5, row.get(5)?)?,
        signal_type: row.get(6)?,
        summary: row.get(7)?,
        detail: row.get(8)?,
        evidence: parse_json(9, row.get(9)?)?,
        recommendation: row.get(10)?,
        human_override: human_override.map(|v| parse_json(11, v)).transpose()?,
        reviewed_by: row.get(12)?,
        reviewed_at: parse_opt_timestamp(13, row.get(13)?)?,
        created_at: parse_timestamp(14, row.get(14)?)?,
        updated_at: parse_timestamp(15, row.get(15)?)?,
    })
}

/// Typed finding filters. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct FindingQuery {
    pub framework: Option<Framework>,
    pub status: Option<FindingStatus>,
    pub confidence: Option<Confidence>,
    pub signal_type: Option<String>,
    pub control_id: Option<String>,
}

impl FindingQuery {
    fn where_clause(&self, snapshot_id: &str, organization_id: &str) -> (String, Vec<String>) {
        let mut clauses = vec![
            "f.snapshot_id = ?1".to_string(),
            "s.organization_id = ?2".to_string(),
        ];
        let mut params = vec![snapshot_id.to_string(), organization_id.to_string()];

        let mut push = |column: &str, value: String| {
            params.push(value);
            clauses.push(format!("{} = ?{}", column, params.len()));
        };
        if let Some(framework) = self.framework {
            push("f.framework", framework.as_str().to_string());
        }
        if let Some(status) = self.status {
            push("f.status", status.as_str().to_string());
        }
        if let Some(confidence) = self.confidence {
            push("f.confidence", confidence.as_str().to_string());
        }
        if let Some(signal_type) = &self.signal_type {
            push("f.signal_type", signal_type.clone());
        }
        if let Some(control_id) = &self.control_id {
            push("f.control_id", control_id.clone());
        }
        (clauses.join(" AND "), params)
    }
}

impl Database {
    /// Insert a batch of mapped findings in one transaction. Either all rows
    /// land or none do.
    pub fn insert_findings(
        &self,
        snapshot_id: &str,
        findings: &[ControlFinding],
    ) -> Result<Vec<RepositoryFinding>, AttestorError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()
            .map_err(|e| AttestorError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut stored = Vec::with_capacity(findings.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO repository_findings (id, snapshot_id, control_id, framework, status, confidence, signal_type, summary, detail, evidence, recommendation, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)"
            ).map_err(|e| AttestorError::Database(format!("Failed to prepare insert: {}", e)))?;

            for finding in findings {
                let created_at = Utc::now();
                let id = uuid::Uuid::new_v4().to_string();
                stmt.execute(rusqlite::params![
                    id,
                    snapshot_id,
                    finding.control_id,
                    finding.framework.as_str(),
                    finding.status.as_str(),
                    finding.confidence.as_str(),
                    finding.signal_type,
                    finding.summary,
                    finding.detail,
                    serde_json::to_string(&finding.evidence)?,
                    finding.recommendation,
                    timestamp(created_at),
                ]).map_err(|e| AttestorError::Database(format!("Failed to insert finding {}: {}", finding.control_id, e)))?;

                stored.push(RepositoryFinding {
                    id,
                    snapshot_id: snapshot_id.to_string(),
                    control_id: finding.control_id.clone(),
                    framework: finding.framework,
                    status: finding.status,
                    confidence: finding.confidence,
                    signal_type: finding.signal_type.clone(),
                    summary: finding.summary.clone(),
                    detail: finding.detail.clone(),
                    evidence: finding.evidence.clone(),
                    recommendation: finding.recommendation.clone(),
                    human_override: None,
                    reviewed_by: None,
                    reviewed_at: None,
                    created_at,
                    updated_at: created_at,
                });
            }
        }

        tx.commit()
            .map_err(|e| AttestorError::Database(format!("Failed to commit findings: {}", e)))?;
        Ok(stored)
    }

    /// One page of findings, newest first, plus the total matching count.
    pub fn query_findings(
        &self,
        snapshot_id: &str,
        organization_id: &str,
        query: &FindingQuery,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RepositoryFinding>, u64), AttestorError> {
        let (where_sql, params) = query.where_clause(snapshot_id, organization_id);
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM repository_findings f JOIN snapshots s ON s.id = f.snapshot_id WHERE {}",
                where_sql
            ),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        ).map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let offset = (page.max(1) as i64 - 1) * limit as i64;
        let sql = format!(
            "SELECT {} FROM repository_findings f JOIN snapshots s ON s.id = f.snapshot_id WHERE {} ORDER BY f.created_at DESC, f.rowid DESC LIMIT {} OFFSET {}",
            FINDING_COLUMNS, where_sql, limit, offset
        );
        let mut stmt = conn.prepare(&sql)
            .map_err(|e| AttestorError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), finding_from_row)
            .map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let mut findings = Vec::new();
        for row in rows {
            findings.push(row.map_err(|e| AttestorError::Database(format!("Row error: {}", e)))?);
        }
        Ok((findings, total.max(0) as u64))
    }

    pub fn get_finding(&self, id: &str, organization_id: &str) -> Result<Option<RepositoryFinding>, AttestorError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM repository_findings f JOIN snapshots s ON s.id = f.snapshot_id WHERE f.id = ?1 AND s.organization_id = ?2",
            FINDING_COLUMNS
        );
        let result = conn.query_row(&sql, rusqlite::params![id, organization_id], finding_from_row);
        match result {
            Ok(f) => Ok(Some(f)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AttestorError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn update_finding_review(
        &self,
        id: &str,
        status: FindingStatus,
        human_override: Option<&HumanOverride>,
        reviewed_by: &str,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AttestorError> {
        let override_json = human_override.map(serde_json::to_string).transpose()?;
        let at = timestamp(reviewed_at);
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE repository_findings SET status = ?2, human_override = COALESCE(?3, human_override), reviewed_by = ?4, reviewed_at = ?5, updated_at = ?5 WHERE id = ?1",
            rusqlite::params![id, status.as_str(), override_json, reviewed_by, at],
        ).map_err(|e| AttestorError::Database(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Err(AttestorError::not_found("Finding", id));
        }
        Ok(())
    }

    pub fn summarize_findings(&self, snapshot_id: &str, organization_id: &str) -> Result<FindingSummary, AttestorError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT f.status, f.framework, f.confidence, COUNT(*) FROM repository_findings f JOIN snapshots s ON s.id = f.snapshot_id WHERE f.snapshot_id = ?1 AND s.organization_id = ?2 GROUP BY f.status, f.framework, f.confidence"
        ).map_err(|e| AttestorError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt.query_map(rusqlite::params![snapshot_id, organization_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        }).map_err(|e| AttestorError::Database(format!("Query error: {}", e)))?;

        let mut summary = FindingSummary::default();
        for row in rows {
            let (status, framework, confidence, count) =
                row.map_err(|e| AttestorError::Database(format!("Row error: {}", e)))?;
            let count = count.max(0) as u64;
            summary.total += count;
            if status == FindingStatus::Fail.as_str() && confidence == Confidence::High.as_str() {
                summary.critical_count += count;
            }
            *summary.by_status.entry(status).or_insert(0) += count;
            *summary.by_framework.entry(framework).or_insert(0) += count;
            *summary.by_confidence.entry(confidence).or_insert(0) += count;
        }
        Ok(summary)
    }

    /// Delete every finding of a snapshot; their tasks go with them.
    pub fn delete_findings(&self, snapshot_id: &str, organization_id: &str) -> Result<usize, AttestorError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM repository_findings WHERE snapshot_id = ?1 AND snapshot_id IN (SELECT id FROM snapshots WHERE organization_id = ?2)",
            rusqlite::params![snapshot_id, organization_id],
        ).map_err(|e| AttestorError::Database(format!("Delete failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotStatus;

    fn control(id: &str, framework: Framework, status: FindingStatus, confidence: Confidence) -> ControlFinding {
        ControlFinding {
            control_id: id.to_string(),
            framework,
            status,
            confidence,
            signal_type: "auth".to_string(),
            summary: format!("{} summary", id),
            detail: "detail".to_string(),
            evidence: vec!["src/login.rs:12".to_string()],
            recommendation: "Fix it".to_string(),
        }
    }

    fn setup() -> (Database, String) {
        let db = Database::in_memory().unwrap();
        let snap = db.create_snapshot("org-1", "/tmp/snap", SnapshotStatus::Indexed).unwrap().id;
        (db, snap)
    }

    #[test]
    fn test_db_insert_and_get_finding() {
        let (db, snap) = setup();
        let stored = db.insert_findings(&snap, &[
            control("CC6.1", Framework::Soc2, FindingStatus::Fail, Confidence::High),
        ]).unwrap();
        assert_eq!(stored.len(), 1);

        let fetched = db.get_finding(&stored[0].id, "org-1").unwrap().unwrap();
        assert_eq!(fetched.control_id, "CC6.1");
        assert_eq!(fetched.status, FindingStatus::Fail);
        assert_eq!(fetched.evidence, vec!["src/login.rs:12"]);
        assert!(fetched.human_override.is_none());

        assert!(db.get_finding(&stored[0].id, "org-2").unwrap().is_none());
    }

    #[test]
    fn test_db_insert_findings_unknown_snapshot_rolls_back() {
        let (db, _) = setup();
        let result = db.insert_findings("missing", &[
            control("CC6.1", Framework::Soc2, FindingStatus::Pass, Confidence::High),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_db_query_filters_and_pagination() {
        let (db, snap) = setup();
        db.insert_findings(&snap, &[
            control("A.9.2.1", Framework::Iso27001, FindingStatus::Fail, Confidence::High),
            control("CC6.1", Framework::Soc2, FindingStatus::Pass, Confidence::High),
            control("CC6.6", Framework::Soc2, FindingStatus::Partial, Confidence::Medium),
        ]).unwrap();

        let query = FindingQuery { framework: Some(Framework::Soc2), ..Default::default() };
        let (page, total) = db.query_findings(&snap, "org-1", &query, 1, 50).unwrap();
        assert_eq!(total, 2);
        assert!(page.iter().all(|f| f.framework == Framework::Soc2));

        let (first, total) = db.query_findings(&snap, "org-1", &FindingQuery::default(), 1, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(first.len(), 2);
        // Newest first
        assert_eq!(first[0].control_id, "CC6.6");

        let (second, _) = db.query_findings(&snap, "org-1", &FindingQuery::default(), 2, 2).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].control_id, "A.9.2.1");

        let (other_org, total) = db.query_findings(&snap, "org-2", &FindingQuery::default(), 1, 50).unwrap();
        assert!(other_org.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_db_summary_counts() {
        let (db, snap) = setup();
        db.insert_findings(&snap, &[
            control("a", Framework::Soc2, FindingStatus::Fail, Confidence::High),
            control("b", Framework::Soc2, FindingStatus::Fail, Confidence::Medium),
            control("c", Framework::Hipaa, FindingStatus::Pass, Confidence::High),
        ]).unwrap();

        let summary = db.summarize_findings(&snap, "org-1").unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.critical_count, 1);
        assert_eq!(summary.by_status.get("fail"), Some(&2));
        assert_eq!(summary.by_framework.get("hipaa"), Some(&1));
        assert_eq!(summary.by_confidence.get("high"), Some(&2));
    }

    #[test]
    fn test_db_update_review_missing_finding() {
        let (db, _) = setup();
        let err = db
            .update_finding_review("missing", FindingStatus::Pass, None, "user-1", Utc::now())
            .unwrap_err();
        assert!(matches!(err, AttestorError::NotFound(_)));
    }

    #[test]
    fn test_db_delete_findings_scoped_to_org() {
        let (db, snap) = setup();
        db.insert_findings(&snap, &[
            control("a", Framework::Gdpr, FindingStatus::Fail, Confidence::High),
        ]).unwrap();

        assert_eq!(db.delete_findings(&snap, "org-2").unwrap(), 0);
        assert_eq!(db.delete_findings(&snap, "org-1").unwrap(), 1);
        assert_eq!(db.summarize_findings(&snap, "org-1").unwrap().total, 0);
    }
}
