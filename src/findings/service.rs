use chrono::Utc;
use tracing::{info, warn};

use super::tasks::derive_task;
use crate::audit::{AuditAction, AuditEntry, AuditTrail};
use crate::db::{Database, FindingQuery};
use crate::errors::AttestorError;
use crate::models::{
    ControlFinding, FindingFilters, FindingPage, FindingSummary, HumanOverride, RepositoryFinding, RepositoryTask,
    ReviewRequest,
};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Result of persisting one batch of mapped findings.
#[derive(Debug, Clone)]
pub struct CreatedFindings {
    pub findings: Vec<RepositoryFinding>,
    pub tasks_created: u64,
}

/// Parse raw filters into typed ones. Values that do not parse are dropped.
fn to_query(filters: &FindingFilters) -> FindingQuery {
    FindingQuery {
        framework: filters.framework.as_deref().and_then(|v| v.parse().ok()),
        status: filters.status.as_deref().and_then(|v| v.parse().ok()),
        confidence: filters.confidence.as_deref().and_then(|v| v.parse().ok()),
        signal_type: filters.signal_type.clone().filter(|v| !v.is_empty()),
        control_id: filters.control_id.clone().filter(|v| !v.is_empty()),
    }
}

#[derive(Clone)]
pub struct FindingsService {
    db: Database,
    audit: AuditTrail,
}

impl FindingsService {
    pub fn new(db: Database) -> Self {
        let audit = AuditTrail::new(db.clone());
        Self { db, audit }
    }

    fn ensure_snapshot(&self, snapshot_id: &str, organization_id: &str) -> Result<(), AttestorError> {
        match self.db.get_snapshot(snapshot_id, organization_id)? {
            Some(_) => Ok(()),
            None => Err(AttestorError::not_found("Snapshot", snapshot_id)),
        }
    }

    /// Persist a batch of findings, then spawn remediation tasks for every
    /// `fail`/`partial` finding. Task creation is best-effort: a failed task
    /// is logged and the batch still succeeds.
    pub fn create_findings(
        &self,
        snapshot_id: &str,
        organization_id: &str,
        control_findings: &[ControlFinding],
        user_id: &str,
    ) -> Result<CreatedFindings, AttestorError> {
        self.ensure_snapshot(snapshot_id, organization_id)?;
        if control_findings.is_empty() {
            return Ok(CreatedFindings { findings: Vec::new(), tasks_created: 0 });
        }

        let findings = self.db.insert_findings(snapshot_id, control_findings)?;

        let mut tasks_created = 0u64;
        for finding in &findings {
            let Some(task) = derive_task(finding) else {
                continue;
            };
            match self.db.insert_task(&task) {
                Ok(()) => tasks_created += 1,
                Err(e) => warn!(
                    finding_id = %finding.id,
                    control_id = %finding.control_id,
                    error = %e,
                    "Failed to create remediation task"
                ),
            }
        }

        let frameworks: Vec<&str> = {
            let mut seen: Vec<&str> = Vec::new();
            for f in &findings {
                if !seen.contains(&f.framework.as_str()) {
                    seen.push(f.framework.as_str());
                }
            }
            seen
        };
        self.audit.record(
            AuditEntry::new(AuditAction::FindingsCreated, "snapshot", snapshot_id, organization_id)
                .by(user_id)
                .with_metadata(serde_json::json!({
                    "count": findings.len(),
                    "tasksCreated": tasks_created,
                    "frameworks": frameworks,
                })),
        );

        info!(
            snapshot_id = %snapshot_id,
            findings = findings.len(),
            tasks = tasks_created,
            "Findings stored"
        );
        Ok(CreatedFindings { findings, tasks_created })
    }

    pub fn get_findings(
        &self,
        snapshot_id: &str,
        organization_id: &str,
        filters: &FindingFilters,
    ) -> Result<FindingPage, AttestorError> {
        self.ensure_snapshot(snapshot_id, organization_id)?;
        let page = filters.page.unwrap_or(1).max(1);
        let limit = filters.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let (findings, total) =
            self.db
                .query_findings(snapshot_id, organization_id, &to_query(filters), page, limit)?;
        Ok(FindingPage { findings, total, page, limit })
    }

    pub fn get_finding_by_id(&self, id: &str, organization_id: &str) -> Result<RepositoryFinding, AttestorError> {
        self.db
            .get_finding(id, organization_id)?
            .ok_or_else(|| AttestorError::not_found("Finding", id))
    }

    /// Apply a reviewer's decision. The stored override always keeps the
    /// automated verdict as `originalStatus`, even across repeated overrides,
    /// and its `newStatus` always matches the finding's status.
    pub fn review_finding(
        &self,
        id: &str,
        organization_id: &str,
        user_id: &str,
        request: ReviewRequest,
    ) -> Result<RepositoryFinding, AttestorError> {
        let current = self.get_finding_by_id(id, organization_id)?;

        let (status, human_override) = match (request.human_override, request.status) {
            (Some(requested), status) => {
                if requested.reason.trim().is_empty() {
                    return Err(AttestorError::Validation("Override reason must not be empty".to_string()));
                }
                if let Some(status) = status {
                    if status != requested.new_status {
                        return Err(AttestorError::Validation(format!(
                            "status '{}' contradicts override newStatus '{}'",
                            status, requested.new_status
                        )));
                    }
                }
                let original_status = current
                    .human_override
                    .as_ref()
                    .map(|o| o.original_status)
                    .unwrap_or(current.status);
                let merged = HumanOverride {
                    original_status,
                    new_status: requested.new_status,
                    reason: requested.reason,
                    evidence: requested.evidence,
                };
                (merged.new_status, Some(merged))
            }
            // An existing override must keep describing the stored status.
            (None, Some(status)) => match current.human_override.clone() {
                Some(existing) => (status, Some(HumanOverride { new_status: status, ..existing })),
                None => (status, None),
            },
            (None, None) => {
                return Err(AttestorError::Validation(
                    "Review requires a status or a humanOverride".to_string(),
                ))
            }
        };

        self.db
            .update_finding_review(id, status, human_override.as_ref(), user_id, Utc::now())?;

        self.audit.record(
            AuditEntry::new(AuditAction::FindingReviewed, "finding", id, organization_id)
                .by(user_id)
                .with_metadata(serde_json::json!({
                    "before": current.status.as_str(),
                    "after": status.as_str(),
                    "overridden": human_override.is_some(),
                })),
        );
        info!(finding_id = %id, before = %current.status, after = %status, "Finding reviewed");

        self.get_finding_by_id(id, organization_id)
    }

    pub fn get_findings_summary(
        &self,
        snapshot_id: &str,
        organization_id: &str,
    ) -> Result<FindingSummary, AttestorError> {
        self.ensure_snapshot(snapshot_id, organization_id)?;
        self.db.summarize_findings(snapshot_id, organization_id)
    }

    /// Remove every finding of a snapshot along with their tasks.
    pub fn delete_snapshot_findings(
        &self,
        snapshot_id: &str,
        organization_id: &str,
        user_id: &str,
    ) -> Result<usize, AttestorError> {
        self.ensure_snapshot(snapshot_id, organization_id)?;
        let deleted = self.db.delete_findings(snapshot_id, organization_id)?;
        self.audit.record(
            AuditEntry::new(AuditAction::FindingsDeleted, "snapshot", snapshot_id, organization_id)
                .by(user_id)
                .with_metadata(serde_json::json!({ "count": deleted })),
        );
        info!(snapshot_id = %snapshot_id, deleted, "Snapshot findings deleted");
        Ok(deleted)
    }

    pub fn list_tasks(&self, snapshot_id: &str, organization_id: &str) -> Result<Vec<RepositoryTask>, AttestorError> {
        self.ensure_snapshot(snapshot_id, organization_id)?;
        self.db.list_tasks(snapshot_id, organization_id)
    }
}
