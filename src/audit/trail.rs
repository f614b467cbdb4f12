use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
    AnalysisCancelled,
    AnalysisSwept,
    FindingsCreated,
    FindingReviewed,
    FindingsDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalysisStarted => "analysis.started",
            Self::AnalysisCompleted => "analysis.completed",
            Self::AnalysisFailed => "analysis.failed",
            Self::AnalysisCancelled => "analysis.cancelled",
            Self::AnalysisSwept => "analysis.swept",
            Self::FindingsCreated => "findings.created",
            Self::FindingReviewed => "finding.reviewed",
            Self::FindingsDeleted => "findings.deleted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub user_id: Option<String>,
    pub organization_id: String,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity_type: &'static str,
        entity_id: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id: entity_id.into(),
            user_id: None,
            organization_id: organization_id.into(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// An audit entry as read back from storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: Option<String>,
    pub organization_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Best-effort audit sink. A failed write is logged and swallowed so that
/// auditing never changes the outcome of the operation being audited.
#[derive(Clone)]
pub struct AuditTrail {
    db: Database,
}

impl AuditTrail {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.db.insert_audit_entry(&entry) {
            tracing::warn!(
                action = entry.action.as_str(),
                entity_id = %entry.entity_id,
                error = %e,
                "Failed to write audit entry"
            );
        }
    }
}
