use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::finding::{Confidence, FindingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    CodeChange,
    MissingEvidence,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeChange => "code_change",
            Self::MissingEvidence => "missing_evidence",
        }
    }

    pub fn assigned_role(&self) -> &'static str {
        match self {
            Self::CodeChange => "engineering",
            Self::MissingEvidence => "compliance",
        }
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_change" => Ok(Self::CodeChange),
            "missing_evidence" => Ok(Self::MissingEvidence),
            other => Err(format!("unknown task category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
}

impl TaskPriority {
    /// `fail`+`high` is critical, any other `fail` is high, `partial` is medium.
    pub fn derive(status: FindingStatus, confidence: Confidence) -> Option<Self> {
        match (status, confidence) {
            (FindingStatus::Fail, Confidence::High) => Some(Self::Critical),
            (FindingStatus::Fail, _) => Some(Self::High),
            (FindingStatus::Partial, _) => Some(Self::Medium),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            other => Err(format!("unknown task priority '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Resolved,
    Dismissed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

/// Remediation work item spawned from a `fail` or `partial` finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryTask {
    pub id: String,
    pub snapshot_id: String,
    pub finding_id: String,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_role: String,
    pub created_at: DateTime<Utc>,
}
