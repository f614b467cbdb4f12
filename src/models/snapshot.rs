use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an ingested repository snapshot.
///
/// ```text
/// Uploaded ──► Extracted ──► Indexed ──► Analyzing ──► Completed
///                               ▲            │
///                               │            └──────► Failed
///                               └── (external recovery) ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Uploaded,
    Extracted,
    Indexed,
    Analyzing,
    Completed,
    Failed,
}

impl SnapshotStatus {
    pub fn valid_transitions(&self) -> &[SnapshotStatus] {
        match self {
            Self::Uploaded => &[Self::Extracted, Self::Failed],
            Self::Extracted => &[Self::Indexed, Self::Failed],
            Self::Indexed => &[Self::Analyzing],
            Self::Analyzing => &[Self::Completed, Self::Failed],
            // Re-indexing is owned by the ingestion side.
            Self::Completed | Self::Failed => &[Self::Indexed],
        }
    }

    pub fn can_transition_to(&self, target: SnapshotStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Terminal from the analysis pipeline's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Extracted => "extracted",
            Self::Indexed => "indexed",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SnapshotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "extracted" => Ok(Self::Extracted),
            "indexed" => Ok(Self::Indexed),
            "analyzing" => Ok(Self::Analyzing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown snapshot status '{}'", other)),
        }
    }
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted, analyzable copy of a source repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub organization_id: String,
    pub extracted_path: String,
    pub status: SnapshotStatus,
    pub current_phase: Option<String>,
    pub analysis_started_at: Option<DateTime<Utc>>,
    pub analysis_completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
