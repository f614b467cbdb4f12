use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::framework::Framework;
use super::snapshot::SnapshotStatus;

/// How much of the snapshot the detectors read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    /// File tree survey only; no file contents are scanned.
    StructureOnly,
    /// Scan files whose path or type marks them as security relevant.
    #[default]
    SecurityRelevant,
    /// Scan every text file.
    Full,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructureOnly => "structure_only",
            Self::SecurityRelevant => "security_relevant",
            Self::Full => "full",
        }
    }

    pub fn reads_contents(&self) -> bool {
        !matches!(self, Self::StructureOnly)
    }
}

impl std::str::FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "structure_only" => Ok(Self::StructureOnly),
            "security_relevant" => Ok(Self::SecurityRelevant),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown analysis depth '{}'", other)),
        }
    }
}

impl std::fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// A run in one of these states holds the snapshot's analysis slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            other => Err(format!("unknown phase status '{}'", other)),
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub files_analyzed: u64,
    pub files_skipped: u64,
    pub signals_detected: u64,
    pub findings_generated: u64,
    pub tasks_created: u64,
    pub ai_calls_made: u64,
    pub tokens_used: u64,
    pub cost_estimate_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseErrorEntry {
    pub phase: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// One phase status change, appended in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub phase: String,
    pub status: PhaseStatus,
    pub at: DateTime<Utc>,
}

/// One attempt to analyze a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub id: String,
    pub snapshot_id: String,
    pub frameworks: Vec<Framework>,
    pub depth: AnalysisDepth,
    pub phase: Option<String>,
    pub phase_status: PhaseStatus,
    pub progress: u8,
    pub metrics: RunMetrics,
    pub error_log: Vec<PhaseErrorEntry>,
    pub phase_history: Vec<PhaseTransition>,
    pub created_by: String,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of a status query: the run plus its snapshot's lifecycle view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    #[serde(flatten)]
    pub run: AnalysisRun,
    pub snapshot_status: SnapshotStatus,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_parse() {
        assert_eq!("structure_only".parse::<AnalysisDepth>().unwrap(), AnalysisDepth::StructureOnly);
        assert_eq!("security-relevant".parse::<AnalysisDepth>().unwrap(), AnalysisDepth::SecurityRelevant);
        assert_eq!("FULL".parse::<AnalysisDepth>().unwrap(), AnalysisDepth::Full);
        assert!("deep".parse::<AnalysisDepth>().is_err());
    }

    #[test]
    fn test_depth_default() {
        assert_eq!(AnalysisDepth::default(), AnalysisDepth::SecurityRelevant);
        assert!(!AnalysisDepth::StructureOnly.reads_contents());
    }

    #[test]
    fn test_phase_status_activity() {
        assert!(PhaseStatus::Pending.is_active());
        assert!(PhaseStatus::Running.is_active());
        assert!(!PhaseStatus::TimedOut.is_active());
        assert!(PhaseStatus::TimedOut.is_terminal());
    }

    #[test]
    fn test_metrics_serialize_camel_case() {
        let json = serde_json::to_value(RunMetrics::default()).unwrap();
        assert!(json.get("filesAnalyzed").is_some());
        assert!(json.get("costEstimateUsd").is_some());
    }
}
