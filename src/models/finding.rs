use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::framework::Framework;

/// Verdict for one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Pass,
    Partial,
    Fail,
    NotObserved,
    NeedsHuman,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Partial => "partial",
            Self::Fail => "fail",
            Self::NotObserved => "not_observed",
            Self::NeedsHuman => "needs_human",
        }
    }

    /// Findings in these states spawn a remediation task.
    pub fn needs_remediation(&self) -> bool {
        matches!(self, Self::Fail | Self::Partial)
    }
}

impl std::str::FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Self::Pass),
            "partial" => Ok(Self::Partial),
            "fail" => Ok(Self::Fail),
            "not_observed" => Ok(Self::NotObserved),
            "needs_human" => Ok(Self::NeedsHuman),
            other => Err(format!("unknown finding status '{}'", other)),
        }
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How certain the automated mapping is in a finding's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown confidence level '{}'", other)),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's correction of an automated verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanOverride {
    /// The automated verdict before any human correction.
    pub original_status: FindingStatus,
    pub new_status: FindingStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Mapper output for one control; the input to finding creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFinding {
    pub control_id: String,
    pub framework: Framework,
    pub status: FindingStatus,
    pub confidence: Confidence,
    pub signal_type: String,
    pub summary: String,
    pub detail: String,
    pub evidence: Vec<String>,
    pub recommendation: String,
}

/// Persisted verdict for one control of one framework on one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryFinding {
    pub id: String,
    pub snapshot_id: String,
    pub control_id: String,
    pub framework: Framework,
    pub status: FindingStatus,
    pub confidence: Confidence,
    pub signal_type: String,
    pub summary: String,
    pub detail: String,
    pub evidence: Vec<String>,
    pub recommendation: String,
    pub human_override: Option<HumanOverride>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw query filters. Values that do not parse are ignored, not rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingFilters {
    pub framework: Option<String>,
    pub status: Option<String>,
    pub confidence: Option<String>,
    pub signal_type: Option<String>,
    pub control_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingPage {
    pub findings: Vec<RepositoryFinding>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_framework: BTreeMap<String, u64>,
    pub by_confidence: BTreeMap<String, u64>,
    /// Findings that are `fail` with `high` confidence.
    pub critical_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub status: Option<FindingStatus>,
    pub human_override: Option<HumanOverride>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_statuses() {
        assert!(FindingStatus::Fail.needs_remediation());
        assert!(FindingStatus::Partial.needs_remediation());
        assert!(!FindingStatus::Pass.needs_remediation());
        assert!(!FindingStatus::NotObserved.needs_remediation());
        assert!(!FindingStatus::NeedsHuman.needs_remediation());
    }

    #[test]
    fn test_status_roundtrip_str() {
        for s in ["pass", "partial", "fail", "not_observed", "needs_human"] {
            assert_eq!(s.parse::<FindingStatus>().unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_review_request_camel_case() {
        let req: ReviewRequest = serde_json::from_str(
            r#"{"humanOverride":{"originalStatus":"fail","newStatus":"pass","reason":"compensating control"}}"#,
        )
        .unwrap();
        let ov = req.human_override.unwrap();
        assert_eq!(ov.new_status, FindingStatus::Pass);
        assert!(ov.evidence.is_none());
        assert!(req.status.is_none());
    }
}
