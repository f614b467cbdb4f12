use chrono::Utc;

use crate::models::{FindingStatus, RepositoryFinding, RepositoryTask, TaskCategory, TaskPriority, TaskStatus};

/// Remediation task for a `fail` or `partial` finding; `None` for anything else.
pub fn derive_task(finding: &RepositoryFinding) -> Option<RepositoryTask> {
    let priority = TaskPriority::derive(finding.status, finding.confidence)?;
    let category = match finding.status {
        FindingStatus::Fail => TaskCategory::CodeChange,
        _ => TaskCategory::MissingEvidence,
    };

    let mut description = format!(
        "Control {} ({}) was assessed as {} with {} confidence.\n\n{}\n\nRecommendation: {}",
        finding.control_id,
        finding.framework.display_name(),
        finding.status,
        finding.confidence,
        finding.summary,
        finding.recommendation,
    );
    if !finding.evidence.is_empty() {
        description.push_str("\n\nEvidence:");
        for item in &finding.evidence {
            description.push_str("\n- ");
            description.push_str(item);
        }
    }

    Some(RepositoryTask {
        id: uuid::Uuid::new_v4().to_string(),
        snapshot_id: finding.snapshot_id.clone(),
        finding_id: finding.id.clone(),
        title: format!("Remediate {} ({})", finding.control_id, finding.framework.display_name()),
        description,
        category,
        priority,
        status: TaskStatus::Open,
        assigned_role: category.assigned_role().to_string(),
        created_at: Utc::now(),
    })
}
