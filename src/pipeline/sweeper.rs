use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orchestrator::AnalysisOrchestrator;

/// Periodically fail runs whose heartbeat went stale, until `shutdown` fires.
pub fn spawn_sweeper(
    orchestrator: AnalysisOrchestrator,
    interval: Duration,
    threshold: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = interval.as_secs(),
            threshold_secs = threshold.as_secs(),
            "Stale-run sweeper started"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match orchestrator.sweep_stale_runs(threshold) {
                        Ok(swept) if swept.is_empty() => debug!("No stale runs"),
                        Ok(swept) => info!(count = swept.len(), "Swept stale runs"),
                        Err(e) => warn!(error = %e, "Stale-run sweep failed"),
                    }
                }
            }
        }
        info!("Stale-run sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{AnalysisDepth, Framework, PhaseStatus, SnapshotStatus};
    use crate::pipeline::PipelineSettings;

    #[tokio::test]
    async fn test_sweeper_marks_orphan_failed_and_stops() {
        let db = Database::in_memory().unwrap();
        let snapshot = db.create_snapshot("org-1", "/tmp/none", SnapshotStatus::Indexed).unwrap();
        let run = db
            .create_run_for_snapshot(&snapshot.id, "org-1", &[Framework::Gdpr], AnalysisDepth::Full, "u-1", "Overview")
            .unwrap();
        let orchestrator = AnalysisOrchestrator::new(db.clone(), PipelineSettings::default());
        let shutdown = CancellationToken::new();

        let handle = spawn_sweeper(
            orchestrator.clone(),
            Duration::from_millis(20),
            Duration::from_millis(5),
            shutdown.clone(),
        );

        let mut status = orchestrator.get_analysis_status(&run.id, "org-1").unwrap();
        for _ in 0..100 {
            if status.run.phase_status == PhaseStatus::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = orchestrator.get_analysis_status(&run.id, "org-1").unwrap();
        }
        assert_eq!(status.run.phase_status, PhaseStatus::Failed);
        assert_eq!(status.snapshot_status, SnapshotStatus::Failed);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
