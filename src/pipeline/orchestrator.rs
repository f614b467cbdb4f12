use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::phase::{phase_progress, PhaseRunner, PHASES};
use super::runner::ScanPhases;
use super::state::{AnalysisContext, PhaseName, PipelineSettings};
use crate::audit::{AuditAction, AuditEntry, AuditTrail};
use crate::db::Database;
use crate::errors::AttestorError;
use crate::findings::FindingsService;
use crate::models::{AnalysisDepth, AnalysisStatus, Framework, PhaseStatus};

const CANCELLED_MESSAGE: &str = "Analysis cancelled";
const HEARTBEAT_LOST_MESSAGE: &str = "Heartbeat lost";

/// Input to `start_analysis`. Frameworks are raw names as received.
#[derive(Debug, Clone)]
pub struct StartAnalysis {
    pub snapshot_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub frameworks: Vec<String>,
    pub depth: AnalysisDepth,
}

#[derive(Debug, Clone)]
pub struct StartedAnalysis {
    pub run_id: String,
    /// Cancelling this stops the run at the next phase or file boundary.
    /// The orchestrator cancels it itself once the run has stopped.
    pub cancel_token: CancellationToken,
}

struct ActiveRun {
    cancel: CancellationToken,
    /// Cancelled once the background task has finished.
    done: CancellationToken,
}

/// Why a run stopped early.
#[derive(Debug)]
struct PhaseFailure {
    phase: PhaseName,
    error: AttestorError,
}

impl PhaseFailure {
    fn status(&self) -> PhaseStatus {
        match self.error {
            AttestorError::Timeout(_) => PhaseStatus::TimedOut,
            _ => PhaseStatus::Failed,
        }
    }

    fn message(&self) -> String {
        self.error.message()
    }
}

/// Parse, validate and deduplicate framework names, keeping request order.
pub fn parse_frameworks(raw: &[String]) -> Result<Vec<Framework>, AttestorError> {
    if raw.is_empty() {
        return Err(AttestorError::Validation("At least one framework is required".into()));
    }
    let mut frameworks = Vec::with_capacity(raw.len());
    for name in raw {
        let framework: Framework = name.parse().map_err(AttestorError::Validation)?;
        if !frameworks.contains(&framework) {
            frameworks.push(framework);
        }
    }
    Ok(frameworks)
}

/// Drives analysis runs: validates and records the start synchronously, then
/// executes the phase sequence on a background task.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    db: Database,
    runner: Arc<dyn PhaseRunner>,
    audit: AuditTrail,
    settings: PipelineSettings,
    active: Arc<DashMap<String, ActiveRun>>,
}

impl AnalysisOrchestrator {
    /// Orchestrator using the pattern detector and built-in control catalogs.
    pub fn new(db: Database, settings: PipelineSettings) -> Self {
        let runner = Arc::new(ScanPhases::standard(FindingsService::new(db.clone())));
        Self::with_runner(db, runner, settings)
    }

    pub fn with_runner(db: Database, runner: Arc<dyn PhaseRunner>, settings: PipelineSettings) -> Self {
        let audit = AuditTrail::new(db.clone());
        Self {
            db,
            runner,
            audit,
            settings,
            active: Arc::new(DashMap::new()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate, create the run and launch it without awaiting the phases.
    /// Must be called from within a tokio runtime.
    pub fn start_analysis(&self, request: StartAnalysis) -> Result<StartedAnalysis, AttestorError> {
        let frameworks = parse_frameworks(&request.frameworks)?;
        let snapshot = self
            .db
            .get_snapshot(&request.snapshot_id, &request.organization_id)?
            .ok_or_else(|| AttestorError::not_found("Snapshot", &request.snapshot_id))?;

        let run = self.db.create_run_for_snapshot(
            &snapshot.id,
            &request.organization_id,
            &frameworks,
            request.depth,
            &request.user_id,
            PHASES[0].display_name,
        )?;

        self.audit.record(
            AuditEntry::new(AuditAction::AnalysisStarted, "analysis_run", &run.id, &request.organization_id)
                .by(&request.user_id)
                .with_metadata(serde_json::json!({
                    "snapshotId": snapshot.id,
                    "frameworks": frameworks,
                    "depth": request.depth,
                })),
        );
        info!(
            run_id = %run.id,
            snapshot_id = %snapshot.id,
            depth = %request.depth,
            frameworks = frameworks.len(),
            "Analysis started"
        );

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        self.active.insert(
            run.id.clone(),
            ActiveRun { cancel: cancel.clone(), done: done.clone() },
        );

        let ctx = AnalysisContext {
            run_id: run.id.clone(),
            snapshot_id: snapshot.id,
            organization_id: request.organization_id,
            user_id: request.user_id,
            root: PathBuf::from(snapshot.extracted_path),
            frameworks,
            scope: self.settings.scope(request.depth),
            overview: None,
            signals: Vec::new(),
            metrics: run.metrics.clone(),
            cancel: cancel.clone(),
        };

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let run_id = ctx.run_id.clone();
            orchestrator.execute(ctx).await;
            orchestrator.active.remove(&run_id);
            done.cancel();
        });

        Ok(StartedAnalysis { run_id: run.id, cancel_token: cancel })
    }

    pub fn get_analysis_status(&self, run_id: &str, organization_id: &str) -> Result<AnalysisStatus, AttestorError> {
        self.db
            .get_run(run_id, organization_id)?
            .ok_or_else(|| AttestorError::not_found("Analysis run", run_id))
    }

    /// Request cancellation of a run executing in this process.
    pub fn cancel_analysis(&self, run_id: &str, organization_id: &str) -> Result<(), AttestorError> {
        let status = self.get_analysis_status(run_id, organization_id)?;
        if status.run.completed_at.is_some() || !status.run.phase_status.is_active() {
            return Err(AttestorError::Conflict(format!(
                "Analysis {} is not in progress (status: {})",
                run_id, status.run.phase_status
            )));
        }
        match self.active.get(run_id) {
            Some(active) => {
                active.cancel.cancel();
                info!(run_id = %run_id, "Analysis cancellation requested");
                Ok(())
            }
            None => Err(AttestorError::Conflict(format!(
                "Analysis {} is not executing in this process",
                run_id
            ))),
        }
    }

    /// Cancel every run executing in this process.
    pub fn cancel_all(&self) {
        for entry in self.active.iter() {
            entry.cancel.cancel();
        }
    }

    pub fn active_runs(&self) -> Vec<String> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Resolves once the background task for `run_id` has finished. Returns
    /// immediately for runs not executing in this process.
    pub async fn wait_for(&self, run_id: &str) {
        let done = self.active.get(run_id).map(|active| active.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    /// Fail every unfinished run whose heartbeat is older than `threshold`.
    /// Returns the ids of the runs that were swept.
    pub fn sweep_stale_runs(&self, threshold: Duration) -> Result<Vec<String>, AttestorError> {
        let threshold = chrono::Duration::from_std(threshold)
            .map_err(|e| AttestorError::Config(format!("Invalid stale-run threshold: {}", e)))?;
        let stale = self.db.find_stale_runs(Utc::now() - threshold)?;

        let mut swept = Vec::new();
        for run in stale {
            let Some(status) = self.db.get_run(&run.run_id, &run.organization_id)? else {
                continue;
            };
            let phase = status
                .run
                .phase
                .clone()
                .unwrap_or_else(|| PHASES[0].display_name.to_string());
            self.db
                .record_phase_failure(&run.run_id, &phase, PhaseStatus::Failed, HEARTBEAT_LOST_MESSAGE)?;
            let applied = self.db.fail_run(
                &run.run_id,
                &run.snapshot_id,
                PhaseStatus::Failed,
                HEARTBEAT_LOST_MESSAGE,
                &status.run.metrics,
            )?;

            // A task still alive here has stalled; stop it after the rows are final.
            if let Some(active) = self.active.get(&run.run_id) {
                active.cancel.cancel();
            }
            if !applied {
                continue;
            }

            warn!(run_id = %run.run_id, snapshot_id = %run.snapshot_id, phase = %phase, "Stale analysis swept");
            self.audit.record(
                AuditEntry::new(AuditAction::AnalysisSwept, "analysis_run", &run.run_id, &run.organization_id)
                    .with_metadata(serde_json::json!({
                        "snapshotId": run.snapshot_id,
                        "phase": phase,
                        "lastHeartbeat": status.run.heartbeat_at,
                    })),
            );
            swept.push(run.run_id);
        }
        Ok(swept)
    }

    async fn execute(&self, mut ctx: AnalysisContext) {
        let stop = CancellationToken::new();
        let heartbeat = self.spawn_heartbeat(ctx.run_id.clone(), stop.clone());

        let outcome = self.run_phases(&mut ctx).await;
        // A timed-out phase future is dropped, but detector walks on blocking
        // threads only stop when they observe the run token.
        ctx.cancel.cancel();

        stop.cancel();
        if let Err(e) = heartbeat.await {
            warn!(run_id = %ctx.run_id, error = %e, "Heartbeat task ended abnormally");
        }

        match outcome {
            Ok(()) => self.complete_analysis(&ctx),
            Err(failure) => self.fail_analysis(&ctx, failure),
        }
    }

    async fn run_phases(&self, ctx: &mut AnalysisContext) -> Result<(), PhaseFailure> {
        for (index, phase) in PHASES.iter().enumerate() {
            self.db
                .begin_phase(&ctx.run_id, &ctx.snapshot_id, phase.display_name, phase_progress(index))
                .map_err(|error| PhaseFailure { phase: phase.name, error })?;
            info!(run_id = %ctx.run_id, phase = %phase.name, index, "Phase started");

            let cancel = ctx.cancel.clone();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AttestorError::Cancelled(CANCELLED_MESSAGE.into())),
                outcome = tokio::time::timeout(self.settings.phase_timeout, self.runner.run_phase(phase.name, ctx)) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => Err(AttestorError::Timeout(format!(
                            "Phase {} exceeded {}s",
                            phase.display_name,
                            self.settings.phase_timeout.as_secs_f64()
                        ))),
                    }
                }
            };

            if let Err(error) = result {
                return Err(PhaseFailure { phase: phase.name, error });
            }
            self.db
                .complete_phase(&ctx.run_id, phase.display_name)
                .map_err(|error| PhaseFailure { phase: phase.name, error })?;
            info!(run_id = %ctx.run_id, phase = %phase.name, "Phase completed");
        }
        Ok(())
    }

    fn complete_analysis(&self, ctx: &AnalysisContext) {
        if let Err(e) = self.db.complete_run(&ctx.run_id, &ctx.snapshot_id, &ctx.metrics) {
            error!(run_id = %ctx.run_id, error = %e, "Failed to record analysis completion");
            return;
        }
        info!(
            run_id = %ctx.run_id,
            snapshot_id = %ctx.snapshot_id,
            files = ctx.metrics.files_analyzed,
            signals = ctx.metrics.signals_detected,
            findings = ctx.metrics.findings_generated,
            tasks = ctx.metrics.tasks_created,
            "Analysis completed"
        );
        self.audit.record(
            AuditEntry::new(AuditAction::AnalysisCompleted, "analysis_run", &ctx.run_id, &ctx.organization_id)
                .by(&ctx.user_id)
                .with_metadata(serde_json::json!({
                    "snapshotId": ctx.snapshot_id,
                    "metrics": ctx.metrics,
                })),
        );
    }

    fn fail_analysis(&self, ctx: &AnalysisContext, failure: PhaseFailure) {
        let status = failure.status();
        let message = failure.message();
        let phase = failure.phase.display_name();

        if let Err(e) = self.db.record_phase_failure(&ctx.run_id, phase, status, &message) {
            error!(run_id = %ctx.run_id, phase = %failure.phase, error = %e, "Failed to record phase failure");
        }
        match self.db.fail_run(&ctx.run_id, &ctx.snapshot_id, status, &message, &ctx.metrics) {
            Ok(true) => {}
            Ok(false) => {
                info!(run_id = %ctx.run_id, "Analysis was already finalized elsewhere");
                return;
            }
            Err(e) => {
                error!(run_id = %ctx.run_id, error = %e, "Failed to record analysis failure");
                return;
            }
        }

        let action = match failure.error {
            AttestorError::Cancelled(_) => AuditAction::AnalysisCancelled,
            _ => AuditAction::AnalysisFailed,
        };
        if action == AuditAction::AnalysisCancelled {
            info!(run_id = %ctx.run_id, phase = %failure.phase, "Analysis cancelled");
        } else {
            error!(
                run_id = %ctx.run_id,
                phase = %failure.phase,
                status = %status,
                error = %message,
                "Analysis failed"
            );
        }
        self.audit.record(
            AuditEntry::new(action, "analysis_run", &ctx.run_id, &ctx.organization_id)
                .by(&ctx.user_id)
                .with_metadata(serde_json::json!({
                    "snapshotId": ctx.snapshot_id,
                    "phase": phase,
                    "status": status,
                    "error": message,
                })),
        );
    }

    fn spawn_heartbeat(&self, run_id: String, stop: CancellationToken) -> JoinHandle<()> {
        let db = self.db.clone();
        // interval() panics on a zero period.
        let period = self.settings.heartbeat_interval.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = db.touch_heartbeat(&run_id) {
                            warn!(run_id = %run_id, error = %e, "Failed to record heartbeat");
                        }
                    }
                }
            }
        })
    }
}
