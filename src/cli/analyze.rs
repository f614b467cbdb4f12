use std::path::Path;

use tracing::{info, warn};

use crate::cli::commands::AnalyzeArgs;
use crate::config::AttestorConfig;
use crate::db::Database;
use crate::errors::AttestorError;
use crate::findings::FindingsService;
use crate::models::{AnalysisDepth, AnalysisStatus, FindingSummary, PhaseStatus, SnapshotStatus};
use crate::pipeline::{AnalysisOrchestrator, StartAnalysis};

pub async fn handle_analyze(args: AnalyzeArgs, config: AttestorConfig) -> Result<(), AttestorError> {
    let root = std::fs::canonicalize(Path::new(&args.path))?;
    if !root.is_dir() {
        return Err(AttestorError::Validation(format!("{} is not a directory", root.display())));
    }
    let depth = match args.depth.as_deref() {
        Some(raw) => raw.parse::<AnalysisDepth>().map_err(AttestorError::Validation)?,
        None => config.analysis.default_depth,
    };
    let frameworks = if args.frameworks.is_empty() {
        config.analysis.default_frameworks.clone()
    } else {
        args.frameworks.clone()
    };

    let db = Database::new(args.db.as_deref().unwrap_or(&config.database.path))?;
    let snapshot = db.create_snapshot(&args.org, &root.to_string_lossy(), SnapshotStatus::Indexed)?;
    info!(snapshot_id = %snapshot.id, path = %root.display(), "Snapshot registered");

    let orchestrator = AnalysisOrchestrator::new(db.clone(), config.pipeline_settings());
    let started = orchestrator.start_analysis(StartAnalysis {
        snapshot_id: snapshot.id.clone(),
        organization_id: args.org.clone(),
        user_id: args.user.clone(),
        frameworks,
        depth,
    })?;

    tokio::select! {
        _ = orchestrator.wait_for(&started.run_id) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!(run_id = %started.run_id, "Interrupted, cancelling analysis");
            started.cancel_token.cancel();
            orchestrator.wait_for(&started.run_id).await;
        }
    }

    let status = orchestrator.get_analysis_status(&started.run_id, &args.org)?;
    let summary = FindingsService::new(db).get_findings_summary(&snapshot.id, &args.org)?;

    if args.json {
        let output = serde_json::json!({
            "snapshotId": snapshot.id,
            "run": status,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&snapshot.id, &status, &summary);
    }

    match status.run.phase_status {
        PhaseStatus::Completed => Ok(()),
        other => Err(AttestorError::Internal(format!(
            "Analysis {} ended {}: {}",
            status.run.id,
            other,
            status.error_message.as_deref().unwrap_or("no error recorded")
        ))),
    }
}

fn print_report(snapshot_id: &str, status: &AnalysisStatus, summary: &FindingSummary) {
    let run = &status.run;
    println!("Snapshot:  {}", snapshot_id);
    println!("Run:       {} ({})", run.id, run.phase_status);
    println!(
        "Files:     {} analyzed, {} skipped",
        run.metrics.files_analyzed, run.metrics.files_skipped
    );
    println!("Signals:   {}", run.metrics.signals_detected);
    println!(
        "Findings:  {} ({} critical), {} tasks",
        summary.total, summary.critical_count, run.metrics.tasks_created
    );
    for (status, count) in &summary.by_status {
        println!("  {:<14} {}", status, count);
    }
    for entry in &run.error_log {
        println!("Error in {}: {}", entry.phase, entry.error);
    }
}
