use std::time::Duration;

use tracing::info;

use crate::cli::commands::SweepArgs;
use crate::config::AttestorConfig;
use crate::db::Database;
use crate::errors::AttestorError;
use crate::pipeline::AnalysisOrchestrator;

pub async fn handle_sweep(args: SweepArgs, config: AttestorConfig) -> Result<(), AttestorError> {
    let db = Database::new(args.db.as_deref().unwrap_or(&config.database.path))?;
    let threshold = args
        .threshold_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.stale_run_threshold());

    let orchestrator = AnalysisOrchestrator::new(db, config.pipeline_settings());
    let swept = orchestrator.sweep_stale_runs(threshold)?;
    info!(count = swept.len(), threshold_secs = threshold.as_secs(), "Sweep finished");
    if swept.is_empty() {
        println!("No stale runs");
    }
    for run_id in &swept {
        println!("Marked failed: {}", run_id);
    }
    Ok(())
}
