use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::cli::commands::ServeArgs;
use crate::config::AttestorConfig;
use crate::db::Database;
use crate::errors::AttestorError;
use crate::pipeline::{spawn_sweeper, AnalysisOrchestrator};

pub async fn handle_serve(args: ServeArgs, config: AttestorConfig) -> Result<(), AttestorError> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let db_path = args.db.unwrap_or_else(|| config.database.path.clone());
    info!(host = %host, port, db = %db_path, "Starting API server");

    let db = Database::new(&db_path)?;
    let orchestrator = AnalysisOrchestrator::new(db.clone(), config.pipeline_settings());

    let api_token = config
        .server
        .api_token_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());
    if api_token.is_none() {
        warn!("API token not set; requests are not authenticated");
    }
    let state = AppState::new(db, orchestrator.clone())
        .with_api_token(api_token)
        .with_defaults(config.analysis.default_frameworks.clone(), config.analysis.default_depth);
    let app = api::build_router(state);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        orchestrator.clone(),
        config.sweep_interval(),
        config.stale_run_threshold(),
        shutdown.clone(),
    );

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
            signal.cancel();
        })
        .await
        .map_err(|e| AttestorError::Internal(format!("Server error: {}", e)))?;

    shutdown.cancel();
    orchestrator.cancel_all();
    let draining = orchestrator.active_runs();
    futures::future::join_all(draining.iter().map(|run_id| orchestrator.wait_for(run_id))).await;
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }
    Ok(())
}
