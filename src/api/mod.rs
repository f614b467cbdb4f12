pub mod auth;
pub mod errors;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::findings::FindingsService;
use crate::models::AnalysisDepth;
use crate::pipeline::AnalysisOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: AnalysisOrchestrator,
    pub findings: FindingsService,
    /// Bearer token required on every `/api` route except health. `None` disables the check.
    pub api_token: Option<Arc<str>>,
    pub default_frameworks: Vec<String>,
    pub default_depth: AnalysisDepth,
}

impl AppState {
    pub fn new(db: Database, orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            findings: FindingsService::new(db),
            orchestrator,
            api_token: None,
            default_frameworks: vec!["soc2".to_string()],
            default_depth: AnalysisDepth::default(),
        }
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty()).map(Arc::from);
        self
    }

    pub fn with_defaults(mut self, frameworks: Vec<String>, depth: AnalysisDepth) -> Self {
        self.default_frameworks = frameworks;
        self.default_depth = depth;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/snapshots/:id/analysis", post(routes::analysis::start_analysis))
        .route("/api/analysis/:run_id", get(routes::analysis::get_status))
        .route("/api/analysis/:run_id/cancel", post(routes::analysis::cancel_analysis))
        .route(
            "/api/snapshots/:id/findings",
            get(routes::findings::list_findings).delete(routes::findings::delete_findings),
        )
        .route("/api/snapshots/:id/findings/summary", get(routes::findings::get_summary))
        .route("/api/snapshots/:id/tasks", get(routes::findings::list_tasks))
        .route("/api/findings/:id", get(routes::findings::get_finding))
        .route("/api/findings/:id/review", post(routes::findings::review_finding))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::api_auth_middleware));

    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
