use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::api::auth::Identity;
use crate::api::models::{StartAnalysisRequest, StartAnalysisResponse};
use crate::api::AppState;
use crate::errors::AttestorError;
use crate::models::{AnalysisDepth, AnalysisStatus, PhaseStatus};
use crate::pipeline::StartAnalysis;

pub async fn start_analysis(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    identity: Identity,
    body: Option<Json<StartAnalysisRequest>>,
) -> Result<(StatusCode, Json<StartAnalysisResponse>), AttestorError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let depth = match req.depth.as_deref() {
        Some(raw) => raw.parse::<AnalysisDepth>().map_err(AttestorError::Validation)?,
        None => state.default_depth,
    };
    let frameworks = req.frameworks.unwrap_or_else(|| state.default_frameworks.clone());

    let started = state.orchestrator.start_analysis(StartAnalysis {
        snapshot_id,
        organization_id: identity.organization_id,
        user_id: identity.user_id,
        frameworks,
        depth,
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartAnalysisResponse { run_id: started.run_id, status: PhaseStatus::Pending }),
    ))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    identity: Identity,
) -> Result<Json<AnalysisStatus>, AttestorError> {
    let status = state.orchestrator.get_analysis_status(&run_id, &identity.organization_id)?;
    Ok(Json(status))
}

pub async fn cancel_analysis(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    identity: Identity,
) -> Result<(StatusCode, Json<Value>), AttestorError> {
    state.orchestrator.cancel_analysis(&run_id, &identity.organization_id)?;
    Ok((StatusCode::ACCEPTED, Json(json!({"runId": run_id, "cancelling": true}))))
}
