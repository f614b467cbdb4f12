use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::auth::Identity;
use crate::api::models::DeleteFindingsResponse;
use crate::api::AppState;
use crate::errors::AttestorError;
use crate::models::{FindingFilters, FindingPage, FindingSummary, RepositoryFinding, RepositoryTask, ReviewRequest};

pub async fn list_findings(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    identity: Identity,
    Query(filters): Query<FindingFilters>,
) -> Result<Json<FindingPage>, AttestorError> {
    let page = state.findings.get_findings(&snapshot_id, &identity.organization_id, &filters)?;
    Ok(Json(page))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    identity: Identity,
) -> Result<Json<FindingSummary>, AttestorError> {
    let summary = state.findings.get_findings_summary(&snapshot_id, &identity.organization_id)?;
    Ok(Json(summary))
}

pub async fn delete_findings(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    identity: Identity,
) -> Result<Json<DeleteFindingsResponse>, AttestorError> {
    let deleted = state.findings.delete_snapshot_findings(
        &snapshot_id,
        &identity.organization_id,
        &identity.user_id,
    )?;
    Ok(Json(DeleteFindingsResponse { deleted }))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    identity: Identity,
) -> Result<Json<Vec<RepositoryTask>>, AttestorError> {
    let tasks = state.findings.list_tasks(&snapshot_id, &identity.organization_id)?;
    Ok(Json(tasks))
}

pub async fn get_finding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    identity: Identity,
) -> Result<Json<RepositoryFinding>, AttestorError> {
    let finding = state.findings.get_finding_by_id(&id, &identity.organization_id)?;
    Ok(Json(finding))
}

pub async fn review_finding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    identity: Identity,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<RepositoryFinding>, AttestorError> {
    let finding = state.findings.review_finding(
        &id,
        &identity.organization_id,
        &identity.user_id,
        request,
    )?;
    Ok(Json(finding))
}
