use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use attestor::api::{build_router, AppState};
use attestor::db::Database;
use attestor::errors::AttestorError;
use attestor::findings::FindingsService;
use attestor::models::{Confidence, ControlFinding, FindingStatus, Framework, SnapshotStatus};
use attestor::pipeline::{AnalysisContext, AnalysisOrchestrator, PhaseName, PhaseRunner, PipelineSettings};

const ORG: &str = "org-1";

/// Holds every run in Overview until the gate opens.
struct GatedRunner {
    gate: CancellationToken,
}

#[async_trait]
impl PhaseRunner for GatedRunner {
    async fn run_phase(&self, phase: PhaseName, _ctx: &mut AnalysisContext) -> Result<(), AttestorError> {
        if phase == PhaseName::Overview {
            self.gate.cancelled().await;
        }
        Ok(())
    }
}

struct TestApp {
    db: Database,
    state: AppState,
    gate: CancellationToken,
    snapshot_id: String,
}

fn create_test_app() -> TestApp {
    let db = Database::in_memory().unwrap();
    let snapshot = db.create_snapshot(ORG, "/srv/snapshots/s1", SnapshotStatus::Indexed).unwrap();
    let gate = CancellationToken::new();
    let orchestrator = AnalysisOrchestrator::with_runner(
        db.clone(),
        Arc::new(GatedRunner { gate: gate.clone() }),
        PipelineSettings::default(),
    );
    TestApp {
        state: AppState::new(db.clone(), orchestrator),
        db,
        gate,
        snapshot_id: snapshot.id,
    }
}

fn app(state: &AppState) -> axum::Router {
    build_router(state.clone())
}

fn make_request(method: &str, uri: &str, body: Option<Value>) -> axum::http::Request<Body> {
    let builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Organization-Id", ORG)
        .header("X-User-Id", "user-1");

    match body {
        Some(b) => builder.body(Body::from(serde_json::to_string(&b).unwrap())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: axum::http::Response<Body>) -> Value {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        panic!("Empty response body. Status: {}, Headers: {:?}", parts.status, parts.headers);
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("JSON parse error: {}. Body: {:?}", e, String::from_utf8_lossy(&bytes)))
}

fn seed_findings(db: &Database, snapshot_id: &str) -> Vec<String> {
    let control = |id: &str, status, confidence| ControlFinding {
        control_id: id.to_string(),
        framework: Framework::Soc2,
        status,
        confidence,
        signal_type: "secrets".into(),
        summary: format!("{} summary", id),
        detail: "detail".into(),
        evidence: vec!["config.py:3".into()],
        recommendation: "Rotate the credential".into(),
    };
    let created = FindingsService::new(db.clone())
        .create_findings(
            snapshot_id,
            ORG,
            &[
                control("CC6.6", FindingStatus::Fail, Confidence::High),
                control("CC6.2", FindingStatus::Partial, Confidence::Medium),
                control("CC7.2", FindingStatus::Pass, Confidence::Medium),
            ],
            "user-1",
        )
        .unwrap();
    created.findings.into_iter().map(|f| f.id).collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = create_test_app();
    let req = axum::http::Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "attestor");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let t = create_test_app();
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/api/snapshots/{}/findings", t.snapshot_id))
        .body(Body::empty())
        .unwrap();
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bearer_token_enforced_when_configured() {
    let t = create_test_app();
    let state = t.state.clone().with_api_token(Some("s3cret".into()));
    let uri = format!("/api/snapshots/{}/findings/summary", t.snapshot_id);

    let response = app(&state).oneshot(make_request("GET", &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut req = make_request("GET", &uri, None);
    req.headers_mut().insert("Authorization", "Bearer wrong".parse().unwrap());
    let response = app(&state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut req = make_request("GET", &uri, None);
    req.headers_mut().insert("Authorization", "Bearer s3cret".parse().unwrap());
    let response = app(&state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let req = axum::http::Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let response = app(&state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_start_analysis_and_poll_status() {
    let t = create_test_app();

    let req = make_request(
        "POST",
        &format!("/api/snapshots/{}/analysis", t.snapshot_id),
        Some(json!({ "frameworks": ["soc2", "iso27001"], "depth": "full" })),
    );
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response_json(response).await;
    assert_eq!(body["status"], "pending");
    let run_id = body["runId"].as_str().unwrap().to_string();

    let req = make_request("GET", &format!("/api/analysis/{}", run_id), None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["id"], run_id);
    assert_eq!(body["snapshotStatus"], "analyzing");
    assert_eq!(body["frameworks"], json!(["soc2", "iso27001"]));
    assert_eq!(body["depth"], "full");

    // A second start while the first is in flight is rejected.
    let req = make_request("POST", &format!("/api/snapshots/{}/analysis", t.snapshot_id), None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["code"], "CONFLICT");

    t.gate.cancel();
    t.state.orchestrator.wait_for(&run_id).await;

    let req = make_request("GET", &format!("/api/analysis/{}", run_id), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    assert_eq!(body["phaseStatus"], "completed");
    assert_eq!(body["progress"], 100);
    assert_eq!(body["snapshotStatus"], "completed");
}

#[tokio::test]
async fn test_start_analysis_rejects_bad_input() {
    let t = create_test_app();

    let req = make_request(
        "POST",
        &format!("/api/snapshots/{}/analysis", t.snapshot_id),
        Some(json!({ "frameworks": ["pci-dss"] })),
    );
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["code"], "VALIDATION_ERROR");

    let req = make_request(
        "POST",
        &format!("/api/snapshots/{}/analysis", t.snapshot_id),
        Some(json!({ "depth": "everything" })),
    );
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let req = make_request("POST", "/api/snapshots/nonexistent/analysis", None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_analysis() {
    let t = create_test_app();

    let req = make_request("POST", &format!("/api/snapshots/{}/analysis", t.snapshot_id), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    let run_id = body["runId"].as_str().unwrap().to_string();

    let req = make_request("POST", &format!("/api/analysis/{}/cancel", run_id), None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response_json(response).await["cancelling"], true);

    t.state.orchestrator.wait_for(&run_id).await;

    let req = make_request("GET", &format!("/api/analysis/{}", run_id), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    assert_eq!(body["phaseStatus"], "failed");
    assert_eq!(body["errorMessage"], "Analysis cancelled");

    let req = make_request("POST", &format!("/api/analysis/{}/cancel", run_id), None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let t = create_test_app();
    let req = make_request("GET", "/api/analysis/nonexistent", None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_and_filter_findings() {
    let t = create_test_app();
    seed_findings(&t.db, &t.snapshot_id);

    let req = make_request("GET", &format!("/api/snapshots/{}/findings", t.snapshot_id), None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["findings"].as_array().unwrap().len(), 3);

    let req = make_request(
        "GET",
        &format!("/api/snapshots/{}/findings?status=fail&limit=10", t.snapshot_id),
        None,
    );
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["findings"][0]["controlId"], "CC6.6");
    assert_eq!(body["limit"], 10);
}

#[tokio::test]
async fn test_findings_of_other_organization_are_hidden() {
    let t = create_test_app();
    seed_findings(&t.db, &t.snapshot_id);

    let mut req = make_request("GET", &format!("/api/snapshots/{}/findings", t.snapshot_id), None);
    req.headers_mut().insert("X-Organization-Id", "org-2".parse().unwrap());
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summary_and_tasks() {
    let t = create_test_app();
    seed_findings(&t.db, &t.snapshot_id);

    let req = make_request("GET", &format!("/api/snapshots/{}/findings/summary", t.snapshot_id), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["criticalCount"], 1);
    assert_eq!(body["byStatus"]["fail"], 1);
    assert_eq!(body["byFramework"]["soc2"], 3);

    let req = make_request("GET", &format!("/api/snapshots/{}/tasks", t.snapshot_id), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    let tasks = body.as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["priority"], "critical");
    assert_eq!(tasks[1]["priority"], "medium");
}

#[tokio::test]
async fn test_review_finding_with_override() {
    let t = create_test_app();
    let ids = seed_findings(&t.db, &t.snapshot_id);

    let req = make_request(
        "POST",
        &format!("/api/findings/{}/review", ids[0]),
        Some(json!({
            "humanOverride": {
                "originalStatus": "pass",
                "newStatus": "partial",
                "reason": "Credential is a revoked test fixture"
            }
        })),
    );
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "partial");
    assert_eq!(body["humanOverride"]["originalStatus"], "fail");
    assert_eq!(body["reviewedBy"], "user-1");

    let req = make_request("GET", &format!("/api/findings/{}", ids[0]), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    assert_eq!(body["status"], "partial");

    let req = make_request("POST", &format!("/api/findings/{}/review", ids[0]), Some(json!({})));
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let req = make_request("POST", "/api/findings/nonexistent/review", Some(json!({ "status": "pass" })));
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_findings() {
    let t = create_test_app();
    seed_findings(&t.db, &t.snapshot_id);

    let req = make_request("DELETE", &format!("/api/snapshots/{}/findings", t.snapshot_id), None);
    let response = app(&t.state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["deleted"], 3);

    let req = make_request("GET", &format!("/api/snapshots/{}/tasks", t.snapshot_id), None);
    let body = response_json(app(&t.state).oneshot(req).await.unwrap()).await;
    assert!(body.as_array().unwrap().is_empty());
}
