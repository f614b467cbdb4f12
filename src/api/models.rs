use serde::{Deserialize, Serialize};

use crate::models::PhaseStatus;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisRequest {
    pub frameworks: Option<Vec<String>>,
    pub depth: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub run_id: String,
    pub status: PhaseStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFindingsResponse {
    pub deleted: usize,
}
