//! `/api/orchestration/*` (spec §6, §4.5).
//!
//! The orchestrator itself runs a plan to completion synchronously inside
//! one request (spec §4.5 has no notion of a background job); `status/{id}`
//! exists for a caller that kicked off `orchestrate` and wants to re-fetch
//! the outcome, so this module keeps a short-lived in-memory record of each
//! run keyed by a server-minted id.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use axum::extract::{Path, State};
use axum::Json;

use zoe_core::UserId;
use zoe_experts::ExpertContext;

use crate::state::Services;
use crate::ServerError;

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationRecord {
    pub id: String,
    pub status: String,
    pub reply: Option<String>,
    pub expert_used: Vec<String>,
}

static RECORDS: Lazy<DashMap<String, OrchestrationRecord>> = Lazy::new(DashMap::new);

#[derive(Debug, Deserialize)]
pub struct OrchestrateRequest {
    pub user_id: String,
    pub query: String,
}

pub async fn orchestrate(
    State(services): State<Services>,
    Json(request): Json<OrchestrateRequest>,
) -> Result<Json<OrchestrationRecord>, ServerError> {
    let user_id = UserId::new(request.user_id);
    let context = ExpertContext::default();

    let id = uuid::Uuid::new_v4().to_string();
    let record = match services.orchestrator.handle_turn_with_outcomes(&user_id, &request.query, &context, &[]).await {
        Ok((reply, outcomes)) => OrchestrationRecord {
            id: id.clone(),
            status: "completed".to_string(),
            reply: Some(reply),
            expert_used: outcomes.iter().map(|o| o.task.expert.clone()).collect(),
        },
        Err(error) => OrchestrationRecord { id: id.clone(), status: format!("failed: {error}"), reply: None, expert_used: Vec::new() },
    };

    RECORDS.insert(id, record.clone());
    Ok(Json(record))
}

pub async fn orchestration_status(Path(id): Path<String>) -> Result<Json<OrchestrationRecord>, ServerError> {
    RECORDS.get(&id).map(|r| Json(r.clone())).ok_or_else(|| ServerError::NotFound(format!("orchestration {id} not found")))
}

#[derive(Debug, Serialize)]
pub struct ExpertsResponse {
    pub experts: Vec<&'static str>,
}

pub async fn list_experts(State(services): State<Services>) -> Json<ExpertsResponse> {
    Json(ExpertsResponse { experts: services.experts.names() })
}
