//! `/api/satisfaction/*` (spec §6, §4.7).

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use zoe_core::{FeedbackKind, TurnId, UserId};
use zoe_satisfaction::{InteractionSample, SatisfactionMetrics};

use crate::state::Services;
use crate::ServerError;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub turn_id: Option<uuid::Uuid>,
    pub kind: FeedbackKind,
    pub value: f32,
}

pub async fn submit_feedback(State(services): State<Services>, Json(request): Json<FeedbackRequest>) -> Result<axum::http::StatusCode, ServerError> {
    services
        .satisfaction
        .submit_feedback(&UserId::new(request.user_id), request.turn_id.map(TurnId), request.kind, request.value)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn record_interaction(
    State(services): State<Services>,
    Json(sample): Json<InteractionSample>,
) -> Result<axum::http::StatusCode, ServerError> {
    services.satisfaction.record_interaction(sample).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub user_id: Option<String>,
}

pub async fn metrics(State(services): State<Services>, Query(query): Query<MetricsQuery>) -> Result<Json<SatisfactionMetrics>, ServerError> {
    let metrics = match query.user_id {
        Some(user_id) => services.satisfaction.metrics_for_user(&UserId::new(user_id)).await?,
        None => services.satisfaction.metrics_system_wide().await?,
    };
    Ok(Json(metrics))
}
