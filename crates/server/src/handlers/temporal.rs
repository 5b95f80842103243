//! `/api/temporal-memory/*` (spec §6, §4.2).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use zoe_core::{ContextType, EpisodeCloseReason, EpisodeId, ToolCallRecord, TurnRole, UserId};
use zoe_temporal::TimeRange;

use crate::handlers::dto::SearchHit;
use crate::state::Services;
use crate::ServerError;

#[derive(Debug, Deserialize)]
pub struct CreateEpisodeRequest {
    pub user_id: String,
    #[serde(default = "default_context_type")]
    pub context_type: ContextType,
}

fn default_context_type() -> ContextType {
    ContextType::Chat
}

pub async fn create_episode(
    State(services): State<Services>,
    Json(request): Json<CreateEpisodeRequest>,
) -> Result<Json<zoe_core::Episode>, ServerError> {
    let episode = services.temporal.get_or_create_episode(&UserId::new(request.user_id), request.context_type).await?;
    Ok(Json(episode))
}

#[derive(Debug, Deserialize)]
pub struct ActiveEpisodeQuery {
    pub user_id: String,
    #[serde(default = "default_context_type")]
    pub context_type: ContextType,
}

pub async fn active_episode(
    State(services): State<Services>,
    Query(query): Query<ActiveEpisodeQuery>,
) -> Result<Json<zoe_core::Episode>, ServerError> {
    let episode = services.temporal.get_or_create_episode(&UserId::new(query.user_id), query.context_type).await?;
    Ok(Json(episode))
}

#[derive(Debug, Deserialize)]
pub struct AppendEpisodeMessageRequest {
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

pub async fn append_episode_message(
    State(services): State<Services>,
    Path(id): Path<uuid::Uuid>,
    Json(request): Json<AppendEpisodeMessageRequest>,
) -> Result<Json<zoe_core::Turn>, ServerError> {
    let turn = services
        .temporal
        .append_turn(&EpisodeId(id), request.role, &request.content, request.tool_calls)
        .await?;
    Ok(Json(turn))
}

#[derive(Debug, Deserialize)]
pub struct CloseEpisodeRequest {
    #[serde(default = "default_close_reason")]
    pub reason: EpisodeCloseReason,
}

fn default_close_reason() -> EpisodeCloseReason {
    EpisodeCloseReason::User
}

pub async fn close_episode(
    State(services): State<Services>,
    Path(id): Path<uuid::Uuid>,
    Json(request): Json<CloseEpisodeRequest>,
) -> Result<Json<zoe_core::Episode>, ServerError> {
    let episode = services.temporal.close_episode(&EpisodeId(id), request.reason).await?;
    Ok(Json(episode))
}

#[derive(Debug, Deserialize)]
pub struct EpisodeHistoryQuery {
    pub user_id: String,
}

/// Per-user episode history. The service has no dedicated "all episodes for
/// user" query; this mirrors it with a wide-window temporal search with an
/// empty query, which returns every fact regardless of text match and lets
/// us at least surface episode activity via `temporal_search`'s time
/// intersection. A dedicated history query belongs on `TemporalMemory`
/// once persistence backs it with an indexed table scan.
pub async fn episode_history(
    State(services): State<Services>,
    Query(query): Query<EpisodeHistoryQuery>,
) -> Result<Json<Vec<SearchHit>>, ServerError> {
    let user_id = UserId::new(query.user_id);
    let hits = services.temporal.temporal_search(&user_id, "", TimeRange::All, 100).await?;
    Ok(Json(hits.into_iter().map(SearchHit::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct TemporalSearchRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_time_range() -> String {
    "all".to_string()
}

fn default_limit() -> usize {
    10
}

fn parse_time_range(value: &str) -> TimeRange {
    match value {
        "today" => TimeRange::Today,
        "yesterday" => TimeRange::Yesterday,
        "last_7d" => TimeRange::Last7d,
        "last_30d" => TimeRange::Last30d,
        _ => TimeRange::All,
    }
}

pub async fn temporal_search(
    State(services): State<Services>,
    Json(request): Json<TemporalSearchRequest>,
) -> Result<Json<Vec<SearchHit>>, ServerError> {
    let user_id = UserId::new(request.user_id);
    let time_range = parse_time_range(&request.time_range);
    let hits = services.temporal.temporal_search(&user_id, &request.query, time_range, request.limit).await?;
    Ok(Json(hits.into_iter().map(SearchHit::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct DecayApplyResponse {
    pub episodes_closed: usize,
}

pub async fn apply_decay(State(services): State<Services>) -> Result<Json<DecayApplyResponse>, ServerError> {
    let episodes_closed = services.temporal.sweep_expired().await?;
    Ok(Json(DecayApplyResponse { episodes_closed }))
}
