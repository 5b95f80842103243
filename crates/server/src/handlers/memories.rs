//! `/api/memories/*` (spec §6, §4.1).

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use zoe_core::UserId;
use zoe_memory::MemoryStats;

use crate::handlers::dto::SearchHit;
use crate::state::Services;
use crate::ServerError;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

fn default_limit() -> usize {
    10
}

/// `POST /api/memories/search/light-rag` — plain semantic search, no
/// relationship boosting.
pub async fn search_light_rag(
    State(services): State<Services>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>, ServerError> {
    let user_id = UserId::new(request.user_id);
    let hits = services.memory.search(&user_id, &request.query, request.limit, request.min_similarity, false).await?;
    Ok(Json(hits.into_iter().map(SearchHit::from).collect()))
}

/// `POST /api/memories/enhanced` — search with relationship-graph boosting
/// (spec §4.1's "walk one hop of related entities").
pub async fn search_enhanced(
    State(services): State<Services>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>, ServerError> {
    let user_id = UserId::new(request.user_id);
    let hits = services.memory.search(&user_id, &request.query, request.limit, request.min_similarity, true).await?;
    Ok(Json(hits.into_iter().map(SearchHit::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ContextualEntityQuery {
    pub user_id: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ContextualEntityResponse {
    pub entity: zoe_core::Entity,
    pub facts: Vec<zoe_core::MemoryFact>,
}

pub async fn contextual_entity(
    State(services): State<Services>,
    Path(entity_name): Path<String>,
    axum::extract::Query(query): axum::extract::Query<ContextualEntityQuery>,
) -> Result<Json<ContextualEntityResponse>, ServerError> {
    let user_id = UserId::new(query.user_id);
    match services.memory.contextual_entity(&user_id, &entity_name).await? {
        Some((entity, facts)) => Ok(Json(ContextualEntityResponse { entity, facts })),
        None => Err(ServerError::NotFound(format!("entity {entity_name} not found"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub user_id: String,
}

pub async fn stats_light_rag(
    State(services): State<Services>,
    axum::extract::Query(query): axum::extract::Query<StatsQuery>,
) -> Result<Json<MemoryStats>, ServerError> {
    let user_id = UserId::new(query.user_id);
    let stats = services.memory.stats(&user_id).await?;
    Ok(Json(stats))
}
