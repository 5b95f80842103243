//! `/api/chat/sessions/*` (spec §6) — titled, resumable conversations
//! distinct from the temporal-memory episode that backs `/api/chat`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use zoe_core::{SessionId, SessionMessage, TurnRole, UserId};

use crate::state::Services;
use crate::ServerError;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "New conversation".to_string()
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

pub async fn create_session(
    State(services): State<Services>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ServerError> {
    let session = services.sessions.create(&UserId::new(request.user_id), request.title).await?;
    Ok(Json(CreateSessionResponse { session_id: session.id.to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub user_id: String,
}

pub async fn list_sessions(
    State(services): State<Services>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<zoe_core::Session>>, ServerError> {
    let sessions = services.sessions.list_for_user(&UserId::new(query.user_id)).await?;
    Ok(Json(sessions))
}

pub async fn get_session_messages(
    State(services): State<Services>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Vec<SessionMessage>>, ServerError> {
    let session = services
        .sessions
        .get(SessionId(id))
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("session {id} not found")))?;
    Ok(Json(session.messages))
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub role: TurnRole,
    pub content: String,
}

pub async fn append_session_message(
    State(services): State<Services>,
    Path(id): Path<uuid::Uuid>,
    Json(request): Json<AppendMessageRequest>,
) -> Result<Json<zoe_core::Session>, ServerError> {
    let message = SessionMessage { role: request.role, content: request.content, created_at: chrono::Utc::now() };
    let session = services.sessions.append_message(SessionId(id), message).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

pub async fn rename_session(
    State(services): State<Services>,
    Path(id): Path<uuid::Uuid>,
    Json(request): Json<RenameSessionRequest>,
) -> Result<Json<zoe_core::Session>, ServerError> {
    services.sessions.rename(SessionId(id), request.title).await?;
    let session = services
        .sessions
        .get(SessionId(id))
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("session {id} not found")))?;
    Ok(Json(session))
}

pub async fn delete_session(State(services): State<Services>, Path(id): Path<uuid::Uuid>) -> Result<axum::http::StatusCode, ServerError> {
    services.sessions.delete(SessionId(id)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
