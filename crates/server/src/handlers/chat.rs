//! `POST /api/chat` — the chat pipeline (spec §4.6).
//!
//! Six steps: resolve user, acquire/extend the active episode and append
//! the user turn, gather enrichment, run the orchestrator, stream (or
//! return) the reply, then append the assistant turn and record an
//! implicit satisfaction sample.

use std::collections::hash_map::DefaultHasher;
use std::convert::Infallible;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use zoe_core::{ContextType, TurnId, TurnRole, UserId};
use zoe_experts::ExpertContext;
use zoe_orchestrator::TaskOutcome;
use zoe_satisfaction::InteractionSample;

use crate::state::Services;
use crate::ServerError;

/// Queue depth for the SSE bridge channel (spec §5 backpressure model).
const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub episode_id: String,
    pub expert_used: Vec<String>,
    pub model: String,
    pub actions: Vec<String>,
    pub latency_ms: u64,
}

pub async fn chat(
    State(services): State<Services>,
    axum::extract::Extension(default_user): axum::extract::Extension<UserId>,
    Json(request): Json<ChatRequest>,
) -> Result<axum::response::Response, ServerError> {
    if request.message.trim().is_empty() {
        return Err(ServerError::Validation("message must not be empty".to_string()));
    }
    let user_id = request.user_id.clone().map(UserId::new).unwrap_or(default_user);

    if request.stream {
        Ok(chat_stream(services, user_id, request.message).await.into_response())
    } else {
        Ok(Json(chat_sync(&services, &user_id, &request.message).await?).into_response())
    }
}

fn args_digest(goal: &str) -> String {
    let mut hasher = DefaultHasher::new();
    goal.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Shared enrichment + orchestration path used by both the sync and
/// streaming handlers. Returns the reply, the episode id, and the task
/// outcomes so the caller can report `expert_used`/`actions`.
async fn run_turn(
    services: &Services,
    user_id: &UserId,
    message: &str,
) -> Result<(String, zoe_core::EpisodeId, Vec<TaskOutcome>), ServerError> {
    let episode = services.temporal.get_or_create_episode(user_id, ContextType::Chat).await?;
    services.temporal.append_turn(&episode.id, TurnRole::User, message, None).await?;

    let fingerprint = format!("user:{}:memory:{}", user_id.as_str(), args_digest(message));
    let memory = services.memory.clone();
    let query = message.to_string();
    let uid = user_id.clone();
    let recalled_summary = services
        .cache
        .fetch_or_compute(&fingerprint, zoe_cache::SourceKind::Memory, move || async move {
            let hits = memory
                .search(&uid, &query, 5, None, true)
                .await
                .map_err(|e| zoe_cache::CacheError::Compute(e.to_string()))?;
            Ok(hits.into_iter().map(|h| h.fact.text).collect::<Vec<_>>().join("\n"))
        })
        .await?;

    let recalled_facts: Vec<String> = recalled_summary.lines().filter(|l| !l.is_empty()).map(str::to_string).collect();
    let context = ExpertContext { episode_summary: episode.auto_summary.clone(), recalled_facts, slots: Default::default() };

    let (reply, outcomes) = services.orchestrator.handle_turn_with_outcomes(user_id, message, &context, &[]).await?;

    services.temporal.append_turn(&episode.id, TurnRole::Assistant, &reply, None).await?;

    Ok((reply, episode.id, outcomes))
}

async fn chat_sync(services: &Services, user_id: &UserId, message: &str) -> Result<ChatResponse, ServerError> {
    let start = Instant::now();
    let (reply, episode_id, outcomes) = run_turn(services, user_id, message).await?;
    let latency_ms = start.elapsed().as_millis() as u64;

    record_satisfaction(services, user_id, &episode_id, latency_ms, &outcomes).await;

    Ok(ChatResponse {
        response: reply,
        episode_id: episode_id.to_string(),
        expert_used: outcomes.iter().map(|o| o.task.expert.clone()).collect(),
        model: services.inference.model_name().to_string(),
        actions: outcomes.iter().map(|o| o.task.goal.clone()).collect(),
        latency_ms,
    })
}

/// Derives `follow_up_count`/`engagement_duration_s` from the episode's own
/// turn bookkeeping rather than hardcoding them — each user/assistant pair
/// appended in `run_turn` bumps `message_count` by two, so the exchange
/// count minus the current one is how many times the user followed up.
async fn record_satisfaction(
    services: &Services,
    user_id: &UserId,
    episode_id: &zoe_core::EpisodeId,
    latency_ms: u64,
    outcomes: &[TaskOutcome],
) {
    let task_completion = outcomes.is_empty() || outcomes.iter().all(|o| o.result.success);

    let (follow_up_count, engagement_duration_s) = match services.temporal.get_episode(episode_id).await {
        Ok(Some(episode)) => {
            let exchanges = episode.message_count / 2;
            let follow_up_count = exchanges.saturating_sub(1);
            let engagement_duration_s =
                (episode.last_activity_at - episode.started_at).num_milliseconds() as f32 / 1000.0;
            (follow_up_count, engagement_duration_s)
        }
        Ok(None) => (0, 0.0),
        Err(error) => {
            tracing::warn!(%error, "failed to load episode for satisfaction sampling");
            (0, 0.0)
        }
    };

    let sample = InteractionSample {
        user_id: user_id.clone(),
        turn_id: TurnId::new(),
        response_time_s: latency_ms as f32 / 1000.0,
        task_completion,
        follow_up_count,
        engagement_duration_s,
        recorded_at: chrono::Utc::now(),
    };
    if let Err(error) = services.satisfaction.record_interaction(sample).await {
        tracing::warn!(%error, "failed to record satisfaction interaction");
    }
}

async fn chat_stream(services: Services, user_id: UserId, message: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<serde_json::Value>(EVENT_QUEUE_DEPTH);

    tokio::spawn(async move {
        let session_id = uuid::Uuid::new_v4().to_string();
        let _ = tx.send(json!({"type": "session_start", "session_id": session_id})).await;

        let budget = std::time::Duration::from_secs(services.request_soft_budget_seconds());
        let start = Instant::now();

        // agent_state_delta is the only droppable event type (spec §5): a
        // full queue means a slow client, and a stale progress update is
        // fine to lose, unlike every other event here which blocks on send.
        let _ = tx.try_send(json!({
            "type": "agent_state_delta",
            "state": {"context": {"events": 0, "memories": 0}, "routing": "pending", "model": services.inference.model_name(), "status": "enriching"},
        }));

        let outcome = tokio::time::timeout(budget, run_turn(&services, &user_id, &message)).await;

        let final_state = match outcome {
            Ok(Ok((reply, episode_id, outcomes))) => {
                for task_outcome in &outcomes {
                    let digest = args_digest(&task_outcome.task.goal);
                    let _ = tx.send(json!({"type": "action", "name": task_outcome.task.expert, "args_digest": digest})).await;
                    let _ = tx
                        .send(json!({
                            "type": "action_result",
                            "name": task_outcome.task.expert,
                            "success": task_outcome.result.success,
                            "summary": task_outcome.result.content,
                        }))
                        .await;
                }

                let _ = tx.send(json!({"type": "message_delta", "delta": reply})).await;

                let latency_ms = start.elapsed().as_millis() as u64;
                record_satisfaction(&services, &user_id, &episode_id, latency_ms, &outcomes).await;

                json!({"episode_id": episode_id.to_string(), "status": "complete"})
            }
            Ok(Err(error)) => {
                let _ = tx.send(json!({"type": "error", "code": "fatal", "message": error.to_string()})).await;
                json!({"status": "error"})
            }
            Err(_) => {
                let _ = tx.send(json!({"type": "error", "code": "timeout", "message": "request exceeded soft budget"})).await;
                json!({"status": "timeout"})
            }
        };

        let _ = tx.send(json!({"type": "session_end", "session_id": session_id, "final_state": final_state})).await;
    });

    let stream = stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(Event::default().data(event.to_string()));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
