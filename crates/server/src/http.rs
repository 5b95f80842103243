//! Router assembly: every component crate's REST surface behind one
//! [`Services`] state, spec §6's full route table.

use std::time::Duration;

use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers::{chat, chat_sessions, memories, orchestration, satisfaction, temporal};
use crate::state::Services;

/// Build the application router. Middleware order: auth resolves the
/// caller's [`zoe_core::UserId`] before any handler runs; tracing and
/// compression wrap the whole stack; CORS is outermost.
pub fn create_router(services: Services) -> Router {
    let (cors_enabled, cors_origins) = {
        let config = services.config.read();
        (config.server.cors_enabled, config.server.cors_origins.clone())
    };
    let cors_layer = build_cors_layer(&cors_origins, cors_enabled);

    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/sessions", post(chat_sessions::create_session))
        .route("/api/chat/sessions", get(chat_sessions::list_sessions))
        .route("/api/chat/sessions/:id/messages", get(chat_sessions::get_session_messages))
        .route("/api/chat/sessions/:id/messages", post(chat_sessions::append_session_message))
        .route("/api/chat/sessions/:id", axum::routing::put(chat_sessions::rename_session))
        .route("/api/chat/sessions/:id", delete(chat_sessions::delete_session))
        .route("/api/temporal-memory/episodes", post(temporal::create_episode))
        .route("/api/temporal-memory/episodes/active", get(temporal::active_episode))
        .route("/api/temporal-memory/episodes/:id/messages", post(temporal::append_episode_message))
        .route("/api/temporal-memory/episodes/:id/close", post(temporal::close_episode))
        .route("/api/temporal-memory/episodes/history", get(temporal::episode_history))
        .route("/api/temporal-memory/search", post(temporal::temporal_search))
        .route("/api/temporal-memory/decay/apply", post(temporal::apply_decay))
        .route("/api/orchestration/orchestrate", post(orchestration::orchestrate))
        .route("/api/orchestration/status/:id", get(orchestration::orchestration_status))
        .route("/api/orchestration/experts", get(orchestration::list_experts))
        .route("/api/satisfaction/feedback", post(satisfaction::submit_feedback))
        .route("/api/satisfaction/interaction", post(satisfaction::record_interaction))
        .route("/api/satisfaction/metrics", get(satisfaction::metrics))
        .route("/api/memories/search/light-rag", post(memories::search_light_rag))
        .route("/api/memories/enhanced", post(memories::search_enhanced))
        .route("/api/memories/contextual/:entity", get(memories::contextual_entity))
        .route("/api/memories/stats/light-rag", get(memories::stats_light_rag))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(axum::middleware::from_fn_with_state(services.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(services)
}

/// CORS disabled is dev-only and loud about it; an empty allow-list in a
/// CORS-enabled deployment falls back to localhost rather than silently
/// accepting nothing.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("no CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(%origin, "invalid CORS origin, skipping");
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("all configured CORS origins are invalid, falling back to localhost");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!(count = parsed_origins.len(), "CORS configured");
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Reachability check for the inference backend (spec §8 scenario 6: the
/// chat pipeline must degrade, not hang, when it's offline — `/ready`
/// surfaces that state for a load balancer rather than hiding it).
async fn readiness_check(axum::extract::State(services): axum::extract::State<Services>) -> impl IntoResponse {
    let available =
        tokio::time::timeout(Duration::from_secs(2), services.inference.is_available()).await.unwrap_or(false);

    let status = if available { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(serde_json::json!({
            "status": if available { "ready" } else { "degraded" },
            "inference": { "model": services.inference.model_name(), "available": available },
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe_config::Settings;

    #[test]
    fn router_builds_from_default_settings() {
        let services = Services::new(Settings::default()).expect("services wire up");
        let _ = create_router(services);
    }
}
