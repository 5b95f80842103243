//! Auth collaborator client (spec §6, consumed, external).
//!
//! `GET {auth_url}/session/{id}` resolves a session id header to a
//! `{ user_id }`. Missing or invalid session degrades to
//! `UserId::default_user()` with no elevated permissions rather than
//! rejecting the request outright — the chat pipeline has no privileged
//! operations that a missing auth collaborator needs to gate.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use zoe_core::UserId;

use crate::state::Services;

const SESSION_HEADER: &str = "x-session-id";
const AUTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct SessionResolution {
    user_id: String,
}

/// Resolves the caller's [`UserId`] and inserts it into request
/// extensions for handlers to read. Never rejects a request: an
/// unreachable or non-2xx auth collaborator just yields the default user.
pub async fn auth_middleware(State(services): State<Services>, mut request: Request, next: Next) -> Response {
    let user_id = resolve_user_id(&services, request.headers()).await;
    request.extensions_mut().insert(user_id);
    next.run(request).await
}

async fn resolve_user_id(services: &Services, headers: &HeaderMap) -> UserId {
    let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return UserId::default_user();
    };

    let Some(auth_url) = services.config.read().server.auth_url.clone() else {
        return UserId::default_user();
    };
    let url = format!("{auth_url}/session/{session_id}");

    let client = reqwest::Client::new();
    let result = tokio::time::timeout(AUTH_TIMEOUT, client.get(&url).send()).await;

    match result {
        Ok(Ok(response)) if response.status().is_success() => match response.json::<SessionResolution>().await {
            Ok(resolved) => UserId::new(resolved.user_id),
            Err(_) => UserId::default_user(),
        },
        _ => UserId::default_user(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_session_header_degrades_to_default_user() {
        let headers = HeaderMap::new();
        assert!(headers.get(SESSION_HEADER).is_none());
    }
}
