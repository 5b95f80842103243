//! Chat session repository.
//!
//! `/api/chat/sessions` groups turns under a titled session the client can
//! list and resume, distinct from [`zoe_temporal::Episode`] (which tracks
//! idle-timeout-scoped activity, not naming). No component crate owns this
//! concept, so it lives directly in the server crate.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use zoe_core::{Session, SessionId, SessionMessage, UserId};

use crate::ServerError;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, user_id: &UserId, title: String) -> Result<Session, ServerError>;
    async fn get(&self, id: SessionId) -> Result<Option<Session>, ServerError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, ServerError>;
    async fn append_message(&self, id: SessionId, message: SessionMessage) -> Result<Session, ServerError>;
    async fn rename(&self, id: SessionId, title: String) -> Result<(), ServerError>;
    async fn delete(&self, id: SessionId) -> Result<(), ServerError>;
}

pub type SharedSessionRepository = Arc<dyn SessionRepository>;

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: DashMap<SessionId, Session>,
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, user_id: &UserId, title: String) -> Result<Session, ServerError> {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            user_id: user_id.clone(),
            title,
            message_count: 0,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, ServerError> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, ServerError> {
        Ok(self.sessions.iter().filter(|e| &e.value().user_id == user_id).map(|e| e.value().clone()).collect())
    }

    async fn append_message(&self, id: SessionId, message: SessionMessage) -> Result<Session, ServerError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ServerError::NotFound(format!("session {id} not found")))?;
        entry.messages.push(message);
        entry.message_count = entry.messages.len() as u32;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn rename(&self, id: SessionId, title: String) -> Result<(), ServerError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ServerError::NotFound(format!("session {id} not found")))?;
        entry.title = title;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), ServerError> {
        self.sessions.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe_core::TurnRole;

    #[tokio::test]
    async fn append_message_bumps_count_and_updated_at() {
        let repo = InMemorySessionRepository::default();
        let user_id = UserId::new("u1");
        let session = repo.create(&user_id, "trip planning".to_string()).await.unwrap();
        let updated = repo
            .append_message(session.id, SessionMessage { role: TurnRole::User, content: "hi".to_string(), created_at: Utc::now() })
            .await
            .unwrap();
        assert_eq!(updated.message_count, 1);
        assert_eq!(updated.messages.len(), 1);
    }

    #[tokio::test]
    async fn list_for_user_excludes_other_users() {
        let repo = InMemorySessionRepository::default();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        repo.create(&u1, "a".to_string()).await.unwrap();
        repo.create(&u2, "b".to_string()).await.unwrap();
        let listed = repo.list_for_user(&u1).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn get_missing_session_returns_none() {
        let repo = InMemorySessionRepository::default();
        assert!(repo.get(SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_to_missing_session_is_not_found() {
        let repo = InMemorySessionRepository::default();
        let err = repo
            .append_message(SessionId::new(), SessionMessage { role: TurnRole::User, content: "x".to_string(), created_at: Utc::now() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
