//! ScyllaDB-backed chat session store.
//!
//! Mirrors `zoe_server::sessions::SessionRepository`'s method shapes as
//! inherent methods rather than implementing that trait directly — `zoe-server`
//! owns the trait and will eventually depend on this crate, so implementing it
//! here would create a cycle. `zoe-server` wraps this store in a thin adapter
//! that implements the trait by delegating to these methods.

use chrono::Utc;
use uuid::Uuid;

use zoe_core::{Session, SessionId, SessionMessage, UserId};

use crate::client::ScyllaClient;
use crate::error::PersistenceError;

#[derive(Clone)]
pub struct ScyllaChatSessionStore {
    client: ScyllaClient,
}

impl ScyllaChatSessionStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_session(&self, row: scylla::frame::response::result::Row) -> Result<Session, PersistenceError> {
        let (user_id, session_id, _updated_at, data_json): (String, Uuid, i64, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        let mut session: Session = serde_json::from_str(&data_json)?;
        session.user_id = UserId::new(user_id);
        session.id = SessionId(session_id);
        Ok(session)
    }

    async fn put(&self, session: &Session) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.chat_sessions (user_id, session_id, updated_at, data_json) VALUES (?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (session.user_id.as_str(), session.id.0, session.updated_at.timestamp_millis(), serde_json::to_string(session)?),
            )
            .await?;
        Ok(())
    }

    pub async fn create(&self, user_id: &UserId, title: String) -> Result<Session, PersistenceError> {
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
        self.put(&session).await?;
        Ok(session)
    }

    pub async fn get(&self, id: SessionId) -> Result<Option<Session>, PersistenceError> {
        let query =
            format!("SELECT user_id, session_id, updated_at, data_json FROM {}.chat_sessions WHERE session_id = ? ALLOW FILTERING", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (id.0,)).await?;
        match result.rows {
            Some(rows) => rows.into_iter().next().map(|r| self.row_to_session(r)).transpose(),
            None => Ok(None),
        }
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, PersistenceError> {
        let query = format!("SELECT user_id, session_id, updated_at, data_json FROM {}.chat_sessions WHERE user_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_session(r)).collect()
    }

    pub async fn append_message(&self, id: SessionId, message: SessionMessage) -> Result<Session, PersistenceError> {
        let mut session = self.get(id).await?.ok_or_else(|| PersistenceError::NotFound(format!("session {id} not found")))?;
        session.messages.push(message);
        session.message_count = session.messages.len() as u32;
        session.updated_at = Utc::now();

        let msg_query = format!("INSERT INTO {}.chat_session_messages (session_id, created_at, data_json) VALUES (?, ?, ?)", self.client.keyspace());
        let last = session.messages.last().expect("just pushed");
        self.client
            .session()
            .query_unpaged(msg_query, (id.0, last.created_at.timestamp_millis(), serde_json::to_string(last)?))
            .await?;

        self.put(&session).await?;
        Ok(session)
    }

    pub async fn rename(&self, id: SessionId, title: String) -> Result<(), PersistenceError> {
        let mut session = self.get(id).await?.ok_or_else(|| PersistenceError::NotFound(format!("session {id} not found")))?;
        session.title = title;
        session.updated_at = Utc::now();
        self.put(&session).await
    }

    pub async fn delete(&self, id: SessionId) -> Result<(), PersistenceError> {
        let session = self.get(id).await?;
        if let Some(session) = session {
            let query = format!("DELETE FROM {}.chat_sessions WHERE user_id = ? AND session_id = ?", self.client.keyspace());
            self.client.session().query_unpaged(query, (session.user_id.as_str(), session.id.0)).await?;
        }
        Ok(())
    }
}
