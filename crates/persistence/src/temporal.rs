//! ScyllaDB-backed [`EpisodeRepository`]/[`TurnRepository`] (spec §4.2).

use async_trait::async_trait;
use uuid::Uuid;

use zoe_core::{Episode, EpisodeId, EpisodeState, Turn, UserId};
use zoe_temporal::{EpisodeRepository, TemporalError, TurnRepository};

use crate::client::ScyllaClient;
use crate::enum_str::{from_text, to_text};
use crate::error::PersistenceError;

impl From<PersistenceError> for TemporalError {
    fn from(err: PersistenceError) -> Self {
        TemporalError::Storage(err.to_string())
    }
}

#[derive(Clone)]
pub struct ScyllaEpisodeRepository {
    client: ScyllaClient,
}

impl ScyllaEpisodeRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_episode(&self, row: scylla::frame::response::result::Row) -> Result<Episode, PersistenceError> {
        let (user_id, episode_id, state, _last_activity_at, data_json): (String, Uuid, String, i64, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        let mut episode: Episode = serde_json::from_str(&data_json)?;
        episode.user_id = UserId::new(user_id);
        episode.id = EpisodeId(episode_id);
        episode.state = from_text(&state)?;
        Ok(episode)
    }

    async fn all(&self) -> Result<Vec<Episode>, PersistenceError> {
        // No secondary index on `state`; `all_active` scans the partition-less
        // query and filters client-side, acceptable at this data scale
        // (mirrors the teacher's `list_for_date` note in appointments.rs).
        let query = format!("SELECT user_id, episode_id, state, last_activity_at, data_json FROM {}.episodes", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, &[]).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_episode(r)).collect()
    }
}

#[async_trait]
impl EpisodeRepository for ScyllaEpisodeRepository {
    async fn insert(&self, episode: Episode) -> Result<(), TemporalError> {
        let query = format!(
            "INSERT INTO {}.episodes (user_id, episode_id, state, last_activity_at, data_json) VALUES (?, ?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    episode.user_id.as_str(),
                    episode.id.0,
                    to_text(&episode.state),
                    episode.last_activity_at.timestamp_millis(),
                    serde_json::to_string(&episode).map_err(|e| TemporalError::Storage(e.to_string()))?,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn get(&self, id: &EpisodeId) -> Result<Option<Episode>, TemporalError> {
        Ok(self.all().await?.into_iter().find(|e| e.id == *id))
    }

    async fn update(&self, episode: Episode) -> Result<(), TemporalError> {
        self.insert(episode).await
    }

    async fn active_for_user(&self, user_id: &UserId) -> Result<Option<Episode>, TemporalError> {
        let query = format!(
            "SELECT user_id, episode_id, state, last_activity_at, data_json FROM {}.episodes WHERE user_id = ?",
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await.map_err(PersistenceError::from)?;
        let rows = result.rows.unwrap_or_default();
        let episodes: Vec<Episode> = rows.into_iter().map(|r| self.row_to_episode(r)).collect::<Result<_, _>>().map_err(TemporalError::from)?;
        Ok(episodes.into_iter().find(|e| e.state == EpisodeState::Active))
    }

    async fn all_active(&self) -> Result<Vec<Episode>, TemporalError> {
        Ok(self.all().await?.into_iter().filter(|e| e.state == EpisodeState::Active).collect())
    }
}

#[derive(Clone)]
pub struct ScyllaTurnRepository {
    client: ScyllaClient,
}

impl ScyllaTurnRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_turn(&self, row: scylla::frame::response::result::Row) -> Result<Turn, PersistenceError> {
        let (_episode_id, _turn_id, _created_at, data_json): (Uuid, Uuid, i64, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        Ok(serde_json::from_str(&data_json)?)
    }
}

#[async_trait]
impl TurnRepository for ScyllaTurnRepository {
    async fn append(&self, turn: Turn) -> Result<(), TemporalError> {
        let query = format!("INSERT INTO {}.turns (episode_id, turn_id, created_at, data_json) VALUES (?, ?, ?, ?)", self.client.keyspace());
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    turn.episode_id.0,
                    turn.id.0,
                    turn.created_at.timestamp_millis(),
                    serde_json::to_string(&turn).map_err(|e| TemporalError::Storage(e.to_string()))?,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn list_for_episode(&self, episode_id: &EpisodeId) -> Result<Vec<Turn>, TemporalError> {
        let query = format!("SELECT episode_id, turn_id, created_at, data_json FROM {}.turns WHERE episode_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (episode_id.0,)).await.map_err(PersistenceError::from)?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_turn(r)).collect::<Result<_, _>>().map_err(TemporalError::from)
    }
}
