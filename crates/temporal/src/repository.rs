//! Storage seams for episodes and turns. `zoe-persistence` provides the
//! ScyllaDB-backed implementation; the in-memory one here is the default.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use zoe_core::{Episode, EpisodeId, EpisodeState, Turn, UserId};

use crate::TemporalError;

#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    async fn insert(&self, episode: Episode) -> Result<(), TemporalError>;
    async fn get(&self, id: &EpisodeId) -> Result<Option<Episode>, TemporalError>;
    async fn update(&self, episode: Episode) -> Result<(), TemporalError>;
    async fn active_for_user(&self, user_id: &UserId) -> Result<Option<Episode>, TemporalError>;
    async fn all_active(&self) -> Result<Vec<Episode>, TemporalError>;
}

#[async_trait]
pub trait TurnRepository: Send + Sync {
    async fn append(&self, turn: Turn) -> Result<(), TemporalError>;
    async fn list_for_episode(&self, episode_id: &EpisodeId) -> Result<Vec<Turn>, TemporalError>;
}

#[derive(Default)]
pub struct InMemoryEpisodeRepository {
    episodes: DashMap<EpisodeId, Episode>,
}

impl InMemoryEpisodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EpisodeRepository for InMemoryEpisodeRepository {
    async fn insert(&self, episode: Episode) -> Result<(), TemporalError> {
        self.episodes.insert(episode.id, episode);
        Ok(())
    }

    async fn get(&self, id: &EpisodeId) -> Result<Option<Episode>, TemporalError> {
        Ok(self.episodes.get(id).map(|r| r.clone()))
    }

    async fn update(&self, episode: Episode) -> Result<(), TemporalError> {
        self.episodes.insert(episode.id, episode);
        Ok(())
    }

    async fn active_for_user(&self, user_id: &UserId) -> Result<Option<Episode>, TemporalError> {
        Ok(self
            .episodes
            .iter()
            .find(|e| e.value().user_id == *user_id && e.value().state == EpisodeState::Active)
            .map(|e| e.value().clone()))
    }

    async fn all_active(&self) -> Result<Vec<Episode>, TemporalError> {
        Ok(self.episodes.iter().filter(|e| e.value().state == EpisodeState::Active).map(|e| e.value().clone()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryTurnRepository {
    turns: DashMap<EpisodeId, Vec<Turn>>,
}

impl InMemoryTurnRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TurnRepository for InMemoryTurnRepository {
    async fn append(&self, turn: Turn) -> Result<(), TemporalError> {
        self.turns.entry(turn.episode_id).or_default().push(turn);
        Ok(())
    }

    async fn list_for_episode(&self, episode_id: &EpisodeId) -> Result<Vec<Turn>, TemporalError> {
        Ok(self.turns.get(episode_id).map(|t| t.clone()).unwrap_or_default())
    }
}

pub type SharedEpisodeRepository = Arc<dyn EpisodeRepository>;
pub type SharedTurnRepository = Arc<dyn TurnRepository>;
