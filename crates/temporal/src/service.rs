//! Episodes, turn append, expiry sweep, temporal filtering and episode
//! summaries (spec §4.2).

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use zoe_core::{ContextType, Episode, EpisodeCloseReason, EpisodeId, EpisodeState, Turn, TurnRole, UserId};
use zoe_llm::{InferenceBackend, Message};
use zoe_memory::MemoryStore;

use crate::repository::{SharedEpisodeRepository, SharedTurnRepository};
use crate::TemporalError;

const SUMMARY_TURN_WINDOW: usize = 40;
const APPEND_TURN_FACT_IMPORTANCE: f32 = 0.3;

/// Time window for [`TemporalMemory::temporal_search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Today,
    Yesterday,
    Last7d,
    Last30d,
    All,
}

impl TimeRange {
    fn bounds(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start_of_today = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        match self {
            TimeRange::Today => Some((start_of_today, now)),
            TimeRange::Yesterday => Some((start_of_today - Duration::days(1), start_of_today)),
            TimeRange::Last7d => Some((now - Duration::days(7), now)),
            TimeRange::Last30d => Some((now - Duration::days(30), now)),
            TimeRange::All => None,
        }
    }

    fn contains(self, now: DateTime<Utc>, ts: DateTime<Utc>) -> bool {
        match self.bounds(now) {
            Some((start, end)) => ts >= start && ts <= end,
            None => true,
        }
    }
}

pub struct TemporalMemory {
    episodes: SharedEpisodeRepository,
    turns: SharedTurnRepository,
    memory: Arc<MemoryStore>,
    inference: Arc<dyn InferenceBackend>,
    episode_locks: DashMap<EpisodeId, Arc<AsyncMutex<()>>>,
    creation_locks: DashMap<(UserId, ContextType), Arc<AsyncMutex<()>>>,
}

impl TemporalMemory {
    pub fn new(
        episodes: SharedEpisodeRepository,
        turns: SharedTurnRepository,
        memory: Arc<MemoryStore>,
        inference: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self { episodes, turns, memory, inference, episode_locks: DashMap::new(), creation_locks: DashMap::new() }
    }

    fn lock_for(&self, episode_id: EpisodeId) -> Arc<AsyncMutex<()>> {
        self.episode_locks.entry(episode_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn creation_lock_for(&self, user_id: &UserId, context_type: ContextType) -> Arc<AsyncMutex<()>> {
        self.creation_locks
            .entry((user_id.clone(), context_type))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Returns the user's active, non-expired episode or opens a new one.
    ///
    /// Guarded by a per-`(user_id, context_type)` lock so two concurrent
    /// callers observing no active episode can't both insert one — the only
    /// lock for the episode itself (`episode_locks`) can't exist yet for an
    /// episode that hasn't been created.
    pub async fn get_or_create_episode(&self, user_id: &UserId, context_type: ContextType) -> Result<Episode, TemporalError> {
        let creation_lock = self.creation_lock_for(user_id, context_type);
        let _guard = creation_lock.lock().await;

        let now = Utc::now();
        if let Some(episode) = self.episodes.active_for_user(user_id).await? {
            if !episode.is_expired(now) {
                return Ok(episode);
            }
            self.close_episode(&episode.id, EpisodeCloseReason::Expired).await.ok();
        }

        let episode = Episode::new(user_id.clone(), context_type, now);
        self.episodes.insert(episode.clone()).await?;
        Ok(episode)
    }

    /// Atomically append a turn, bump episode bookkeeping, and — on a
    /// detected entity mention — upsert a low-importance fact (spec §4.2).
    pub async fn append_turn(
        &self,
        episode_id: &EpisodeId,
        role: TurnRole,
        content: &str,
        tool_calls: Option<Vec<zoe_core::ToolCallRecord>>,
    ) -> Result<Turn, TemporalError> {
        let lock = self.lock_for(*episode_id);
        let _guard = lock.lock().await;

        let mut episode = self.episodes.get(episode_id).await?.ok_or(TemporalError::EpisodeNotFound)?;

        let turn = Turn {
            id: zoe_core::TurnId::new(),
            episode_id: *episode_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            tokens: None,
            tool_calls,
        };
        self.turns.append(turn.clone()).await?;

        let mentions = detect_entity_mentions(content);

        episode.last_activity_at = turn.created_at;
        episode.message_count += 1;
        episode.topics.extend(mentions.iter().cloned());
        self.episodes.update(episode.clone()).await?;

        if !mentions.is_empty() {
            let mut entity_refs = std::collections::HashSet::new();
            for mention in &mentions {
                let id = self
                    .memory
                    .upsert_entity(
                        &episode.user_id,
                        zoe_core::EntityType::Generic,
                        mention,
                        std::collections::HashSet::new(),
                        HashMap::new(),
                    )
                    .await?;
                entity_refs.insert(id);
            }
            self.memory
                .upsert_fact(&episode.user_id, content, "turn", entity_refs, APPEND_TURN_FACT_IMPORTANCE)
                .await?;
        }

        Ok(turn)
    }

    /// Summarize the last [`SUMMARY_TURN_WINDOW`] turns via the inference
    /// backend, store the summary, and transition the episode to
    /// closed/expired. Re-summarizing an already-closed episode replaces the
    /// prior summary rather than duplicating it.
    pub async fn close_episode(&self, episode_id: &EpisodeId, reason: EpisodeCloseReason) -> Result<Episode, TemporalError> {
        let lock = self.lock_for(*episode_id);
        let _guard = lock.lock().await;

        let mut episode = self.episodes.get(episode_id).await?.ok_or(TemporalError::EpisodeNotFound)?;

        let all_turns = self.turns.list_for_episode(episode_id).await?;
        let windowed = &all_turns[all_turns.len().saturating_sub(SUMMARY_TURN_WINDOW)..];

        let transcript = windowed
            .iter()
            .map(|t| format!("{:?}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");

        let summary = if transcript.is_empty() {
            String::new()
        } else {
            let messages = vec![
                Message::system("Summarize this conversation in 2-3 sentences, focusing on decisions and facts."),
                Message::user(transcript),
            ];
            self.inference
                .generate(&messages)
                .await
                .map(|r| r.text)
                .map_err(|e| TemporalError::Summarization(e.to_string()))?
        };

        episode.auto_summary = Some(summary.clone());
        episode.state = match reason {
            EpisodeCloseReason::Expired => EpisodeState::Expired,
            EpisodeCloseReason::User | EpisodeCloseReason::Manual => EpisodeState::Closed,
        };
        self.episodes.update(episode.clone()).await?;

        if !summary.is_empty() {
            let mut entity_refs = std::collections::HashSet::new();
            for mention in detect_entity_mentions(&summary) {
                let id = self
                    .memory
                    .upsert_entity(&episode.user_id, zoe_core::EntityType::Generic, &mention, std::collections::HashSet::new(), HashMap::new())
                    .await?;
                entity_refs.insert(id);
            }
            self.memory
                .replace_fact_by_source(
                    &episode.user_id,
                    &format!("episode_summary:{episode_id}"),
                    &format!("episode_summary: {summary}"),
                    entity_refs,
                    0.5,
                )
                .await?;
        }

        Ok(episode)
    }

    /// Delegates the semantic half to [`MemoryStore::search`], then
    /// intersects with turns whose `created_at` falls in `time_range`.
    pub async fn temporal_search(
        &self,
        user_id: &UserId,
        query: &str,
        time_range: TimeRange,
        limit: usize,
    ) -> Result<Vec<zoe_memory::SearchResult>, TemporalError> {
        let now = Utc::now();
        let hits = self.memory.search(user_id, query, limit * 2, None, true).await?;
        Ok(hits.into_iter().filter(|h| time_range.contains(now, h.fact.created_at)).take(limit).collect())
    }

    /// Current snapshot of an episode, for callers that need turn-count or
    /// timing bookkeeping (e.g. satisfaction sampling) without holding the
    /// per-episode lock across the whole interaction.
    pub async fn get_episode(&self, episode_id: &EpisodeId) -> Result<Option<Episode>, TemporalError> {
        self.episodes.get(episode_id).await
    }

    /// Close every active episode whose idle interval has reached its
    /// timeout. Intended to run periodically.
    pub async fn sweep_expired(&self) -> Result<usize, TemporalError> {
        let now = Utc::now();
        let active = self.episodes.all_active().await?;
        let mut closed = 0;
        for episode in active {
            if episode.is_expired(now) {
                self.close_episode(&episode.id, EpisodeCloseReason::Expired).await?;
                closed += 1;
            }
        }
        Ok(closed)
    }
}

/// Simple NER: capitalized multi-character words not at sentence start, plus
/// any `@mention`-style explicit tag. Good enough to seed entity_refs; not a
/// substitute for a real NER model.
fn detect_entity_mentions(text: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    for (i, word) in text.split_whitespace().enumerate() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '@');
        if let Some(tag) = trimmed.strip_prefix('@') {
            if !tag.is_empty() {
                mentions.push(tag.to_string());
            }
            continue;
        }
        if i == 0 || trimmed.len() < 2 {
            continue;
        }
        if trimmed.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) && trimmed.chars().skip(1).any(|c| c.is_lowercase()) {
            mentions.push(trimmed.to_string());
        }
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_capitalized_words_as_mentions() {
        let mentions = detect_entity_mentions("I spoke with Alice about the Project Phoenix launch");
        assert!(mentions.contains(&"Alice".to_string()));
        assert!(mentions.contains(&"Project".to_string()));
    }

    #[test]
    fn detects_at_tags() {
        let mentions = detect_entity_mentions("ping @bob about the release");
        assert_eq!(mentions, vec!["bob".to_string()]);
    }

    #[test]
    fn time_range_today_excludes_yesterday() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        assert!(!TimeRange::Today.contains(now, yesterday));
        assert!(TimeRange::Today.contains(now, now));
    }

    #[test]
    fn time_range_all_contains_everything() {
        let now = Utc::now();
        assert!(TimeRange::All.contains(now, now - Duration::days(400)));
    }
}
