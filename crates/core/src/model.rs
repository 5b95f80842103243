//! Domain entities from the data model (spec §3). These are storage-agnostic;
//! `zoe-persistence` maps them onto ScyllaDB tables and `zoe-memory` onto
//! Qdrant points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::ids::{EntityId, EpisodeId, FactId, SessionId, TurnId};
use crate::UserId;

/// Episode context type; determines the idle timeout (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Chat,
    Planning,
    Development,
    General,
}

impl ContextType {
    /// Idle timeout in minutes, per spec §4.2's context-type table.
    pub fn default_timeout_minutes(self) -> i64 {
        match self {
            ContextType::Chat => 30,
            ContextType::General => 45,
            ContextType::Planning => 60,
            ContextType::Development => 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeState {
    Active,
    Closed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeCloseReason {
    User,
    Expired,
    Manual,
}

/// A bounded conversation context window (spec §3 Episode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub user_id: UserId,
    pub context_type: ContextType,
    pub state: EpisodeState,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub timeout_minutes: i64,
    pub message_count: u32,
    pub auto_summary: Option<String>,
    pub topics: HashSet<String>,
}

impl Episode {
    pub fn new(user_id: UserId, context_type: ContextType, now: DateTime<Utc>) -> Self {
        Self {
            id: EpisodeId::new(),
            user_id,
            context_type,
            state: EpisodeState::Active,
            started_at: now,
            last_activity_at: now,
            timeout_minutes: context_type.default_timeout_minutes(),
            message_count: 0,
            auto_summary: None,
            topics: HashSet::new(),
        }
    }

    pub fn idle_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity_at).num_minutes()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == EpisodeState::Active && self.idle_minutes(now) >= self.timeout_minutes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub args_digest: String,
    pub outcome: String,
}

/// One user/assistant/tool exchange inside an episode (spec §3 Turn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub episode_id: EpisodeId,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub tokens: Option<u32>,
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

/// A RAG-stored statement with semantic embedding (spec §3 Memory Fact).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: FactId,
    pub user_id: UserId,
    pub text: String,
    pub source: String,
    pub entity_refs: HashSet<EntityId>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u32,
    pub importance: f32,
    pub embedding: Vec<f32>,
}

/// Half-life used by the decay formula (spec §3): 30 days.
pub const DECAY_HALF_LIFE_DAYS: f64 = 30.0;

impl MemoryFact {
    /// `decay_score = importance * exp(-Δdays / half_life_days)`.
    pub fn decay_score(&self, now: DateTime<Utc>, half_life_days: f64) -> f32 {
        let delta_days = (now - self.created_at).num_seconds() as f64 / 86_400.0;
        let decay = (-delta_days / half_life_days).exp();
        self.importance * decay as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Project,
    Place,
    Item,
    Generic,
}

/// A first-class subject of memory (spec §3 Entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub user_id: UserId,
    pub entity_type: EntityType,
    pub canonical_name: String,
    pub aliases: HashSet<String>,
    pub attributes: HashMap<String, String>,
    pub embedding: Vec<f32>,
}

/// A directed tie between two entities belonging to the same user (spec §3 Relationship).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub from_entity_id: EntityId,
    pub to_entity_id: EntityId,
    pub label: String,
    pub weight: f32,
    pub created_at: DateTime<Utc>,
}

/// Summarized enrichment payload, keyed by fingerprint (spec §3 Context Cache Entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCacheEntry {
    pub fingerprint: String,
    pub summary_text: String,
    pub source_kinds: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    pub hits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    ThumbsUp,
    ThumbsDown,
    Rating,
    Implicit,
}

/// A user satisfaction signal (spec §3 Feedback Record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub turn_id: Option<TurnId>,
    pub kind: FeedbackKind,
    pub value: f32,
    pub factors: Option<HashMap<String, f32>>,
    pub created_at: DateTime<Utc>,
}

/// A persisted conversation for UI resume, distinct from Episode (spec §3 Session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub title: String,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<SessionMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_type_timeouts_match_spec() {
        assert_eq!(ContextType::Chat.default_timeout_minutes(), 30);
        assert_eq!(ContextType::General.default_timeout_minutes(), 45);
        assert_eq!(ContextType::Planning.default_timeout_minutes(), 60);
        assert_eq!(ContextType::Development.default_timeout_minutes(), 120);
    }

    #[test]
    fn decay_is_non_increasing_in_delta_days() {
        let now = Utc::now();
        let fact = MemoryFact {
            id: FactId::new(),
            user_id: UserId::new("u1"),
            text: "x".into(),
            source: "test".into(),
            entity_refs: HashSet::new(),
            created_at: now - chrono::Duration::days(10),
            last_accessed_at: now,
            access_count: 0,
            importance: 0.8,
            embedding: vec![],
        };
        let near = fact.decay_score(now, DECAY_HALF_LIFE_DAYS);
        let far = fact.decay_score(now + chrono::Duration::days(30), DECAY_HALF_LIFE_DAYS);
        assert!(far <= near);
    }

    #[test]
    fn episode_expiry_uses_idle_interval() {
        let now = Utc::now();
        let mut ep = Episode::new(UserId::new("u1"), ContextType::Chat, now);
        assert!(!ep.is_expired(now));
        ep.last_activity_at = now - chrono::Duration::minutes(31);
        assert!(ep.is_expired(now));
    }
}
