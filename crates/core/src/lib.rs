//! Core traits and types for the Zoe conversation core
//!
//! Foundational types shared by every other crate: ids scoped by user,
//! the error taxonomy, and the domain entities from the data model.

pub mod error;
pub mod ids;
pub mod model;

pub use error::{CoreError, ErrorKind};
pub use ids::{EntityId, EpisodeId, FactId, SessionId, TurnId, UserId};
pub use model::{
    ContextCacheEntry, ContextType, Entity, EntityType, Episode, EpisodeCloseReason,
    EpisodeState, FeedbackKind, FeedbackRecord, MemoryFact, Relationship, Session,
    SessionMessage, ToolCallRecord, Turn, TurnRole, DECAY_HALF_LIFE_DAYS,
};
