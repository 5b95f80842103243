//! ScyllaDB persistence layer for the Zoe conversation core.
//!
//! Every component crate (`zoe-memory`, `zoe-temporal`, `zoe-satisfaction`)
//! owns its own repository traits against an in-process default; this crate
//! supplies the ScyllaDB-backed implementations of those same traits, plus a
//! chat session store and a generic audit trail that have no component-crate
//! home of their own.

pub mod audit;
pub mod client;
pub mod enum_str;
pub mod error;
pub mod memory;
pub mod satisfaction;
pub mod schema;
pub mod sessions;
pub mod temporal;

pub use audit::{AuditEntry, AuditLog, InMemoryAuditLog, ScyllaAuditLog};
pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use memory::{ScyllaEntityRepository, ScyllaFactRepository, ScyllaRelationshipRepository};
pub use satisfaction::{ScyllaFeedbackRepository, ScyllaInteractionRepository};
pub use sessions::ScyllaChatSessionStore;
pub use temporal::{ScyllaEpisodeRepository, ScyllaTurnRepository};

/// Connects to ScyllaDB, ensures the keyspace and tables exist, and wires up
/// every repository this crate provides.
pub async fn init(config: ScyllaConfig) -> Result<PersistenceLayer, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        facts: ScyllaFactRepository::new(client.clone()),
        entities: ScyllaEntityRepository::new(client.clone()),
        relationships: ScyllaRelationshipRepository::new(client.clone()),
        episodes: ScyllaEpisodeRepository::new(client.clone()),
        turns: ScyllaTurnRepository::new(client.clone()),
        feedback: ScyllaFeedbackRepository::new(client.clone()),
        interactions: ScyllaInteractionRepository::new(client.clone()),
        chat_sessions: ScyllaChatSessionStore::new(client.clone()),
        audit: ScyllaAuditLog::new(client),
    })
}

/// Combined persistence layer bundling every Scylla-backed store.
pub struct PersistenceLayer {
    pub facts: ScyllaFactRepository,
    pub entities: ScyllaEntityRepository,
    pub relationships: ScyllaRelationshipRepository,
    pub episodes: ScyllaEpisodeRepository,
    pub turns: ScyllaTurnRepository,
    pub feedback: ScyllaFeedbackRepository,
    pub interactions: ScyllaInteractionRepository,
    pub chat_sessions: ScyllaChatSessionStore,
    pub audit: ScyllaAuditLog,
}
