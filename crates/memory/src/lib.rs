//! User-scoped fact and entity store with semantic search (spec §4.1, "Light RAG").
//!
//! Facts and entities live per-user; every search, upsert and decay sweep is
//! scoped to a single `UserId` and never crosses users.

pub mod embeddings;
pub mod error;
pub mod repository;
pub mod store;
pub mod types;

pub use embeddings::{Embedder, EmbeddingConfig, HashEmbedder};
pub use error::MemoryError;
pub use repository::{
    EntityRepository, FactRepository, InMemoryEntityRepository, InMemoryFactRepository,
    InMemoryRelationshipRepository, RelationshipRepository, SharedEntityRepository, SharedFactRepository,
    SharedRelationshipRepository,
};
pub use store::{MemoryStats, MemoryStore};
pub use types::SearchResult;
