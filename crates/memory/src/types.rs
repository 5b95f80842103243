use zoe_core::{EntityId, MemoryFact};

/// One scored hit from [`crate::store::MemoryStore::search`]. `path` names
/// the relationship chain (if any) that contributed the boost.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub fact: MemoryFact,
    pub score: f32,
    pub path: Vec<EntityId>,
}
