//! JSON response shapes for types in component crates that don't carry
//! `Serialize` themselves (e.g. [`zoe_memory::SearchResult`], which holds a
//! raw embedding vector that has no reason to cross the wire).

use serde::Serialize;

use zoe_core::EntityId;
use zoe_memory::SearchResult;

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub fact_id: String,
    pub text: String,
    pub score: f32,
    pub importance: f32,
    pub source: String,
    pub path: Vec<String>,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            fact_id: result.fact.id.to_string(),
            text: result.fact.text,
            score: result.score,
            importance: result.fact.importance,
            source: result.fact.source,
            path: result.path.iter().map(EntityId::to_string).collect(),
        }
    }
}
