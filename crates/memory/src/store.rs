//! Fact and entity store: semantic search with relationship-aware re-ranking,
//! entity merge-on-alias-collision, and decay scoring (spec §4.1).

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

use zoe_core::{Entity, EntityId, EntityType, FactId, MemoryFact, Relationship, UserId, DECAY_HALF_LIFE_DAYS};

use crate::embeddings::Embedder;
use crate::repository::{SharedEntityRepository, SharedFactRepository, SharedRelationshipRepository};
use crate::types::SearchResult;
use crate::MemoryError;

const QUERY_CACHE_TTL: Duration = Duration::from_secs(60);
const RELATIONSHIP_BOOST_PER_WEIGHT: f32 = 0.1;
const DEFAULT_MIN_SIMILARITY: f32 = 0.3;
const CONTEXTUAL_ENTITY_TOP_N: usize = 10;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

pub struct MemoryStore {
    embedder: Arc<Embedder>,
    facts: SharedFactRepository,
    entities: SharedEntityRepository,
    relationships: SharedRelationshipRepository,
    user_locks: DashMap<UserId, Arc<AsyncMutex<()>>>,
    query_cache: DashMap<(UserId, String), (Instant, Vec<CachedHit>)>,
}

/// Only the fact id and score are cached; facts are re-fetched fresh on a
/// cache hit so the returned content reflects any concurrent mutation.
#[derive(Debug, Clone)]
struct CachedHit {
    fact_id: FactId,
    score: f32,
    path: Vec<EntityId>,
}

impl MemoryStore {
    pub fn new(
        embedder: Arc<Embedder>,
        facts: SharedFactRepository,
        entities: SharedEntityRepository,
        relationships: SharedRelationshipRepository,
    ) -> Self {
        Self {
            embedder,
            facts,
            entities,
            relationships,
            user_locks: DashMap::new(),
            query_cache: DashMap::new(),
        }
    }

    fn lock_for(&self, user_id: &UserId) -> Arc<AsyncMutex<()>> {
        self.user_locks.entry(user_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Embed `text` synchronously and write an atomic, idempotent fact. If
    /// `(user_id, text)` already exists exactly, returns the existing id
    /// rather than inserting a duplicate.
    pub async fn upsert_fact(
        &self,
        user_id: &UserId,
        text: &str,
        source: &str,
        entity_refs: HashSet<EntityId>,
        importance: f32,
    ) -> Result<FactId, MemoryError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.facts.find_by_text(user_id, text).await? {
            return Ok(existing.id);
        }

        let embedding = self.embedder.embed(text)?;
        let now = chrono::Utc::now();
        let fact = MemoryFact {
            id: FactId::new(),
            user_id: user_id.clone(),
            text: text.to_string(),
            source: source.to_string(),
            entity_refs,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            importance,
            embedding,
        };
        let id = fact.id;
        self.facts.insert(fact).await?;
        self.invalidate_query_cache(user_id);
        Ok(id)
    }

    /// Like [`Self::upsert_fact`] but keyed by `source` rather than exact
    /// text: a prior fact with the same `source` is overwritten in place.
    /// Used for append-only-but-idempotent summaries (spec §4.2) where the
    /// text legitimately changes between re-summarizations.
    pub async fn replace_fact_by_source(
        &self,
        user_id: &UserId,
        source: &str,
        text: &str,
        entity_refs: HashSet<EntityId>,
        importance: f32,
    ) -> Result<FactId, MemoryError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let embedding = self.embedder.embed(text)?;
        let now = chrono::Utc::now();

        if let Some(mut existing) = self.facts.find_by_source(user_id, source).await? {
            existing.text = text.to_string();
            existing.entity_refs = entity_refs;
            existing.importance = importance;
            existing.embedding = embedding;
            existing.last_accessed_at = now;
            let id = existing.id;
            self.facts.update(existing).await?;
            self.invalidate_query_cache(user_id);
            return Ok(id);
        }

        let fact = MemoryFact {
            id: FactId::new(),
            user_id: user_id.clone(),
            text: text.to_string(),
            source: source.to_string(),
            entity_refs,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            importance,
            embedding,
        };
        let id = fact.id;
        self.facts.insert(fact).await?;
        self.invalidate_query_cache(user_id);
        Ok(id)
    }

    /// Merge rule: an alias colliding with an existing entity's canonical
    /// name or alias (same user + type) merges into it — aliases union,
    /// attribute keys union, new values win on conflict.
    pub async fn upsert_entity(
        &self,
        user_id: &UserId,
        entity_type: EntityType,
        canonical_name: &str,
        aliases: HashSet<String>,
        attributes: std::collections::HashMap<String, String>,
    ) -> Result<EntityId, MemoryError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut candidates = vec![canonical_name.to_string()];
        candidates.extend(aliases.iter().cloned());

        let mut existing = None;
        for candidate in &candidates {
            if let Some(found) = self.entities.find_by_alias(user_id, entity_type, candidate).await? {
                existing = Some(found);
                break;
            }
        }

        if let Some(mut entity) = existing {
            entity.aliases.insert(canonical_name.to_string());
            entity.aliases.extend(aliases);
            for (k, v) in attributes {
                entity.attributes.insert(k, v);
            }
            let id = entity.id;
            self.entities.update(entity).await?;
            return Ok(id);
        }

        let embedding = self.embedder.embed(canonical_name)?;
        let entity = Entity {
            id: EntityId::new(),
            user_id: user_id.clone(),
            entity_type,
            canonical_name: canonical_name.to_string(),
            aliases,
            attributes,
            embedding,
        };
        let id = entity.id;
        self.entities.insert(entity).await?;
        Ok(id)
    }

    /// Record a directed tie between two of a user's entities (e.g. from
    /// simple NER during `append_turn` in the temporal memory crate).
    pub async fn link_entities(
        &self,
        user_id: &UserId,
        from_entity_id: EntityId,
        to_entity_id: EntityId,
        label: impl Into<String>,
        weight: f32,
    ) -> Result<(), MemoryError> {
        let relationship = Relationship {
            from_entity_id,
            to_entity_id,
            label: label.into(),
            weight,
            created_at: chrono::Utc::now(),
        };
        self.relationships.insert(user_id, relationship).await
    }

    /// Ranked semantic search over a user's facts, boosted by relationships
    /// between query-matched entities and each candidate's `entity_refs`.
    pub async fn search(
        &self,
        user_id: &UserId,
        query: &str,
        limit: usize,
        min_similarity: Option<f32>,
        boost_relationships: bool,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        let min_similarity = min_similarity.unwrap_or(DEFAULT_MIN_SIMILARITY);
        let cache_key = (user_id.clone(), query.to_string());

        if let Some(entry) = self.query_cache.get(&cache_key) {
            let (cached_at, hits) = &*entry;
            if cached_at.elapsed() < QUERY_CACHE_TTL {
                return self.rehydrate_cached(user_id, hits, limit).await;
            }
        }

        let results = match self.search_uncached(user_id, query, limit, min_similarity, boost_relationships).await {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!(error = %err, "semantic search failed, falling back to lexical substring match");
                self.lexical_fallback(user_id, query, limit).await?
            }
        };

        let cached: Vec<CachedHit> =
            results.iter().map(|r| CachedHit { fact_id: r.fact.id, score: r.score, path: r.path.clone() }).collect();
        self.query_cache.insert(cache_key, (Instant::now(), cached));

        Ok(results)
    }

    async fn rehydrate_cached(
        &self,
        user_id: &UserId,
        hits: &[CachedHit],
        limit: usize,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        let ids: Vec<FactId> = hits.iter().map(|h| h.fact_id).collect();
        let facts = self.facts.list_by_ids(user_id, &ids).await?;
        let mut by_id = std::collections::HashMap::new();
        for fact in facts {
            by_id.insert(fact.id, fact);
        }
        Ok(hits
            .iter()
            .filter_map(|h| by_id.get(&h.fact_id).map(|f| SearchResult { fact: f.clone(), score: h.score, path: h.path.clone() }))
            .take(limit)
            .collect())
    }

    async fn search_uncached(
        &self,
        user_id: &UserId,
        query: &str,
        limit: usize,
        min_similarity: f32,
        boost_relationships: bool,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        let query_embedding = self.embedder.embed(query)?;
        let facts = self.facts.list_by_user(user_id).await?;

        let top_k = (4 * limit).max(50);
        let mut scored: Vec<(MemoryFact, f32)> = facts
            .into_iter()
            .map(|f| {
                let score = cosine_similarity(&query_embedding, &f.embedding);
                (f, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        let mut paths: std::collections::HashMap<FactId, Vec<EntityId>> = std::collections::HashMap::new();

        if boost_relationships {
            let query_matched_entities = self.entities_mentioned_in(user_id, query).await?;
            if !query_matched_entities.is_empty() {
                let mut all_entity_ids: HashSet<EntityId> = query_matched_entities.iter().map(|e| e.id).collect();
                for (fact, _) in &scored {
                    all_entity_ids.extend(fact.entity_refs.iter().copied());
                }
                let relationships = self.relationships.list_touching(user_id, &all_entity_ids).await?;
                let query_matched_ids: HashSet<EntityId> = query_matched_entities.iter().map(|e| e.id).collect();

                for (fact, score) in &mut scored {
                    let (boost, path) = relationship_boost(&relationships, &query_matched_ids, &fact.entity_refs);
                    if boost > 0.0 {
                        *score = (*score + boost).min(1.0);
                        paths.insert(fact.id, path);
                    }
                }
            }
        }

        let mut filtered: Vec<(MemoryFact, f32)> = scored.into_iter().filter(|(_, score)| *score >= min_similarity).collect();

        filtered.sort_by(|(fa, sa), (fb, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| fb.last_accessed_at.cmp(&fa.last_accessed_at))
                .then_with(|| sb_importance(fb).partial_cmp(&sb_importance(fa)).unwrap_or(std::cmp::Ordering::Equal))
        });
        filtered.truncate(limit);

        let now = chrono::Utc::now();
        let mut results = Vec::with_capacity(filtered.len());
        for (mut fact, score) in filtered {
            fact.last_accessed_at = now;
            fact.access_count += 1;
            let path = paths.remove(&fact.id).unwrap_or_default();
            self.facts.update(fact.clone()).await?;
            results.push(SearchResult { fact, score, path });
        }

        Ok(results)
    }

    async fn entities_mentioned_in(&self, user_id: &UserId, query: &str) -> Result<Vec<Entity>, MemoryError> {
        let needle = query.to_lowercase();
        let entities = self.entities.list_by_user(user_id).await?;
        Ok(entities
            .into_iter()
            .filter(|e| {
                needle.contains(&e.canonical_name.to_lowercase())
                    || e.aliases.iter().any(|a| needle.contains(&a.to_lowercase()))
            })
            .collect())
    }

    async fn lexical_fallback(&self, user_id: &UserId, query: &str, limit: usize) -> Result<Vec<SearchResult>, MemoryError> {
        let needle = query.to_lowercase();
        let facts = self.facts.list_by_user(user_id).await?;
        Ok(facts
            .into_iter()
            .filter(|f| f.text.to_lowercase().contains(&needle))
            .take(limit)
            .map(|fact| SearchResult { fact, score: DEFAULT_MIN_SIMILARITY, path: Vec::new() })
            .collect())
    }

    fn invalidate_query_cache(&self, user_id: &UserId) {
        self.query_cache.retain(|(uid, _), _| uid != user_id);
    }

    /// The entity plus its top facts (by decay score, descending).
    pub async fn contextual_entity(&self, user_id: &UserId, entity_name: &str) -> Result<Option<(Entity, Vec<MemoryFact>)>, MemoryError> {
        let entities = self.entities.list_by_user(user_id).await?;
        let needle = entity_name.to_lowercase();
        let Some(entity) = entities
            .into_iter()
            .find(|e| e.canonical_name.to_lowercase() == needle || e.aliases.iter().any(|a| a.to_lowercase() == needle))
        else {
            return Ok(None);
        };

        let facts = self.facts.list_by_user(user_id).await?;
        let now = chrono::Utc::now();
        let mut matching: Vec<MemoryFact> = facts.into_iter().filter(|f| f.entity_refs.contains(&entity.id)).collect();
        matching.sort_by(|a, b| {
            b.decay_score(now, DECAY_HALF_LIFE_DAYS)
                .partial_cmp(&a.decay_score(now, DECAY_HALF_LIFE_DAYS))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matching.truncate(CONTEXTUAL_ENTITY_TOP_N);

        Ok(Some((entity, matching)))
    }

    /// Recompute each fact's decay score. Pure function of `importance` and
    /// `created_at`, so recomputation never mutates storage and is
    /// trivially idempotent; callers (e.g. a daily sweep) use the result for
    /// ranking or pruning decisions.
    pub async fn apply_decay(&self, user_id: &UserId) -> Result<Vec<(FactId, f32)>, MemoryError> {
        let facts = self.facts.list_by_user(user_id).await?;
        let now = chrono::Utc::now();
        Ok(facts.iter().map(|f| (f.id, f.decay_score(now, DECAY_HALF_LIFE_DAYS))).collect())
    }

    /// Fact/entity/relationship counts for one user (`GET
    /// /api/memories/stats/light-rag`).
    pub async fn stats(&self, user_id: &UserId) -> Result<MemoryStats, MemoryError> {
        let facts = self.facts.list_by_user(user_id).await?;
        let entities = self.entities.list_by_user(user_id).await?;
        let relationships = self.relationships.list_for_user(user_id).await?;
        let mean_importance = if facts.is_empty() {
            0.0
        } else {
            facts.iter().map(|f| f.importance).sum::<f32>() / facts.len() as f32
        };
        Ok(MemoryStats { fact_count: facts.len(), entity_count: entities.len(), relationship_count: relationships.len(), mean_importance })
    }
}

/// Aggregate counts returned by [`MemoryStore::stats`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MemoryStats {
    pub fact_count: usize,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub mean_importance: f32,
}

fn sb_importance(fact: &MemoryFact) -> f32 {
    fact.importance
}

fn relationship_boost(
    relationships: &[Relationship],
    query_matched_ids: &HashSet<EntityId>,
    fact_entity_refs: &HashSet<EntityId>,
) -> (f32, Vec<EntityId>) {
    let mut max_weight = 0.0f32;
    let mut path = Vec::new();

    for rel in relationships {
        let connects = (query_matched_ids.contains(&rel.from_entity_id) && fact_entity_refs.contains(&rel.to_entity_id))
            || (query_matched_ids.contains(&rel.to_entity_id) && fact_entity_refs.contains(&rel.from_entity_id));
        if connects && rel.weight > max_weight {
            max_weight = rel.weight;
            path = vec![rel.from_entity_id, rel.to_entity_id];
        }
    }

    (RELATIONSHIP_BOOST_PER_WEIGHT * max_weight, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;
    use crate::repository::{InMemoryEntityRepository, InMemoryFactRepository, InMemoryRelationshipRepository};

    fn new_store() -> MemoryStore {
        let embedder = Arc::new(Embedder::new("", "", EmbeddingConfig::default()).unwrap());
        MemoryStore::new(
            embedder,
            Arc::new(InMemoryFactRepository::new()),
            Arc::new(InMemoryEntityRepository::new()),
            Arc::new(InMemoryRelationshipRepository::new()),
        )
    }

    #[tokio::test]
    async fn upsert_fact_is_idempotent_on_exact_text_collision() {
        let store = new_store();
        let user = UserId::new("u1");
        let id1 = store.upsert_fact(&user, "likes tea", "chat", HashSet::new(), 0.5).await.unwrap();
        let id2 = store.upsert_fact(&user, "likes tea", "chat", HashSet::new(), 0.9).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn upsert_entity_merges_on_alias_collision() {
        let store = new_store();
        let user = UserId::new("u1");
        let id1 = store
            .upsert_entity(&user, EntityType::Person, "Bob", HashSet::from(["Bobby".to_string()]), Default::default())
            .await
            .unwrap();
        let id2 = store
            .upsert_entity(&user, EntityType::Person, "Bobby", HashSet::new(), Default::default())
            .await
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn search_filters_below_min_similarity() {
        let store = new_store();
        let user = UserId::new("u1");
        store.upsert_fact(&user, "the sky is blue", "chat", HashSet::new(), 0.5).await.unwrap();
        let results = store.search(&user, "completely unrelated gibberish zzz", 5, Some(0.99), false).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_returns_exact_match_with_high_score() {
        let store = new_store();
        let user = UserId::new("u1");
        store.upsert_fact(&user, "user prefers dark mode", "chat", HashSet::new(), 0.5).await.unwrap();
        let results = store.search(&user, "user prefers dark mode", 5, None, false).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score > 0.99);
    }
}
