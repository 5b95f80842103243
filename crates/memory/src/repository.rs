//! Storage seams for facts, entities and relationships.
//!
//! `zoe-memory` owns these traits; `zoe-persistence` implements ScyllaDB-backed
//! versions of them. The in-memory implementations here are the default and
//! what the test suite runs against, mirroring the teacher's swappable
//! store pattern (in-memory map vs. `Scylla*Store`).

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use zoe_core::{Entity, EntityId, FactId, MemoryFact, Relationship, UserId};

use crate::MemoryError;

#[async_trait]
pub trait FactRepository: Send + Sync {
    async fn insert(&self, fact: MemoryFact) -> Result<(), MemoryError>;
    async fn get(&self, user_id: &UserId, id: &FactId) -> Result<Option<MemoryFact>, MemoryError>;
    async fn find_by_text(&self, user_id: &UserId, text: &str) -> Result<Option<MemoryFact>, MemoryError>;
    async fn find_by_source(&self, user_id: &UserId, source: &str) -> Result<Option<MemoryFact>, MemoryError>;
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<MemoryFact>, MemoryError>;
    async fn list_by_ids(&self, user_id: &UserId, ids: &[FactId]) -> Result<Vec<MemoryFact>, MemoryError>;
    async fn update(&self, fact: MemoryFact) -> Result<(), MemoryError>;
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn insert(&self, entity: Entity) -> Result<(), MemoryError>;
    async fn get(&self, user_id: &UserId, id: &EntityId) -> Result<Option<Entity>, MemoryError>;
    async fn find_by_alias(
        &self,
        user_id: &UserId,
        entity_type: zoe_core::EntityType,
        alias_or_name: &str,
    ) -> Result<Option<Entity>, MemoryError>;
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Entity>, MemoryError>;
    async fn update(&self, entity: Entity) -> Result<(), MemoryError>;
}

#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    async fn insert(&self, user_id: &UserId, relationship: Relationship) -> Result<(), MemoryError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Relationship>, MemoryError>;
    /// Relationships touching any of `entity_ids`, in either direction.
    async fn list_touching(&self, user_id: &UserId, entity_ids: &HashSet<EntityId>) -> Result<Vec<Relationship>, MemoryError>;
}

#[derive(Default)]
pub struct InMemoryFactRepository {
    facts: DashMap<(UserId, FactId), MemoryFact>,
}

impl InMemoryFactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactRepository for InMemoryFactRepository {
    async fn insert(&self, fact: MemoryFact) -> Result<(), MemoryError> {
        self.facts.insert((fact.user_id.clone(), fact.id.clone()), fact);
        Ok(())
    }

    async fn get(&self, user_id: &UserId, id: &FactId) -> Result<Option<MemoryFact>, MemoryError> {
        Ok(self.facts.get(&(user_id.clone(), id.clone())).map(|r| r.clone()))
    }

    async fn find_by_text(&self, user_id: &UserId, text: &str) -> Result<Option<MemoryFact>, MemoryError> {
        Ok(self
            .facts
            .iter()
            .find(|entry| entry.key().0 == *user_id && entry.value().text == text)
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_source(&self, user_id: &UserId, source: &str) -> Result<Option<MemoryFact>, MemoryError> {
        Ok(self
            .facts
            .iter()
            .find(|entry| entry.key().0 == *user_id && entry.value().source == source)
            .map(|entry| entry.value().clone()))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<MemoryFact>, MemoryError> {
        Ok(self.facts.iter().filter(|e| e.key().0 == *user_id).map(|e| e.value().clone()).collect())
    }

    async fn list_by_ids(&self, user_id: &UserId, ids: &[FactId]) -> Result<Vec<MemoryFact>, MemoryError> {
        Ok(ids.iter().filter_map(|id| self.facts.get(&(user_id.clone(), id.clone())).map(|r| r.clone())).collect())
    }

    async fn update(&self, fact: MemoryFact) -> Result<(), MemoryError> {
        self.facts.insert((fact.user_id.clone(), fact.id.clone()), fact);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEntityRepository {
    entities: DashMap<(UserId, EntityId), Entity>,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    async fn insert(&self, entity: Entity) -> Result<(), MemoryError> {
        self.entities.insert((entity.user_id.clone(), entity.id.clone()), entity);
        Ok(())
    }

    async fn get(&self, user_id: &UserId, id: &EntityId) -> Result<Option<Entity>, MemoryError> {
        Ok(self.entities.get(&(user_id.clone(), id.clone())).map(|r| r.clone()))
    }

    async fn find_by_alias(
        &self,
        user_id: &UserId,
        entity_type: zoe_core::EntityType,
        alias_or_name: &str,
    ) -> Result<Option<Entity>, MemoryError> {
        let needle = alias_or_name.to_lowercase();
        Ok(self
            .entities
            .iter()
            .find(|entry| {
                let e = entry.value();
                e.user_id == *user_id
                    && e.entity_type == entity_type
                    && (e.canonical_name.to_lowercase() == needle
                        || e.aliases.iter().any(|a| a.to_lowercase() == needle))
            })
            .map(|entry| entry.value().clone()))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Entity>, MemoryError> {
        Ok(self.entities.iter().filter(|e| e.key().0 == *user_id).map(|e| e.value().clone()).collect())
    }

    async fn update(&self, entity: Entity) -> Result<(), MemoryError> {
        self.entities.insert((entity.user_id.clone(), entity.id.clone()), entity);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRelationshipRepository {
    relationships: DashMap<UserId, Vec<Relationship>>,
}

impl InMemoryRelationshipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipRepository for InMemoryRelationshipRepository {
    async fn insert(&self, user_id: &UserId, relationship: Relationship) -> Result<(), MemoryError> {
        self.relationships.entry(user_id.clone()).or_default().push(relationship);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Relationship>, MemoryError> {
        Ok(self.relationships.get(user_id).map(|r| r.clone()).unwrap_or_default())
    }

    async fn list_touching(&self, user_id: &UserId, entity_ids: &HashSet<EntityId>) -> Result<Vec<Relationship>, MemoryError> {
        let all = self.list_for_user(user_id).await?;
        Ok(all
            .into_iter()
            .filter(|r| entity_ids.contains(&r.from_entity_id) || entity_ids.contains(&r.to_entity_id))
            .collect())
    }
}

pub type SharedFactRepository = Arc<dyn FactRepository>;
pub type SharedEntityRepository = Arc<dyn EntityRepository>;
pub type SharedRelationshipRepository = Arc<dyn RelationshipRepository>;
