//! ScyllaDB-backed [`FactRepository`]/[`EntityRepository`]/[`RelationshipRepository`]
//! (spec §4.1), swappable with `zoe_memory`'s `InMemory*` defaults behind the
//! same traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use zoe_core::{Entity, EntityId, EntityType, FactId, MemoryFact, Relationship, UserId};
use zoe_memory::{EntityRepository, FactRepository, MemoryError, RelationshipRepository};

use crate::client::ScyllaClient;
use crate::enum_str::{from_text, to_text};
use crate::error::PersistenceError;

impl From<PersistenceError> for MemoryError {
    fn from(err: PersistenceError) -> Self {
        MemoryError::Connection(err.to_string())
    }
}

#[derive(Clone)]
pub struct ScyllaFactRepository {
    client: ScyllaClient,
}

impl ScyllaFactRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_fact(&self, row: scylla::frame::response::result::Row) -> Result<MemoryFact, PersistenceError> {
        let (user_id, fact_id, text, source, data_json): (String, Uuid, String, String, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        let mut fact: MemoryFact = serde_json::from_str(&data_json)?;
        fact.user_id = UserId::new(user_id);
        fact.id = FactId(fact_id);
        fact.text = text;
        fact.source = source;
        Ok(fact)
    }
}

#[async_trait]
impl FactRepository for ScyllaFactRepository {
    async fn insert(&self, fact: MemoryFact) -> Result<(), MemoryError> {
        let query = format!(
            "INSERT INTO {}.memory_facts (user_id, fact_id, text, source, data_json) VALUES (?, ?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (fact.user_id.as_str(), fact.id.0, &fact.text, &fact.source, serde_json::to_string(&fact).map_err(|e| MemoryError::Storage(e.to_string()))?),
            )
            .await
            .map_err(|e| PersistenceError::from(e))?;
        Ok(())
    }

    async fn get(&self, user_id: &UserId, id: &FactId) -> Result<Option<MemoryFact>, MemoryError> {
        let query =
            format!("SELECT user_id, fact_id, text, source, data_json FROM {}.memory_facts WHERE user_id = ? AND fact_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (user_id.as_str(), id.0)).await.map_err(PersistenceError::from)?;
        match result.rows {
            Some(rows) => rows.into_iter().next().map(|r| self.row_to_fact(r)).transpose().map_err(MemoryError::from),
            None => Ok(None),
        }
    }

    async fn find_by_text(&self, user_id: &UserId, text: &str) -> Result<Option<MemoryFact>, MemoryError> {
        Ok(self.list_by_user(user_id).await?.into_iter().find(|f| f.text == text))
    }

    async fn find_by_source(&self, user_id: &UserId, source: &str) -> Result<Option<MemoryFact>, MemoryError> {
        Ok(self.list_by_user(user_id).await?.into_iter().find(|f| f.source == source))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<MemoryFact>, MemoryError> {
        let query = format!("SELECT user_id, fact_id, text, source, data_json FROM {}.memory_facts WHERE user_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await.map_err(PersistenceError::from)?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_fact(r)).collect::<Result<_, _>>().map_err(MemoryError::from)
    }

    async fn list_by_ids(&self, user_id: &UserId, ids: &[FactId]) -> Result<Vec<MemoryFact>, MemoryError> {
        let all = self.list_by_user(user_id).await?;
        Ok(all.into_iter().filter(|f| ids.contains(&f.id)).collect())
    }

    async fn update(&self, fact: MemoryFact) -> Result<(), MemoryError> {
        self.insert(fact).await
    }
}

#[derive(Clone)]
pub struct ScyllaEntityRepository {
    client: ScyllaClient,
}

impl ScyllaEntityRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_entity(&self, row: scylla::frame::response::result::Row) -> Result<Entity, PersistenceError> {
        let (user_id, entity_id, entity_type, canonical_name, data_json): (String, Uuid, String, String, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        let mut entity: Entity = serde_json::from_str(&data_json)?;
        entity.user_id = UserId::new(user_id);
        entity.id = EntityId(entity_id);
        entity.entity_type = from_text(&entity_type)?;
        entity.canonical_name = canonical_name;
        Ok(entity)
    }
}

#[async_trait]
impl EntityRepository for ScyllaEntityRepository {
    async fn insert(&self, entity: Entity) -> Result<(), MemoryError> {
        let query = format!(
            "INSERT INTO {}.entities (user_id, entity_id, entity_type, canonical_name, data_json) VALUES (?, ?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    entity.user_id.as_str(),
                    entity.id.0,
                    to_text(&entity.entity_type),
                    &entity.canonical_name,
                    serde_json::to_string(&entity).map_err(|e| MemoryError::Storage(e.to_string()))?,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn get(&self, user_id: &UserId, id: &EntityId) -> Result<Option<Entity>, MemoryError> {
        let query =
            format!("SELECT user_id, entity_id, entity_type, canonical_name, data_json FROM {}.entities WHERE user_id = ? AND entity_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (user_id.as_str(), id.0)).await.map_err(PersistenceError::from)?;
        match result.rows {
            Some(rows) => rows.into_iter().next().map(|r| self.row_to_entity(r)).transpose().map_err(MemoryError::from),
            None => Ok(None),
        }
    }

    async fn find_by_alias(&self, user_id: &UserId, entity_type: EntityType, alias_or_name: &str) -> Result<Option<Entity>, MemoryError> {
        let needle = alias_or_name.to_lowercase();
        Ok(self.list_by_user(user_id).await?.into_iter().find(|e| {
            e.entity_type == entity_type
                && (e.canonical_name.to_lowercase() == needle || e.aliases.iter().any(|a| a.to_lowercase() == needle))
        }))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Entity>, MemoryError> {
        let query = format!("SELECT user_id, entity_id, entity_type, canonical_name, data_json FROM {}.entities WHERE user_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await.map_err(PersistenceError::from)?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_entity(r)).collect::<Result<_, _>>().map_err(MemoryError::from)
    }

    async fn update(&self, entity: Entity) -> Result<(), MemoryError> {
        self.insert(entity).await
    }
}

#[derive(Clone)]
pub struct ScyllaRelationshipRepository {
    client: ScyllaClient,
}

impl ScyllaRelationshipRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_relationship(&self, row: scylla::frame::response::result::Row) -> Result<Relationship, PersistenceError> {
        let (_user_id, _relationship_id, _from, _to, data_json): (String, Uuid, Uuid, Uuid, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        Ok(serde_json::from_str(&data_json)?)
    }
}

#[async_trait]
impl RelationshipRepository for ScyllaRelationshipRepository {
    async fn insert(&self, user_id: &UserId, relationship: Relationship) -> Result<(), MemoryError> {
        let query = format!(
            "INSERT INTO {}.relationships (user_id, relationship_id, from_entity_id, to_entity_id, data_json) VALUES (?, ?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    user_id.as_str(),
                    Uuid::new_v4(),
                    relationship.from_entity_id.0,
                    relationship.to_entity_id.0,
                    serde_json::to_string(&relationship).map_err(|e| MemoryError::Storage(e.to_string()))?,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Relationship>, MemoryError> {
        let query = format!(
            "SELECT user_id, relationship_id, from_entity_id, to_entity_id, data_json FROM {}.relationships WHERE user_id = ?",
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await.map_err(PersistenceError::from)?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_relationship(r)).collect::<Result<_, _>>().map_err(MemoryError::from)
    }

    async fn list_touching(&self, user_id: &UserId, entity_ids: &std::collections::HashSet<EntityId>) -> Result<Vec<Relationship>, MemoryError> {
        let all = self.list_for_user(user_id).await?;
        Ok(all.into_iter().filter(|r| entity_ids.contains(&r.from_entity_id) || entity_ids.contains(&r.to_entity_id)).collect())
    }
}
