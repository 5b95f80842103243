//! Generic operational audit trail.
//!
//! The teacher's audit log is RBI-compliance-specific (hash-chained entries,
//! 7-year retention); this keeps the append-only shape but drops the
//! compliance-specific chaining and retention — there's no regulatory
//! requirement in scope here, just an operational event trail.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::client::ScyllaClient;
use crate::error::PersistenceError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub event_type: String,
    pub resource: String,
    pub outcome: String,
    pub details: Option<String>,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), PersistenceError>;
    async fn list_for_date(&self, partition_date: &str) -> Result<Vec<AuditEntry>, PersistenceError>;
}

#[derive(Clone)]
pub struct ScyllaAuditLog {
    client: ScyllaClient,
}

impl ScyllaAuditLog {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuditLog for ScyllaAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), PersistenceError> {
        let partition_date = Utc::now().format("%Y-%m-%d").to_string();
        let query = format!(
            "INSERT INTO {}.audit_log (partition_date, id, actor, event_type, resource, outcome, details) VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    partition_date,
                    Uuid::new_v4(),
                    &entry.actor,
                    &entry.event_type,
                    &entry.resource,
                    &entry.outcome,
                    &entry.details,
                ),
            )
            .await?;
        Ok(())
    }

    async fn list_for_date(&self, partition_date: &str) -> Result<Vec<AuditEntry>, PersistenceError> {
        let query = format!(
            "SELECT actor, event_type, resource, outcome, details FROM {}.audit_log WHERE partition_date = ?",
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (partition_date,)).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter()
            .map(|row| {
                let (actor, event_type, resource, outcome, details): (String, String, String, String, Option<String>) =
                    row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(AuditEntry { actor, event_type, resource, outcome, details })
            })
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: parking_lot::Mutex<Vec<(String, AuditEntry)>>,
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), PersistenceError> {
        let partition_date = Utc::now().format("%Y-%m-%d").to_string();
        self.entries.lock().push((partition_date, entry));
        Ok(())
    }

    async fn list_for_date(&self, partition_date: &str) -> Result<Vec<AuditEntry>, PersistenceError> {
        Ok(self.entries.lock().iter().filter(|(d, _)| d == partition_date).map(|(_, e)| e.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_audit_log_filters_by_date() {
        let log = InMemoryAuditLog::default();
        log.record(AuditEntry {
            actor: "user:u1".to_string(),
            event_type: "memory.delete".to_string(),
            resource: "fact:123".to_string(),
            outcome: "success".to_string(),
            details: None,
        })
        .await
        .unwrap();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let entries = log.list_for_date(&today).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "memory.delete");
    }
}
