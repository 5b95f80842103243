//! ScyllaDB-backed [`FeedbackRepository`]/[`InteractionRepository`] (spec §4.7).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use zoe_core::{FeedbackRecord, UserId};
use zoe_satisfaction::{FeedbackRepository, InteractionRepository, InteractionSample, SatisfactionError};

use crate::client::ScyllaClient;
use crate::error::PersistenceError;

impl From<PersistenceError> for SatisfactionError {
    fn from(err: PersistenceError) -> Self {
        SatisfactionError::Storage(err.to_string())
    }
}

#[derive(Clone)]
pub struct ScyllaFeedbackRepository {
    client: ScyllaClient,
}

impl ScyllaFeedbackRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_record(&self, row: scylla::frame::response::result::Row) -> Result<FeedbackRecord, PersistenceError> {
        let (_user_id, _feedback_id, _recorded_at, data_json): (String, Uuid, i64, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        Ok(serde_json::from_str(&data_json)?)
    }

    async fn list_by_user_rows(&self, user_id: &UserId) -> Result<Vec<FeedbackRecord>, PersistenceError> {
        let query =
            format!("SELECT user_id, feedback_id, recorded_at, data_json FROM {}.feedback_records WHERE user_id = ?", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_record(r)).collect()
    }

    async fn list_all_rows(&self) -> Result<Vec<FeedbackRecord>, PersistenceError> {
        let query = format!("SELECT user_id, feedback_id, recorded_at, data_json FROM {}.feedback_records", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, &[]).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_record(r)).collect()
    }
}

#[async_trait]
impl FeedbackRepository for ScyllaFeedbackRepository {
    async fn insert(&self, record: FeedbackRecord) -> Result<(), SatisfactionError> {
        let query = format!(
            "INSERT INTO {}.feedback_records (user_id, feedback_id, recorded_at, data_json) VALUES (?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    record.user_id.as_str(),
                    record.id,
                    record.created_at.timestamp_millis(),
                    serde_json::to_string(&record).map_err(|e| SatisfactionError::Storage(e.to_string()))?,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, since: DateTime<Utc>) -> Result<Vec<FeedbackRecord>, SatisfactionError> {
        let records = self.list_by_user_rows(user_id).await.map_err(SatisfactionError::from)?;
        Ok(records.into_iter().filter(|r| r.created_at >= since).collect())
    }

    async fn list_all(&self, since: DateTime<Utc>) -> Result<Vec<FeedbackRecord>, SatisfactionError> {
        let records = self.list_all_rows().await.map_err(SatisfactionError::from)?;
        Ok(records.into_iter().filter(|r| r.created_at >= since).collect())
    }
}

#[derive(Clone)]
pub struct ScyllaInteractionRepository {
    client: ScyllaClient,
}

impl ScyllaInteractionRepository {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_sample(&self, row: scylla::frame::response::result::Row) -> Result<InteractionSample, PersistenceError> {
        let (_user_id, _turn_id, _recorded_at, data_json): (String, Uuid, i64, String) =
            row.into_typed().map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        Ok(serde_json::from_str(&data_json)?)
    }

    async fn list_by_user_rows(&self, user_id: &UserId) -> Result<Vec<InteractionSample>, PersistenceError> {
        let query = format!(
            "SELECT user_id, turn_id, recorded_at, data_json FROM {}.satisfaction_samples WHERE user_id = ?",
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (user_id.as_str(),)).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_sample(r)).collect()
    }

    async fn list_all_rows(&self) -> Result<Vec<InteractionSample>, PersistenceError> {
        let query = format!("SELECT user_id, turn_id, recorded_at, data_json FROM {}.satisfaction_samples", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, &[]).await?;
        let rows = result.rows.unwrap_or_default();
        rows.into_iter().map(|r| self.row_to_sample(r)).collect()
    }
}

#[async_trait]
impl InteractionRepository for ScyllaInteractionRepository {
    async fn insert(&self, sample: InteractionSample) -> Result<(), SatisfactionError> {
        let query = format!(
            "INSERT INTO {}.satisfaction_samples (user_id, turn_id, recorded_at, data_json) VALUES (?, ?, ?, ?)",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    sample.user_id.as_str(),
                    sample.turn_id.0,
                    sample.recorded_at.timestamp_millis(),
                    serde_json::to_string(&sample).map_err(|e| SatisfactionError::Storage(e.to_string()))?,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, since: DateTime<Utc>) -> Result<Vec<InteractionSample>, SatisfactionError> {
        let samples = self.list_by_user_rows(user_id).await.map_err(SatisfactionError::from)?;
        Ok(samples.into_iter().filter(|s| s.recorded_at >= since).collect())
    }

    async fn list_all(&self, since: DateTime<Utc>) -> Result<Vec<InteractionSample>, SatisfactionError> {
        let samples = self.list_all_rows().await.map_err(SatisfactionError::from)?;
        Ok(samples.into_iter().filter(|s| s.recorded_at >= since).collect())
    }
}
