use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use zoe_core::{FeedbackRecord, UserId};

use crate::types::InteractionSample;
use crate::SatisfactionError;

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn insert(&self, record: FeedbackRecord) -> Result<(), SatisfactionError>;
    async fn list_for_user(&self, user_id: &UserId, since: DateTime<Utc>) -> Result<Vec<FeedbackRecord>, SatisfactionError>;
    async fn list_all(&self, since: DateTime<Utc>) -> Result<Vec<FeedbackRecord>, SatisfactionError>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn insert(&self, sample: InteractionSample) -> Result<(), SatisfactionError>;
    async fn list_for_user(&self, user_id: &UserId, since: DateTime<Utc>) -> Result<Vec<InteractionSample>, SatisfactionError>;
    async fn list_all(&self, since: DateTime<Utc>) -> Result<Vec<InteractionSample>, SatisfactionError>;
}

pub type SharedFeedbackRepository = Arc<dyn FeedbackRepository>;
pub type SharedInteractionRepository = Arc<dyn InteractionRepository>;

#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    by_user: DashMap<UserId, Vec<FeedbackRecord>>,
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn insert(&self, record: FeedbackRecord) -> Result<(), SatisfactionError> {
        self.by_user.entry(record.user_id.clone()).or_default().push(record);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, since: DateTime<Utc>) -> Result<Vec<FeedbackRecord>, SatisfactionError> {
        Ok(self
            .by_user
            .get(user_id)
            .map(|records| records.iter().filter(|r| r.created_at >= since).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_all(&self, since: DateTime<Utc>) -> Result<Vec<FeedbackRecord>, SatisfactionError> {
        Ok(self
            .by_user
            .iter()
            .flat_map(|entry| entry.value().iter().filter(|r| r.created_at >= since).cloned().collect::<Vec<_>>())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryInteractionRepository {
    by_user: DashMap<UserId, Vec<InteractionSample>>,
}

#[async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn insert(&self, sample: InteractionSample) -> Result<(), SatisfactionError> {
        self.by_user.entry(sample.user_id.clone()).or_default().push(sample);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId, since: DateTime<Utc>) -> Result<Vec<InteractionSample>, SatisfactionError> {
        Ok(self
            .by_user
            .get(user_id)
            .map(|samples| samples.iter().filter(|s| s.recorded_at >= since).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_all(&self, since: DateTime<Utc>) -> Result<Vec<InteractionSample>, SatisfactionError> {
        Ok(self
            .by_user
            .iter()
            .flat_map(|entry| entry.value().iter().filter(|s| s.recorded_at >= since).cloned().collect::<Vec<_>>())
            .collect())
    }
}
