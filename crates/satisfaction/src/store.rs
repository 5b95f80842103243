use chrono::{Duration, Utc};

use zoe_core::{FeedbackKind, FeedbackRecord, TurnId, UserId};

use crate::repository::{SharedFeedbackRepository, SharedInteractionRepository};
use crate::types::{InteractionSample, SatisfactionMetrics, SatisfactionWeights};
use crate::SatisfactionError;

const ROLLING_WINDOW_DAYS: i64 = 30;

pub struct SatisfactionTelemetry {
    feedback: SharedFeedbackRepository,
    interactions: SharedInteractionRepository,
    weights: SatisfactionWeights,
}

impl SatisfactionTelemetry {
    pub fn new(feedback: SharedFeedbackRepository, interactions: SharedInteractionRepository) -> Self {
        Self { feedback, interactions, weights: SatisfactionWeights::default() }
    }

    pub fn with_weights(mut self, weights: SatisfactionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Explicit feedback: `thumbs_up`/`thumbs_down` map to 1.0/0.0,
    /// `rating_1_5` normalizes to `[0,1]` (spec §4.7).
    pub async fn submit_feedback(
        &self,
        user_id: &UserId,
        turn_id: Option<TurnId>,
        kind: FeedbackKind,
        value: f32,
    ) -> Result<(), SatisfactionError> {
        let normalized = match kind {
            FeedbackKind::ThumbsUp => 1.0,
            FeedbackKind::ThumbsDown => 0.0,
            FeedbackKind::Rating => {
                if !(1.0..=5.0).contains(&value) {
                    return Err(SatisfactionError::Validation(format!("rating {value} out of range [1,5]")));
                }
                (value - 1.0) / 4.0
            }
            FeedbackKind::Implicit => value.clamp(0.0, 1.0),
        };

        let record = FeedbackRecord {
            id: uuid::Uuid::new_v4(),
            user_id: user_id.clone(),
            turn_id,
            kind,
            value: normalized,
            factors: None,
            created_at: Utc::now(),
        };
        self.feedback.insert(record).await
    }

    /// Records one assistant turn's implicit signals (spec §4.7).
    pub async fn record_interaction(&self, sample: InteractionSample) -> Result<(), SatisfactionError> {
        self.interactions.insert(sample).await
    }

    /// Rolling 30-day composite + explicit-feedback mean for one user.
    pub async fn metrics_for_user(&self, user_id: &UserId) -> Result<SatisfactionMetrics, SatisfactionError> {
        let since = Utc::now() - Duration::days(ROLLING_WINDOW_DAYS);
        let samples = self.interactions.list_for_user(user_id, since).await?;
        let feedback = self.feedback.list_for_user(user_id, since).await?;
        Ok(self.aggregate(&samples, &feedback))
    }

    /// Same aggregate, across every user.
    pub async fn metrics_system_wide(&self) -> Result<SatisfactionMetrics, SatisfactionError> {
        let since = Utc::now() - Duration::days(ROLLING_WINDOW_DAYS);
        let samples = self.interactions.list_all(since).await?;
        let feedback = self.feedback.list_all(since).await?;
        Ok(self.aggregate(&samples, &feedback))
    }

    fn aggregate(&self, samples: &[InteractionSample], feedback: &[FeedbackRecord]) -> SatisfactionMetrics {
        let mean_composite = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.composite(self.weights)).sum::<f32>() / samples.len() as f32
        };
        let mean_explicit = if feedback.is_empty() {
            None
        } else {
            Some(feedback.iter().map(|f| f.value).sum::<f32>() / feedback.len() as f32)
        };
        SatisfactionMetrics { sample_count: samples.len(), mean_composite, mean_explicit, window_days: ROLLING_WINDOW_DAYS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryFeedbackRepository, InMemoryInteractionRepository};
    use std::sync::Arc;

    fn telemetry() -> SatisfactionTelemetry {
        SatisfactionTelemetry::new(Arc::new(InMemoryFeedbackRepository::default()), Arc::new(InMemoryInteractionRepository::default()))
    }

    #[tokio::test]
    async fn scenario_5_best_case_composite_is_one() {
        let sample = InteractionSample {
            user_id: UserId::new("u1"),
            turn_id: TurnId::new(),
            response_time_s: 1.5,
            task_completion: true,
            follow_up_count: 2,
            engagement_duration_s: 90.0,
            recorded_at: Utc::now(),
        };
        assert_eq!(sample.composite(SatisfactionWeights::default()), 1.0);
    }

    #[tokio::test]
    async fn scenario_5_degraded_case_composite_is_point_five_six() {
        let sample = InteractionSample {
            user_id: UserId::new("u1"),
            turn_id: TurnId::new(),
            response_time_s: 30.0,
            task_completion: true,
            follow_up_count: 0,
            engagement_duration_s: 90.0,
            recorded_at: Utc::now(),
        };
        let composite = sample.composite(SatisfactionWeights::default());
        assert!((composite - 0.56).abs() < 1e-5);
    }

    #[tokio::test]
    async fn rating_normalizes_to_unit_interval() {
        let telemetry = telemetry();
        let user_id = UserId::new("u1");
        telemetry.submit_feedback(&user_id, None, FeedbackKind::Rating, 5.0).await.unwrap();
        let metrics = telemetry.metrics_for_user(&user_id).await.unwrap();
        assert_eq!(metrics.mean_explicit, Some(1.0));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let telemetry = telemetry();
        let user_id = UserId::new("u1");
        let err = telemetry.submit_feedback(&user_id, None, FeedbackKind::Rating, 7.0).await.unwrap_err();
        assert!(matches!(err, SatisfactionError::Validation(_)));
    }

    #[tokio::test]
    async fn metrics_isolate_by_user() {
        let telemetry = telemetry();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        telemetry
            .record_interaction(InteractionSample {
                user_id: u1.clone(),
                turn_id: TurnId::new(),
                response_time_s: 1.0,
                task_completion: true,
                follow_up_count: 2,
                engagement_duration_s: 90.0,
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();
        let u2_metrics = telemetry.metrics_for_user(&u2).await.unwrap();
        assert_eq!(u2_metrics.sample_count, 0);
    }
}
