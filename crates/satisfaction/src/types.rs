use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zoe_core::{TurnId, UserId};

/// Weights for the four implicit signals in the composite (spec §4.7).
/// Configurable; the spec's own defaults are "a reasonable default, not a
/// hard contract" (§9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatisfactionWeights {
    pub response_time: f32,
    pub task_completion: f32,
    pub follow_up: f32,
    pub engagement: f32,
}

impl Default for SatisfactionWeights {
    fn default() -> Self {
        Self { response_time: 0.3, task_completion: 0.3, follow_up: 0.2, engagement: 0.2 }
    }
}

/// One assistant turn's implicit satisfaction signals (spec §4.7, §3
/// Interaction Tracking).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSample {
    pub user_id: UserId,
    pub turn_id: TurnId,
    pub response_time_s: f32,
    pub task_completion: bool,
    pub follow_up_count: u32,
    pub engagement_duration_s: f32,
    pub recorded_at: DateTime<Utc>,
}

impl InteractionSample {
    pub fn composite(&self, weights: SatisfactionWeights) -> f32 {
        use crate::scoring::{engagement_duration_score, follow_up_score, response_time_score, task_completion_score};
        weights.response_time * response_time_score(self.response_time_s)
            + weights.task_completion * task_completion_score(self.task_completion)
            + weights.follow_up * follow_up_score(self.follow_up_count)
            + weights.engagement * engagement_duration_score(self.engagement_duration_s)
    }
}

/// Aggregate satisfaction over a rolling window, for one user or system-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatisfactionMetrics {
    pub sample_count: usize,
    pub mean_composite: f32,
    pub mean_explicit: Option<f32>,
    pub window_days: i64,
}
