//! Explicit feedback, implicit interaction signals and composite
//! satisfaction aggregates (spec §4.7).

pub mod error;
pub mod repository;
pub mod scoring;
pub mod store;
pub mod types;

pub use error::SatisfactionError;
pub use repository::{
    FeedbackRepository, InMemoryFeedbackRepository, InMemoryInteractionRepository, InteractionRepository,
    SharedFeedbackRepository, SharedInteractionRepository,
};
pub use store::SatisfactionTelemetry;
pub use types::{InteractionSample, SatisfactionMetrics, SatisfactionWeights};
