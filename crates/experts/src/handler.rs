use async_trait::async_trait;
use zoe_core::UserId;

use crate::types::{ExpertContext, ExpertResult};
use crate::ExpertError;

/// The capability set every expert variant implements (spec §4.4).
///
/// `can_handle` must be cheap (no network I/O beyond a local inference
/// backend call) and return within 200ms; the registry does not enforce
/// that budget itself, callers that need the guarantee should wrap it.
#[async_trait]
pub trait ExpertHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn can_handle(&self, query: &str, context: &ExpertContext) -> f32;

    async fn execute(&self, query: &str, user_id: &UserId, context: &ExpertContext) -> Result<ExpertResult, ExpertError>;

    /// Reverses a prior successful mutation, given the `artifacts` it
    /// returned. Called in reverse task order when a sibling task fails
    /// (spec §4.5 step 5, "rollback"). Experts that never mutate external
    /// state can rely on the no-op default.
    async fn compensate(&self, _artifacts: &std::collections::HashMap<String, serde_json::Value>) -> Result<(), ExpertError> {
        Ok(())
    }
}
