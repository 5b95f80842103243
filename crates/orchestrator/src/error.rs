use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("planning failed: {0}")]
    Planning(String),

    #[error("plan has a dependency cycle")]
    PlanCycle,

    #[error("plan references unknown expert: {0}")]
    UnknownExpert(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error(transparent)]
    Expert(#[from] zoe_experts::ExpertError),
}

impl From<OrchestratorError> for zoe_core::CoreError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Planning(_) | OrchestratorError::Synthesis(_) => zoe_core::CoreError::Transient(err.to_string()),
            OrchestratorError::PlanCycle | OrchestratorError::UnknownExpert(_) => zoe_core::CoreError::Validation(err.to_string()),
            OrchestratorError::Expert(e) => e.into(),
        }
    }
}
