use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zoe_core::ErrorKind;

/// A side effect an expert wants the orchestrator to record or surface
/// (spec §4.4 `ExpertResult.actions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertAction {
    pub kind: String,
    pub description: String,
    pub payload: serde_json::Value,
}

/// Context handed to every expert call: the orchestrator's view of the
/// conversation so far, plus any slots it has already extracted.
#[derive(Debug, Clone, Default)]
pub struct ExpertContext {
    pub episode_summary: Option<String>,
    pub recalled_facts: Vec<String>,
    pub slots: HashMap<String, String>,
}

/// Outcome of `ExpertHandler::execute` (spec §4.4).
#[derive(Debug, Clone)]
pub struct ExpertResult {
    pub success: bool,
    pub content: String,
    pub actions: Vec<ExpertAction>,
    pub artifacts: HashMap<String, serde_json::Value>,
    pub confidence: f32,
    pub error_kind: Option<ErrorKind>,
}

impl ExpertResult {
    pub fn ok(content: impl Into<String>, confidence: f32) -> Self {
        Self {
            success: true,
            content: content.into(),
            actions: Vec::new(),
            artifacts: HashMap::new(),
            confidence,
            error_kind: None,
        }
    }

    pub fn failed(content: impl Into<String>, error_kind: ErrorKind) -> Self {
        Self {
            success: false,
            content: content.into(),
            actions: Vec::new(),
            artifacts: HashMap::new(),
            confidence: 0.0,
            error_kind: Some(error_kind),
        }
    }

    pub fn with_action(mut self, action: ExpertAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.artifacts.insert(key.into(), value);
        self
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.error_kind, Some(ErrorKind::Transient) | Some(ErrorKind::Timeout))
    }
}
