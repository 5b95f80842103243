//! Home automation expert (spec §4.4): the one variant that performs a real
//! external action — toggling a device through an allow-listed controller —
//! rather than only generating a text reply.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use zoe_core::UserId;
use zoe_llm::{InferenceBackend, Message};

use crate::expert::Expert;
use crate::handler::ExpertHandler;
use crate::types::{ExpertAction, ExpertContext, ExpertResult};
use crate::ExpertError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Controller endpoint plus the devices this deployment is allowed to
/// touch. A device name not on `allow_list` is never sent a state change,
/// no matter what the query asks for.
#[derive(Debug, Clone)]
pub struct HomeAutomationConfig {
    pub controller_url: String,
    pub allow_list: Vec<String>,
}

impl Default for HomeAutomationConfig {
    fn default() -> Self {
        Self { controller_url: "http://localhost:8123".to_string(), allow_list: Vec::new() }
    }
}

pub struct HomeAutomationExpert {
    inference: Arc<dyn InferenceBackend>,
    http: Client,
    config: HomeAutomationConfig,
}

impl HomeAutomationExpert {
    pub fn new(inference: Arc<dyn InferenceBackend>, config: HomeAutomationConfig) -> Self {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self { inference, http, config }
    }

    fn matched_device(&self, query: &str) -> Option<String> {
        let lowered = query.to_lowercase();
        self.config.allow_list.iter().find(|device| lowered.contains(&device.to_lowercase())).cloned()
    }

    fn requested_state(query: &str) -> &'static str {
        let lowered = query.to_lowercase();
        if lowered.contains("turn off") || lowered.contains("lock the door") {
            "off"
        } else {
            "on"
        }
    }

    async fn set_device_state(&self, device: &str, state: &str) -> Result<(), ExpertError> {
        let url = format!("{}/devices/{device}/state", self.config.controller_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "state": state }))
            .send()
            .await
            .map_err(|e| ExpertError::Execution(Expert::HomeAutomation.as_str().to_string(), e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| ExpertError::Execution(Expert::HomeAutomation.as_str().to_string(), e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ExpertHandler for HomeAutomationExpert {
    fn name(&self) -> &'static str {
        Expert::HomeAutomation.as_str()
    }

    async fn can_handle(&self, query: &str, _context: &ExpertContext) -> f32 {
        let lowered = query.to_lowercase();
        let keywords = Expert::HomeAutomation.keywords();
        let hits = keywords.iter().filter(|kw| lowered.contains(*kw)).count();
        if hits == 0 {
            return 0.0;
        }
        (hits as f32 / keywords.len() as f32 * 2.0).min(1.0)
    }

    /// Turns the matched device on/off through the controller, then asks the
    /// model to phrase the confirmation. A device outside `allow_list`
    /// degrades to a text-only reply rather than erroring — the allow list
    /// scopes what can be *done*, not what can be *talked about*.
    async fn execute(&self, query: &str, _user_id: &UserId, context: &ExpertContext) -> Result<ExpertResult, ExpertError> {
        let Some(device) = self.matched_device(query) else {
            return Ok(ExpertResult::ok(
                "I don't control that device — ask an admin to add it to the allow list first.",
                0.4,
            ));
        };
        let new_state = Self::requested_state(query);
        let previous_state = if new_state == "on" { "off" } else { "on" };

        self.set_device_state(&device, new_state).await?;

        let mut prompt = String::new();
        if let Some(summary) = &context.episode_summary {
            prompt.push_str("Conversation so far: ");
            prompt.push_str(summary);
            prompt.push('\n');
        }
        prompt.push_str(&format!("Confirm to the user that {device} was turned {new_state}."));

        let messages = vec![Message::system(Expert::HomeAutomation.system_prompt()), Message::user(prompt)];
        let result = self
            .inference
            .generate(&messages)
            .await
            .map_err(|e| ExpertError::Execution(self.name().to_string(), e.to_string()))?;

        Ok(ExpertResult::ok(result.text, 0.85)
            .with_action(ExpertAction {
                kind: "device_state_change".to_string(),
                description: format!("set {device} to {new_state}"),
                payload: json!({ "device": device, "state": new_state }),
            })
            .with_artifact("device", json!(device))
            .with_artifact("previous_state", json!(previous_state)))
    }

    /// Rollback for the orchestrator's failure path (spec §4.5 step 5):
    /// restores the device to the state recorded before `execute` changed
    /// it. A no-op if `execute` never got far enough to record artifacts.
    async fn compensate(&self, artifacts: &HashMap<String, serde_json::Value>) -> Result<(), ExpertError> {
        let device = artifacts.get("device").and_then(|v| v.as_str());
        let previous_state = artifacts.get("previous_state").and_then(|v| v.as_str());
        let (Some(device), Some(previous_state)) = (device, previous_state) else {
            return Ok(());
        };
        self.set_device_state(device, previous_state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use zoe_llm::{FinishReason, GenerationResult, LlmError};

    struct StubBackend;

    #[async_trait]
    impl InferenceBackend for StubBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
            Ok(GenerationResult {
                text: "done".to_string(),
                tokens: 1,
                time_to_first_token_ms: 0,
                total_time_ms: 0,
                tokens_per_second: 0.0,
                finish_reason: FinishReason::Stop,
                context: None,
            })
        }

        async fn generate_stream(&self, _messages: &[Message], _tx: mpsc::Sender<String>) -> Result<GenerationResult, LlmError> {
            unimplemented!()
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn expert(allow_list: Vec<&str>) -> HomeAutomationExpert {
        HomeAutomationExpert::new(
            Arc::new(StubBackend),
            HomeAutomationConfig {
                controller_url: "http://x".to_string(),
                allow_list: allow_list.into_iter().map(str::to_string).collect(),
            },
        )
    }

    #[test]
    fn matched_device_respects_allow_list() {
        let expert = expert(vec!["living room lights"]);
        assert_eq!(expert.matched_device("turn off the living room lights"), Some("living room lights".to_string()));
        assert_eq!(expert.matched_device("turn off the garage door"), None);
    }

    #[test]
    fn requested_state_defaults_to_on() {
        assert_eq!(HomeAutomationExpert::requested_state("turn on the lights"), "on");
        assert_eq!(HomeAutomationExpert::requested_state("turn off the lights"), "off");
        assert_eq!(HomeAutomationExpert::requested_state("lock the door"), "off");
    }
}
