//! Turns an utterance into an execution plan, dispatches it across experts,
//! and synthesizes the final reply (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use zoe_core::UserId;
use zoe_experts::{ExpertContext, ExpertRegistry, ExpertResult};
use zoe_llm::{InferenceBackend, Message};

use crate::dag::topo_layers;
use crate::plan::{heuristic_plan, Plan, Task};
use crate::OrchestratorError;

const CONFIDENCE_GATE: f32 = 0.8;

const PLAN_SYSTEM_PROMPT: &str = r#"You are the planning stage of a personal assistant. Given the user's message, produce a JSON object of the form:
{"tasks": [{"id": "t1", "expert": "<expert_name>", "goal": "<short goal>", "depends_on": [], "mutates": false}], "final_style": "brief confirmation"}
Valid expert names: lists, calendar, memory, people, journal, reminder, planning, development, weather, home_automation.
Respond with JSON only, no commentary."#;

/// One task's outcome plus the task it came from, in execution order.
pub struct TaskOutcome {
    pub task: Task,
    pub result: ExpertResult,
}

pub struct Orchestrator {
    experts: Arc<ExpertRegistry>,
    inference: Arc<dyn InferenceBackend>,
}

impl Orchestrator {
    pub fn new(experts: Arc<ExpertRegistry>, inference: Arc<dyn InferenceBackend>) -> Self {
        Self { experts, inference }
    }

    /// Runs the full pipeline for one turn and returns the synthesized
    /// reply. `relevant_memory` is the caller's already-recalled snippets
    /// (the orchestrator does not perform its own memory search).
    pub async fn handle_turn(
        &self,
        user_id: &UserId,
        query: &str,
        context: &ExpertContext,
        relevant_memory: &[String],
    ) -> Result<String, OrchestratorError> {
        let (reply, _outcomes) = self.handle_turn_with_outcomes(user_id, query, context, relevant_memory).await?;
        Ok(reply)
    }

    /// Same pipeline as [`Self::handle_turn`], but also returns the task
    /// outcomes that produced the reply, so a caller (the chat pipeline's
    /// `action`/`action_result` SSE events, `expert_used` in the
    /// non-streaming response) can report which experts ran.
    pub async fn handle_turn_with_outcomes(
        &self,
        user_id: &UserId,
        query: &str,
        context: &ExpertContext,
        relevant_memory: &[String],
    ) -> Result<(String, Vec<TaskOutcome>), OrchestratorError> {
        let plan = self.plan_intent(query).await;

        if plan.tasks.len() == 1 {
            let task = &plan.tasks[0];
            if let Some(expert) = self.experts.get(&task.expert) {
                let confidence = expert.can_handle(query, context).await;
                if confidence >= CONFIDENCE_GATE {
                    let result = self
                        .experts
                        .execute(&task.expert, &task.goal, user_id, context, None)
                        .await?;
                    let outcomes = vec![TaskOutcome { task: task.clone(), result }];
                    let reply = self.synthesize(query, &outcomes, relevant_memory, &plan.final_style).await?;
                    return Ok((reply, outcomes));
                }
            }
        }

        let outcomes = self.dispatch(user_id, &plan, context).await?;
        let reply = self.synthesize(query, &outcomes, relevant_memory, &plan.final_style).await?;
        Ok((reply, outcomes))
    }

    /// Step 1: LLM plan with one repair retry, then the keyword heuristic.
    async fn plan_intent(&self, query: &str) -> Plan {
        let messages = vec![Message::system(PLAN_SYSTEM_PROMPT), Message::user(query.to_string())];
        if let Ok(result) = self.inference.generate(&messages).await {
            if let Some(plan) = Plan::parse(&result.text) {
                return plan;
            }
        }

        let repair_messages = vec![
            Message::system(PLAN_SYSTEM_PROMPT),
            Message::user(query.to_string()),
            Message::assistant("That was not valid JSON.".to_string()),
            Message::user("Reply again with JSON only, matching the schema exactly.".to_string()),
        ];
        if let Ok(result) = self.inference.generate(&repair_messages).await {
            if let Some(plan) = Plan::parse(&result.text) {
                return plan;
            }
        }

        heuristic_plan(query)
    }

    /// Steps 3 and 5: DAG dispatch with per-layer concurrency, and rollback
    /// on a failed mutating task.
    async fn dispatch(&self, user_id: &UserId, plan: &Plan, context: &ExpertContext) -> Result<Vec<TaskOutcome>, OrchestratorError> {
        for task in &plan.tasks {
            if self.experts.get(&task.expert).is_none() {
                return Err(OrchestratorError::UnknownExpert(task.expert.clone()));
            }
        }

        let layers = topo_layers(&plan.tasks)?;
        let mut outputs: HashMap<String, ExpertResult> = HashMap::new();
        let mut outcomes: Vec<TaskOutcome> = Vec::new();
        let mut mutated: Vec<&Task> = Vec::new();
        let mut failure: Option<usize> = None;

        'layers: for layer in &layers {
            let futures = layer.iter().map(|&i| {
                let task = &plan.tasks[i];
                let mut task_context = context.clone();
                for dep_id in &task.depends_on {
                    if let Some(upstream) = outputs.get(dep_id) {
                        task_context.slots.insert(format!("upstream:{dep_id}"), upstream.content.clone());
                    }
                }
                async move {
                    let result = self.experts.execute(&task.expert, &task.goal, user_id, &task_context, None).await;
                    (i, result)
                }
            });

            let results = futures::future::join_all(futures).await;

            for (i, result) in results {
                let task = plan.tasks[i].clone();
                let result = result?;

                if !result.success && task.mutates {
                    failure = Some(i);
                }
                if result.success && task.mutates {
                    mutated.push(&plan.tasks[i]);
                }

                outputs.insert(task.id.clone(), result.clone());
                outcomes.push(TaskOutcome { task, result });
            }

            if failure.is_some() {
                break 'layers;
            }
        }

        if failure.is_some() {
            for task in mutated.into_iter().rev() {
                if let Some(expert) = self.experts.get(&task.expert) {
                    let artifacts = outputs.get(&task.id).map(|r| r.artifacts.clone()).unwrap_or_default();
                    let _ = expert.compensate(&artifacts).await;
                }
            }
        }

        Ok(outcomes)
    }

    /// Step 4: combine expert outputs into one reply via a final LLM call.
    async fn synthesize(
        &self,
        query: &str,
        outcomes: &[TaskOutcome],
        relevant_memory: &[String],
        final_style: &str,
    ) -> Result<String, OrchestratorError> {
        let mut prompt = format!("User said: {query}\n\n");

        if !relevant_memory.is_empty() {
            prompt.push_str("Relevant memory:\n");
            for snippet in relevant_memory {
                prompt.push_str("- ");
                prompt.push_str(snippet);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("Expert results:\n");
        for outcome in outcomes {
            let status = if outcome.result.success { "ok" } else { "failed" };
            prompt.push_str(&format!("- [{}/{}] {}\n", outcome.task.expert, status, outcome.result.content));
        }
        prompt.push_str(&format!("\nReply style: {final_style}. Write the final reply to the user now."));

        let messages = vec![
            Message::system("You combine expert results into one natural reply for the user."),
            Message::user(prompt),
        ];

        self.inference
            .generate(&messages)
            .await
            .map(|r| r.text)
            .map_err(|e| OrchestratorError::Synthesis(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use zoe_experts::{Expert, ExpertHandler};
    use zoe_llm::{FinishReason, GenerationResult, LlmError};

    struct ScriptedBackend {
        responses: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
            let mut responses = self.responses.lock().unwrap();
            let text = if responses.is_empty() { String::new() } else { responses.remove(0) };
            Ok(GenerationResult {
                text,
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
            "scripted"
        }
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_on_malformed_plan_twice() {
        let backend = Arc::new(ScriptedBackend {
            responses: std::sync::Mutex::new(vec!["not json".to_string(), "still not json".to_string(), "done".to_string()]),
        });
        let mut registry = ExpertRegistry::new();
        registry.register(Arc::new(Expert::Lists.build(backend.clone())));
        let orchestrator = Orchestrator::new(Arc::new(registry), backend);

        let user_id = UserId("u1".to_string());
        let reply = orchestrator
            .handle_turn(&user_id, "add milk to my list", &ExpertContext::default(), &[])
            .await
            .unwrap();
        assert_eq!(reply, "done");
    }
}
