use async_trait::async_trait;
use std::sync::Arc;

use zoe_core::UserId;
use zoe_llm::{InferenceBackend, Message};

use crate::handler::ExpertHandler;
use crate::types::{ExpertContext, ExpertResult};
use crate::ExpertError;

/// The ten expert variants from spec §4.4. Kept as a tag so callers (the
/// orchestrator, telemetry) can match on a closed set without downcasting
/// `dyn ExpertHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expert {
    Lists,
    Calendar,
    Memory,
    People,
    Journal,
    Reminder,
    Planning,
    Development,
    Weather,
    HomeAutomation,
}

impl Expert {
    pub fn as_str(self) -> &'static str {
        match self {
            Expert::Lists => "lists",
            Expert::Calendar => "calendar",
            Expert::Memory => "memory",
            Expert::People => "people",
            Expert::Journal => "journal",
            Expert::Reminder => "reminder",
            Expert::Planning => "planning",
            Expert::Development => "development",
            Expert::Weather => "weather",
            Expert::HomeAutomation => "home_automation",
        }
    }

    pub fn all() -> [Expert; 10] {
        [
            Expert::Lists,
            Expert::Calendar,
            Expert::Memory,
            Expert::People,
            Expert::Journal,
            Expert::Reminder,
            Expert::Planning,
            Expert::Development,
            Expert::Weather,
            Expert::HomeAutomation,
        ]
    }

    pub(crate) fn keywords(self) -> &'static [&'static str] {
        match self {
            Expert::Lists => &["list", "lists", "todo", "checklist", "add to", "shopping"],
            Expert::Calendar => &["calendar", "schedule", "meeting", "appointment", "event", "when is"],
            Expert::Memory => &["remember", "recall", "forget", "what did i say", "who is"],
            Expert::People => &["contact", "phone number", "email address", "introduce", "about my friend"],
            Expert::Journal => &["journal", "diary", "today i", "how i feel", "reflect"],
            Expert::Reminder => &["remind me", "reminder", "don't forget", "alarm"],
            Expert::Planning => &["plan", "itinerary", "trip", "organize", "steps to"],
            Expert::Development => &["code", "bug", "repository", "pull request", "deploy", "function"],
            Expert::Weather => &["weather", "forecast", "temperature", "rain", "sunny"],
            Expert::HomeAutomation => &["lights", "thermostat", "lock the door", "turn on", "turn off", "smart home"],
        }
    }

    pub(crate) fn system_prompt(self) -> &'static str {
        match self {
            Expert::Lists => "You manage the user's lists. Be concise and confirm what was added, removed, or read.",
            Expert::Calendar => "You manage the user's calendar. State dates and times exactly; never invent an event.",
            Expert::Memory => "You answer questions using the user's recalled facts. Cite only what was actually recalled.",
            Expert::People => "You track the user's contacts and relationships. Never fabricate contact details.",
            Expert::Journal => "You help the user record and reflect on journal entries. Be warm and brief.",
            Expert::Reminder => "You set and manage reminders. Always restate the reminder time back to the user.",
            Expert::Planning => "You help the user break a goal into a short, concrete plan.",
            Expert::Development => "You help with software development questions. Be precise and avoid speculation.",
            Expert::Weather => "You report weather conditions. If no weather data is available, say so plainly.",
            Expert::HomeAutomation => "You control smart home devices. Confirm the exact device and action taken.",
        }
    }

    pub fn build(self, inference: Arc<dyn InferenceBackend>) -> KeywordExpert {
        KeywordExpert { expert: self, inference }
    }

    /// Builds the registered handler for this variant. Every variant but
    /// `HomeAutomation` is a text-only [`KeywordExpert`]; `HomeAutomation` is
    /// the one expert that performs a real external action (spec §4.4), so
    /// it gets [`crate::home::HomeAutomationExpert`] instead.
    pub fn build_handler(
        self,
        inference: Arc<dyn InferenceBackend>,
        home_automation_config: &crate::home::HomeAutomationConfig,
    ) -> Arc<dyn crate::handler::ExpertHandler> {
        match self {
            Expert::HomeAutomation => {
                Arc::new(crate::home::HomeAutomationExpert::new(inference, home_automation_config.clone()))
            }
            other => Arc::new(other.build(inference)),
        }
    }
}

/// Keyword-confidence expert shared by all ten variants (spec §4.4): each
/// variant differs only in its keyword set and system prompt, not in the
/// scoring or execution mechanics.
pub struct KeywordExpert {
    expert: Expert,
    inference: Arc<dyn InferenceBackend>,
}

#[async_trait]
impl ExpertHandler for KeywordExpert {
    fn name(&self) -> &'static str {
        self.expert.as_str()
    }

    async fn can_handle(&self, query: &str, _context: &ExpertContext) -> f32 {
        let lowered = query.to_lowercase();
        let keywords = self.expert.keywords();
        let hits = keywords.iter().filter(|kw| lowered.contains(*kw)).count();
        if hits == 0 {
            return 0.0;
        }
        (hits as f32 / keywords.len() as f32 * 2.0).min(1.0)
    }

    async fn execute(&self, query: &str, _user_id: &UserId, context: &ExpertContext) -> Result<ExpertResult, ExpertError> {
        let mut prompt = String::new();
        if let Some(summary) = &context.episode_summary {
            prompt.push_str("Conversation so far: ");
            prompt.push_str(summary);
            prompt.push('\n');
        }
        if !context.recalled_facts.is_empty() {
            prompt.push_str("Recalled facts:\n");
            for fact in &context.recalled_facts {
                prompt.push_str("- ");
                prompt.push_str(fact);
                prompt.push('\n');
            }
        }
        prompt.push_str(query);

        let messages = vec![Message::system(self.expert.system_prompt()), Message::user(prompt)];
        let result = self
            .inference
            .generate(&messages)
            .await
            .map_err(|e| ExpertError::Execution(self.expert.as_str().to_string(), e.to_string()))?;

        Ok(ExpertResult::ok(result.text, 0.8))
    }
}
