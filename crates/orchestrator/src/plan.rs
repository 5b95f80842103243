use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use zoe_llm::extract_json;

/// One step of an execution [`Plan`] (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub expert: String,
    pub goal: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub mutates: bool,
}

/// The orchestrator's execution plan for one user turn (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<Task>,
    #[serde(default = "default_final_style")]
    pub final_style: String,
}

fn default_final_style() -> String {
    "brief confirmation".to_string()
}

impl Plan {
    /// Parses the first JSON object/array out of a model response. Returns
    /// `None` on malformed JSON or a schema mismatch — the caller is
    /// expected to retry once, then fall back to [`heuristic_plan`].
    pub fn parse(raw: &str) -> Option<Plan> {
        let json = extract_json(raw)?;
        serde_json::from_str(json).ok()
    }
}

/// Trigger phrases for the keyword fallback (spec §4.5 step 1). This path
/// must never fail: it always returns a plan, even if that plan is a
/// single `Expert::Memory`/catch-all task.
const TRIGGERS: &[(&[&str], &str)] = &[
    (&["add", "to", "list"], "lists"),
    (&["remove", "from", "list"], "lists"),
    (&["schedule", "meeting", "appointment", "calendar"], "calendar"),
    (&["remind me", "reminder", "don't forget"], "reminder"),
    (&["remember", "recall", "what did i say", "who is"], "memory"),
    (&["contact", "phone number", "introduce"], "people"),
    (&["journal", "diary", "reflect"], "journal"),
    (&["plan", "itinerary", "organize"], "planning"),
    (&["code", "bug", "repository", "deploy"], "development"),
    (&["weather", "forecast", "temperature"], "weather"),
    (&["lights", "thermostat", "turn on", "turn off"], "home_automation"),
];

/// Deterministic, crash-proof keyword router used when the LLM plan is
/// malformed twice in a row (spec §4.5: "the heuristic is the authoritative
/// fallback; it must never crash").
///
/// Emits one task per distinct expert matched by `TRIGGERS`, not just the
/// first — a query that trips both the calendar and reminder triggers
/// produces two independent (no `depends_on`) tasks, so this fallback can
/// still land a concurrent multi-expert plan rather than always
/// single-tasking.
pub fn heuristic_plan(query: &str) -> Plan {
    let lowered = query.to_lowercase();
    let mut seen = std::collections::HashSet::new();
    let mut matched: Vec<&str> = Vec::new();
    for (phrases, expert) in TRIGGERS {
        if phrases.iter().any(|p| lowered.contains(p)) && seen.insert(*expert) {
            matched.push(expert);
        }
    }
    if matched.is_empty() {
        matched.push("memory");
    }

    let tasks = matched
        .into_iter()
        .enumerate()
        .map(|(i, expert)| Task {
            id: format!("t{}", i + 1),
            expert: expert.to_string(),
            goal: query.to_string(),
            inputs: HashMap::new(),
            depends_on: Vec::new(),
            mutates: false,
        })
        .collect();

    Plan { tasks, final_style: default_final_style() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_plan() {
        let raw = r#"Here is the plan: {"tasks":[{"id":"t1","expert":"lists","goal":"add milk"}],"final_style":"brief"}"#;
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].expert, "lists");
    }

    #[test]
    fn malformed_plan_returns_none() {
        assert!(Plan::parse("not json at all").is_none());
    }

    #[test]
    fn heuristic_routes_list_trigger() {
        let plan = heuristic_plan("add bread to my shopping list");
        assert_eq!(plan.tasks[0].expert, "lists");
    }

    #[test]
    fn heuristic_routes_calendar_trigger() {
        let plan = heuristic_plan("schedule a meeting with Dana tomorrow");
        assert_eq!(plan.tasks[0].expert, "calendar");
    }

    #[test]
    fn heuristic_never_panics_on_empty_query() {
        let plan = heuristic_plan("");
        assert_eq!(plan.tasks.len(), 1);
    }

    #[test]
    fn heuristic_emits_one_task_per_matched_expert() {
        let plan = heuristic_plan("schedule a meeting and also remind me to call Dana");
        let experts: Vec<&str> = plan.tasks.iter().map(|t| t.expert.as_str()).collect();
        assert!(experts.contains(&"calendar"));
        assert!(experts.contains(&"reminder"));
        assert_eq!(plan.tasks.len(), 2);
        assert!(plan.tasks.iter().all(|t| t.depends_on.is_empty()));
    }
}
