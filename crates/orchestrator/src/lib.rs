//! Intent planning, DAG dispatch across experts, and reply synthesis
//! (spec §4.5).

pub mod dag;
pub mod error;
pub mod orchestrator;
pub mod plan;

pub use dag::topo_layers;
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, TaskOutcome};
pub use plan::{heuristic_plan, Plan, Task};
