use std::collections::{HashMap, HashSet};

use crate::plan::Task;
use crate::OrchestratorError;

/// Groups task indices into dependency layers (roots first); each layer is
/// sorted by task id ascending for deterministic ordering (spec §4.5:
/// "tie-break: task id ascending").
pub fn topo_layers(tasks: &[Task]) -> Result<Vec<Vec<usize>>, OrchestratorError> {
    let index_of: HashMap<&str, usize> = tasks.iter().enumerate().map(|(i, t)| (t.id.as_str(), i)).collect();

    let mut remaining_deps: Vec<HashSet<usize>> = tasks
        .iter()
        .map(|t| {
            t.depends_on
                .iter()
                .filter_map(|dep| index_of.get(dep.as_str()).copied())
                .collect()
        })
        .collect();

    let mut done = vec![false; tasks.len()];
    let mut layers = Vec::new();

    while done.iter().any(|d| !d) {
        let mut layer: Vec<usize> = (0..tasks.len())
            .filter(|&i| !done[i] && remaining_deps[i].is_empty())
            .collect();

        if layer.is_empty() {
            return Err(OrchestratorError::PlanCycle);
        }

        layer.sort_by(|&a, &b| tasks[a].id.cmp(&tasks[b].id));

        for &i in &layer {
            done[i] = true;
        }
        for deps in remaining_deps.iter_mut() {
            for &i in &layer {
                deps.remove(&i);
            }
        }
        layers.push(layer);
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn task(id: &str, depends_on: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            expert: "memory".to_string(),
            goal: String::new(),
            inputs: Map::new(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            mutates: false,
        }
    }

    #[test]
    fn independent_tasks_form_one_layer_sorted_by_id() {
        let tasks = vec![task("b", &[]), task("a", &[])];
        let layers = topo_layers(&tasks).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0], vec![1, 0]);
    }

    #[test]
    fn dependent_task_runs_in_later_layer() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let layers = topo_layers(&tasks).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], vec![0]);
        assert_eq!(layers[1], vec![1]);
    }

    #[test]
    fn cycle_is_rejected() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        assert!(matches!(topo_layers(&tasks), Err(OrchestratorError::PlanCycle)));
    }
}
