//! Task dependency graph (DAG) for ordered execution.
//!
//! A `TaskGraph` holds atomic task specs plus directed `(from, to)` edges
//! meaning `from` must complete before `to` starts. Validation reports every
//! violated invariant rather than the first, and topological ordering is
//! stable with respect to task insertion order so runs are reproducible.

use crate::core::task::TaskSpec;
use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of a full validation pass over a graph.
///
/// `errors` block execution; `warnings` (currently only the isolated-task
/// check) are surfaced but do not fail validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Hard invariant violations.
    pub errors: Vec<String>,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Check if the graph passed validation (warnings allowed).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All findings, errors first, for user-facing reporting.
    pub fn issues(&self) -> Vec<String> {
        let mut all = self.errors.clone();
        all.extend(self.warnings.iter().cloned());
        all
    }
}

/// The task dependency graph.
///
/// Tasks keep their insertion order; edges are `(from_id, to_id)` pairs.
/// The graph is read-only once handed to the execution orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGraph {
    /// All tasks in the plan, in insertion order.
    pub tasks: Vec<TaskSpec>,
    /// Directed dependency edges: `from` must finish before `to` starts.
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph from parts.
    pub fn from_parts(tasks: Vec<TaskSpec>, edges: Vec<(String, String)>) -> Self {
        Self { tasks, edges }
    }

    /// Add a task, keeping insertion order.
    pub fn add_task(&mut self, task: TaskSpec) {
        self.tasks.push(task);
    }

    /// Add a dependency edge: `from` must complete before `to`.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.push((from.to_string(), to.to_string()));
    }

    /// Number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the graph has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Look up a task by id.
    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Run all invariant checks and return every violation found.
    ///
    /// Checks, in order:
    /// 1. no duplicate task ids
    /// 2. every edge endpoint and declared dependency references an
    ///    existing task
    /// 3. no cycles (only checked once references are sound)
    /// 4. in a multi-task graph, tasks that are neither a dependency
    ///    source nor target are flagged as a warning, not an error
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                report
                    .errors
                    .push(format!("Duplicate task id: {}", task.id));
            }
        }

        let ids: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        for (from, to) in &self.edges {
            if !ids.contains(from.as_str()) {
                report
                    .errors
                    .push(format!("Edge references non-existent task: {}", from));
            }
            if !ids.contains(to.as_str()) {
                report
                    .errors
                    .push(format!("Edge references non-existent task: {}", to));
            }
        }
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !ids.contains(dep.as_str()) {
                    report.errors.push(format!(
                        "Task {} depends on non-existent task: {}",
                        task.id, dep
                    ));
                }
            }
        }

        // Cycle detection is only meaningful with sound references.
        if report.errors.is_empty() && self.has_cycle() {
            report
                .errors
                .push("Circular dependency detected in task graph".to_string());
        }

        if report.errors.is_empty() && self.tasks.len() > 1 {
            let mut connected: HashSet<&str> = HashSet::new();
            for (from, to) in &self.edges {
                connected.insert(from.as_str());
                connected.insert(to.as_str());
            }
            for task in &self.tasks {
                if !connected.contains(task.id.as_str()) {
                    report.warnings.push(format!(
                        "Task {} has no dependencies or dependents (isolated)",
                        task.id
                    ));
                }
            }
        }

        report
    }

    /// Check for cycles among the edges.
    ///
    /// Assumes edge endpoints reference existing tasks.
    fn has_cycle(&self) -> bool {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index = HashMap::new();
        for task in &self.tasks {
            index.insert(task.id.as_str(), graph.add_node(task.id.as_str()));
        }
        for (from, to) in &self.edges {
            if let (Some(&f), Some(&t)) = (index.get(from.as_str()), index.get(to.as_str())) {
                graph.add_edge(f, t, ());
            }
        }
        is_cyclic_directed(&graph)
    }

    /// Return task ids in topological order (dependencies first).
    ///
    /// Kahn's algorithm with a FIFO queue seeded in insertion order, so
    /// ties among zero-in-degree tasks resolve deterministically.
    ///
    /// # Errors
    ///
    /// Returns `Error::CyclicGraph` if validation reports a cycle, and
    /// `Error::Validation` for any other invariant violation.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let report = self.validate();
        if !report.is_valid() {
            let joined = report.errors.join("; ");
            if report.errors.iter().any(|e| e.contains("Circular")) {
                return Err(Error::CyclicGraph(joined));
            }
            return Err(Error::Validation(joined));
        }

        let ids: Vec<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        let mut adjacency: HashMap<&str, Vec<&str>> =
            ids.iter().map(|id| (*id, Vec::new())).collect();
        let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();

        for (from, to) in &self.edges {
            adjacency
                .get_mut(from.as_str())
                .expect("validated edge endpoint")
                .push(to.as_str());
            *in_degree
                .get_mut(to.as_str())
                .expect("validated edge endpoint") += 1;
        }

        let mut queue: VecDeque<&str> = ids
            .iter()
            .filter(|id| in_degree[**id] == 0)
            .copied()
            .collect();
        let mut order = Vec::with_capacity(ids.len());

        while let Some(current) = queue.pop_front() {
            order.push(current.to_string());
            for neighbor in &adjacency[current] {
                let degree = in_degree.get_mut(neighbor).expect("known task id");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        // Validation already rejected cycles, so every task is emitted.
        debug_assert_eq!(order.len(), self.tasks.len());
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> TaskGraph {
        let mut g = TaskGraph::new();
        for id in ids {
            g.add_task(TaskSpec::new(id, &format!("task {}", id)));
        }
        for (from, to) in edges {
            g.add_edge(from, to);
        }
        g
    }

    #[test]
    fn test_validate_ok_linear() {
        let g = graph(&["T1", "T2", "T3"], &[("T1", "T2"), ("T2", "T3")]);
        let report = g.validate();
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let g = graph(&["T1", "T1"], &[]);
        let report = g.validate();
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("Duplicate task id"));
    }

    #[test]
    fn test_validate_dangling_edge() {
        let g = graph(&["T1"], &[("T1", "T9")]);
        let report = g.validate();
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("non-existent task: T9"));
    }

    #[test]
    fn test_validate_dangling_dependency_field() {
        let mut g = graph(&["T1"], &[]);
        g.tasks[0].dependencies.push("T7".to_string());
        let report = g.validate();
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("depends on non-existent task: T7"));
    }

    #[test]
    fn test_validate_reports_all_violations() {
        let g = graph(&["T1", "T1"], &[("T1", "T9"), ("T8", "T1")]);
        let report = g.validate();
        assert!(report.errors.len() >= 3);
    }

    #[test]
    fn test_validate_cycle() {
        let g = graph(&["T1", "T2"], &[("T1", "T2"), ("T2", "T1")]);
        let report = g.validate();
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("Circular")));
    }

    #[test]
    fn test_validate_self_loop_is_cycle() {
        let g = graph(&["T1", "T2"], &[("T1", "T1"), ("T1", "T2")]);
        let report = g.validate();
        assert!(report.errors.iter().any(|e| e.contains("Circular")));
    }

    #[test]
    fn test_validate_isolated_task_is_warning() {
        let g = graph(&["T1", "T2", "T3"], &[("T1", "T2")]);
        let report = g.validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("T3"));
        assert!(report.warnings[0].contains("isolated"));
    }

    #[test]
    fn test_validate_single_task_not_isolated() {
        let g = graph(&["T1"], &[]);
        let report = g.validate();
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_topological_order_linear() {
        let g = graph(&["T1", "T2", "T3"], &[("T1", "T2"), ("T2", "T3")]);
        let order = g.topological_order().unwrap();
        assert_eq!(order, vec!["T1", "T2", "T3"]);
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let g = graph(
            &["T1", "T2", "T3", "T4"],
            &[("T1", "T2"), ("T1", "T3"), ("T2", "T4"), ("T3", "T4")],
        );
        let order = g.topological_order().unwrap();
        let pos =
            |id: &str| order.iter().position(|x| x == id).expect("id in order");
        for (from, to) in &g.edges {
            assert!(pos(from) < pos(to), "{} must precede {}", from, to);
        }
        // Every id appears exactly once.
        let unique: HashSet<&String> = order.iter().collect();
        assert_eq!(unique.len(), g.len());
    }

    #[test]
    fn test_topological_order_ties_use_insertion_order() {
        // T2 and T3 both become ready after T1; insertion order breaks the tie.
        let g = graph(&["T1", "T2", "T3", "T4"], &[("T1", "T4")]);
        let order = g.topological_order().unwrap();
        assert_eq!(order, vec!["T1", "T2", "T3", "T4"]);
    }

    #[test]
    fn test_topological_order_fails_on_cycle() {
        let g = graph(&["T1", "T2"], &[("T1", "T2"), ("T2", "T1")]);
        let err = g.topological_order().unwrap_err();
        assert!(matches!(err, Error::CyclicGraph(_)));
    }

    #[test]
    fn test_topological_order_fails_on_invalid_reference() {
        let g = graph(&["T1"], &[("T1", "T9")]);
        let err = g.topological_order().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_serialization_roundtrip_preserves_structure() {
        let mut g = graph(&["T2", "T1"], &[("T2", "T1")]);
        g.tasks[0].dependencies = vec!["T1".to_string()];
        let json = serde_json::to_string(&g).unwrap();
        let parsed: TaskGraph = serde_json::from_str(&json).unwrap();

        let ids: HashSet<String> = g.tasks.iter().map(|t| t.id.clone()).collect();
        let parsed_ids: HashSet<String> =
            parsed.tasks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, parsed_ids);
        assert_eq!(parsed.edges, g.edges);
        // Per-task dependency order is preserved exactly.
        assert_eq!(parsed.tasks[0].dependencies, g.tasks[0].dependencies);
    }

    #[test]
    fn test_empty_graph_orders_empty() {
        let g = TaskGraph::new();
        assert!(g.is_empty());
        assert!(g.validate().is_valid());
        assert!(g.topological_order().unwrap().is_empty());
    }
}
