//! Core data model: tasks, the dependency graph, and scoring criteria.

pub mod criteria;
pub mod graph;
pub mod task;

pub use criteria::{weights_for, JudgeCriteria, WeightProfile};
pub use graph::{TaskGraph, ValidationReport};
pub use task::{Category, Criticality, TaskSpec, TaskStatus};
