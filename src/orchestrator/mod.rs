//! Orchestration: the planning pipeline and the graph execution engine.

pub mod execution;
pub mod planning;

pub use execution::{
    DualWorkerOrchestrator, EscalationHandler, ExecutionResult, ProgressObserver,
};
pub use planning::{DualPlannerOrchestrator, PlanningMetadata};
