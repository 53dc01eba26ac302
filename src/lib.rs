pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod judge;
pub mod log;
pub mod orchestrator;
pub mod parse;
pub mod planner;
pub mod prompts;
pub mod storage;
pub mod worker;

pub use config::Config;
pub use crate::core::{TaskGraph, TaskSpec, TaskStatus};
pub use error::{Error, Result};
pub use orchestrator::{DualPlannerOrchestrator, DualWorkerOrchestrator, ExecutionResult};
