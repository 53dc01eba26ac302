//! State persistence: plans and execution results as JSON on disk.
//!
//! The store is a plain directory with `plans/` and `executions/`
//! subdirectories. Every document is pretty-printed JSON so a run can be
//! inspected and replayed by hand. The orchestrators never touch this
//! layer directly; callers decide what gets persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::TaskGraph;
use crate::error::Result;
use crate::orchestrator::{ExecutionResult, PlanningMetadata};
use crate::tlog_debug;

/// A persisted plan: the goal, the graph, and how it was chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub session_id: String,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub graph: TaskGraph,
    pub metadata: PlanningMetadata,
}

impl PlanDocument {
    pub fn new(goal: &str, graph: TaskGraph, metadata: PlanningMetadata) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            goal: goal.to_string(),
            created_at: Utc::now(),
            graph,
            metadata,
        }
    }
}

/// File-backed store for plans and execution results.
pub struct StateStore {
    plans_dir: PathBuf,
    executions_dir: PathBuf,
}

impl StateStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let plans_dir = dir.join("plans");
        let executions_dir = dir.join("executions");
        fs::create_dir_all(&plans_dir)?;
        fs::create_dir_all(&executions_dir)?;
        Ok(Self {
            plans_dir,
            executions_dir,
        })
    }

    /// Persist a plan document; returns the file path.
    pub fn save_plan(&self, plan: &PlanDocument) -> Result<PathBuf> {
        let path = self.plans_dir.join(format!("{}.json", plan.session_id));
        fs::write(&path, serde_json::to_string_pretty(plan)?)?;
        tlog_debug!("Saved plan to {}", path.display());
        Ok(path)
    }

    /// Load a plan document by session id.
    pub fn load_plan(&self, session_id: &str) -> Result<PlanDocument> {
        let path = self.plans_dir.join(format!("{session_id}.json"));
        let plan = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(plan)
    }

    /// List stored plan session ids, most recently modified last.
    pub fn list_plans(&self) -> Result<Vec<String>> {
        let mut entries: Vec<(std::time::SystemTime, String)> = Vec::new();
        for entry in fs::read_dir(&self.plans_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    let modified = entry.metadata()?.modified()?;
                    entries.push((modified, stem.to_string()));
                }
            }
        }
        entries.sort();
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }

    /// Persist one task's execution result under a session id.
    pub fn save_execution_result(
        &self,
        session_id: &str,
        result: &ExecutionResult,
    ) -> Result<PathBuf> {
        let path = self
            .executions_dir
            .join(format!("{}_{}.json", session_id, result.task_id));
        fs::write(&path, serde_json::to_string_pretty(result)?)?;
        tlog_debug!("Saved execution result to {}", path.display());
        Ok(path)
    }

    /// Load one task's execution result.
    pub fn load_execution_result(
        &self,
        session_id: &str,
        task_id: &str,
    ) -> Result<ExecutionResult> {
        let path = self
            .executions_dir
            .join(format!("{session_id}_{task_id}.json"));
        let result = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(result)
    }
}
