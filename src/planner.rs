//! Planners decompose a goal into a task graph; the planning judge
//! compares two competing graphs.
//!
//! Two planners with different strategies attack the same goal so the
//! judge can pick the stronger decomposition or merge the two. Unlike the
//! task judge, a planner's parse failure is an error: there is no safe
//! default task graph, so the caller's retry loop owns recovery.

use std::sync::Arc;
use std::time::Instant;

use crate::backend::{CompletionBackend, Message};
use crate::config::ModelConfig;
use crate::core::TaskGraph;
use crate::error::Result;
use crate::judge::JudgeVerdict;
use crate::parse;
use crate::prompts;
use crate::worker::WorkerStrategy;
use crate::{tlog, tlog_warn};

/// A planner bound to one model and one decomposition strategy.
pub struct Planner {
    pub model: ModelConfig,
    pub strategy: WorkerStrategy,
    backend: Arc<dyn CompletionBackend>,
}

impl Planner {
    pub fn new(
        model: ModelConfig,
        strategy: WorkerStrategy,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            model,
            strategy,
            backend,
        }
    }

    /// Decompose a goal into a task graph.
    ///
    /// `extra_context` carries validation issues or judge feedback on
    /// retry attempts. The returned graph is unvalidated; the caller runs
    /// the validation pass.
    pub async fn create_plan(&self, goal: &str, extra_context: Option<&str>) -> Result<TaskGraph> {
        let prompt = prompts::planner_prompt(goal, self.strategy, extra_context);
        let messages = [Message::system(prompts::PLANNER_SYSTEM), Message::user(prompt)];

        let response = self.backend.complete(&messages, &self.model).await?;
        let graph = parse::parse_plan_payload(&response.content)?;

        tlog!(
            "Planner ({}, {}) produced {} tasks and {} edges",
            self.model.model_name,
            self.strategy,
            graph.len(),
            graph.edges.len()
        );

        Ok(graph)
    }
}

/// The planning judge's comparison of two candidate graphs.
#[derive(Debug, Clone)]
pub struct PlanEvaluation {
    pub verdict: JudgeVerdict,
    pub confidence: f64,
    pub plan_a_score: f64,
    pub plan_b_score: f64,
    pub reasoning: String,
    pub recommendation: Option<String>,
    /// Task ids to keep from each side when the verdict is a merge.
    pub take_from_a: Vec<String>,
    pub take_from_b: Vec<String>,
    pub duration_secs: f64,
}

impl PlanEvaluation {
    fn safe_default(duration_secs: f64) -> Self {
        Self {
            verdict: JudgeVerdict::RejectBoth,
            confidence: 0.0,
            plan_a_score: 50.0,
            plan_b_score: 50.0,
            reasoning: "Planning judge failed to produce a valid evaluation".to_string(),
            recommendation: Some("Judge failed to evaluate, review plans manually".to_string()),
            take_from_a: Vec::new(),
            take_from_b: Vec::new(),
            duration_secs,
        }
    }
}

/// Judge for competing plans. Always runs on the premium judge model.
pub struct PlanningJudge {
    pub model: ModelConfig,
    backend: Arc<dyn CompletionBackend>,
}

impl PlanningJudge {
    pub fn new(model: ModelConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { model, backend }
    }

    /// Compare two candidate graphs for the same goal.
    ///
    /// An unparseable evaluation collapses to a reject-both default with
    /// zero confidence rather than an error.
    pub async fn evaluate_plans(
        &self,
        goal: &str,
        plan_a: &TaskGraph,
        plan_b: &TaskGraph,
        planner_a_model: &str,
        planner_b_model: &str,
    ) -> Result<PlanEvaluation> {
        let plan_a_json = serde_json::to_string_pretty(plan_a)?;
        let plan_b_json = serde_json::to_string_pretty(plan_b)?;

        let prompt = prompts::planning_judge_prompt(
            goal,
            planner_a_model,
            &plan_a_json,
            planner_b_model,
            &plan_b_json,
        );
        let messages = [
            Message::system(prompts::PLANNING_JUDGE_SYSTEM),
            Message::user(prompt),
        ];

        let started = Instant::now();
        let response = self.backend.complete(&messages, &self.model).await?;
        let duration_secs = started.elapsed().as_secs_f64();

        let payload = match parse::parse_plan_verdict_payload(&response.content) {
            Ok(payload) => payload,
            Err(err) => {
                tlog_warn!("Planning judge response unusable: {}", err);
                return Ok(PlanEvaluation::safe_default(duration_secs));
            }
        };

        let verdict = match JudgeVerdict::parse(&payload.verdict) {
            Some(verdict) => verdict,
            None => {
                tlog_warn!("Planning judge returned unknown verdict '{}'", payload.verdict);
                return Ok(PlanEvaluation::safe_default(duration_secs));
            }
        };

        tlog!(
            "Planning judge decision: {} (A: {:.0}, B: {:.0})",
            verdict,
            payload.plan_a_score,
            payload.plan_b_score
        );

        Ok(PlanEvaluation {
            verdict,
            confidence: payload.confidence,
            plan_a_score: payload.plan_a_score,
            plan_b_score: payload.plan_b_score,
            reasoning: payload.reasoning,
            recommendation: payload.recommendation,
            take_from_a: payload.take_from_a,
            take_from_b: payload.take_from_b,
            duration_secs,
        })
    }
}

/// Merge two plans by keeping the named task ids from each side.
///
/// An edge survives only when both of its endpoints survive; duplicate
/// edges are dropped. The result is NOT validated here, callers must
/// re-run the validation pass before using it.
pub fn merge_plans(plan_a: &TaskGraph, plan_b: &TaskGraph, evaluation: &PlanEvaluation) -> TaskGraph {
    let mut tasks = Vec::new();
    for id in &evaluation.take_from_a {
        if let Some(task) = plan_a.task(id) {
            tasks.push(task.clone());
        }
    }
    for id in &evaluation.take_from_b {
        if let Some(task) = plan_b.task(id) {
            // A left-side task with the same id wins.
            if !tasks.iter().any(|t| &t.id == id) {
                tasks.push(task.clone());
            }
        }
    }

    let kept: std::collections::HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let mut edges: Vec<(String, String)> = Vec::new();
    for (from, to) in plan_a.edges.iter().chain(plan_b.edges.iter()) {
        if kept.contains(from.as_str()) && kept.contains(to.as_str()) {
            let edge = (from.clone(), to.clone());
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
    }

    let merged = TaskGraph::from_parts(tasks, edges);
    tlog!(
        "Merged plan has {} tasks and {} edges",
        merged.len(),
        merged.edges.len()
    );
    merged
}
