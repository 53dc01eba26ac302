//! Planning: run two planners against the same goal, judge the results,
//! and only hand a validated graph onward.
//!
//! The loop is bounded by `max_planning_retries + 1` attempts. Structural
//! invalidity of both plans short-circuits to a retry with the issues fed
//! back; a judged verdict that picks an invalid side falls back to the
//! other; a merge that fails validation counts as a failed attempt.
//! Exhaustion is the one planning condition that surfaces as a hard error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::CompletionBackend;
use crate::config::Config;
use crate::core::TaskGraph;
use crate::error::{Error, Result};
use crate::judge::JudgeVerdict;
use crate::planner::{merge_plans, PlanEvaluation, Planner, PlanningJudge};
use crate::worker::WorkerStrategy;
use crate::{tlog, tlog_warn};

/// How the winning plan was selected, recorded alongside the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningMetadata {
    pub verdict: String,
    pub plan_a_score: Option<f64>,
    pub plan_b_score: Option<f64>,
    pub attempts: u32,
}

/// The dual-planner pipeline.
pub struct DualPlannerOrchestrator {
    config: Config,
    planner_a: Planner,
    planner_b: Planner,
    judge: PlanningJudge,
}

impl DualPlannerOrchestrator {
    pub fn new(config: Config, backend: Arc<dyn CompletionBackend>) -> Self {
        let planner_a = Planner::new(
            config.models.planner_fast.clone(),
            WorkerStrategy::Pragmatic,
            Arc::clone(&backend),
        );
        let planner_b = Planner::new(
            config.models.planner_thorough.clone(),
            WorkerStrategy::Comprehensive,
            Arc::clone(&backend),
        );
        // Plan evaluation always runs on the premium judge.
        let judge = PlanningJudge::new(config.models.judge_premium.clone(), backend);
        Self {
            config,
            planner_a,
            planner_b,
            judge,
        }
    }

    /// Produce a validated plan for a goal.
    ///
    /// # Errors
    ///
    /// `Error::PlanningFailed` after `max_planning_retries + 1` attempts
    /// without a valid accepted or merged graph. Backend transport
    /// exhaustion inside a planner or judge call also propagates.
    pub async fn create_validated_plan(
        &self,
        goal: &str,
    ) -> Result<(TaskGraph, PlanningMetadata)> {
        let max_attempts = self.config.max_planning_retries + 1;
        let mut extra_context: Option<String> = None;
        let mut last_issue = String::from("no valid plan produced");

        for attempt in 1..=max_attempts {
            tlog!("Planning attempt {}/{}", attempt, max_attempts);
            let context = extra_context.as_deref();

            let (plan_a, plan_b) = futures::join!(
                self.planner_a.create_plan(goal, context),
                self.planner_b.create_plan(goal, context)
            );

            // A planner whose payload does not parse yields no graph at
            // all; treat that side as an invalid plan rather than aborting.
            let plan_a = match plan_a {
                Ok(graph) => Some(graph),
                Err(Error::Parse(msg)) => {
                    tlog_warn!("Planner A produced unparseable plan: {}", msg);
                    last_issue = format!("Plan A unparseable: {msg}");
                    None
                }
                Err(err) => return Err(err),
            };
            let plan_b = match plan_b {
                Ok(graph) => Some(graph),
                Err(Error::Parse(msg)) => {
                    tlog_warn!("Planner B produced unparseable plan: {}", msg);
                    last_issue = format!("Plan B unparseable: {msg}");
                    None
                }
                Err(err) => return Err(err),
            };

            let report_a = plan_a.as_ref().map(|p| p.validate());
            let report_b = plan_b.as_ref().map(|p| p.validate());
            let valid_a = report_a.as_ref().is_some_and(|r| r.is_valid());
            let valid_b = report_b.as_ref().is_some_and(|r| r.is_valid());

            if !valid_a && !valid_b {
                tlog_warn!("Both plans invalid on attempt {}, retrying", attempt);
                let issues_a = report_a.map_or_else(
                    || "unparseable response".to_string(),
                    |r| r.errors.join("; "),
                );
                let issues_b = report_b.map_or_else(
                    || "unparseable response".to_string(),
                    |r| r.errors.join("; "),
                );
                last_issue = format!("Plan A: {issues_a}. Plan B: {issues_b}");
                extra_context = Some(format!(
                    "Previous attempts had these issues:\n\
                     Plan A: {issues_a}\n\
                     Plan B: {issues_b}\n\
                     Ensure the new plan has no cycles and all references are valid."
                ));
                continue;
            }

            // At least one side is usable; an unparseable side becomes an
            // empty graph so the judge still sees both slots.
            let plan_a = plan_a.unwrap_or_default();
            let plan_b = plan_b.unwrap_or_default();

            let evaluation = self
                .judge
                .evaluate_plans(
                    goal,
                    &plan_a,
                    &plan_b,
                    &self.planner_a.model.model_name,
                    &self.planner_b.model.model_name,
                )
                .await?;

            match self.apply_verdict(&plan_a, valid_a, &plan_b, valid_b, &evaluation) {
                Some((graph, verdict)) => {
                    return Ok((
                        graph,
                        PlanningMetadata {
                            verdict,
                            plan_a_score: Some(evaluation.plan_a_score),
                            plan_b_score: Some(evaluation.plan_b_score),
                            attempts: attempt,
                        },
                    ));
                }
                None => {
                    last_issue = evaluation
                        .recommendation
                        .clone()
                        .unwrap_or_else(|| "judge rejected both plans".to_string());
                    if attempt < max_attempts {
                        extra_context = evaluation.recommendation.clone();
                    }
                }
            }
        }

        Err(Error::PlanningFailed {
            attempts: max_attempts,
            message: last_issue,
        })
    }

    /// Turn a judge verdict into a final graph, or `None` to retry.
    ///
    /// An accepted side must be structurally valid; otherwise the other
    /// side is taken when it is. A merge is only final when the merged
    /// graph re-validates.
    fn apply_verdict(
        &self,
        plan_a: &TaskGraph,
        valid_a: bool,
        plan_b: &TaskGraph,
        valid_b: bool,
        evaluation: &PlanEvaluation,
    ) -> Option<(TaskGraph, String)> {
        match evaluation.verdict {
            JudgeVerdict::AcceptA => {
                if valid_a {
                    Some((plan_a.clone(), "accept_a".to_string()))
                } else if valid_b {
                    Some((plan_b.clone(), "accept_b (fallback)".to_string()))
                } else {
                    None
                }
            }
            JudgeVerdict::AcceptB => {
                if valid_b {
                    Some((plan_b.clone(), "accept_b".to_string()))
                } else if valid_a {
                    Some((plan_a.clone(), "accept_a (fallback)".to_string()))
                } else {
                    None
                }
            }
            JudgeVerdict::Merge => {
                let merged = merge_plans(plan_a, plan_b, evaluation);
                let report = merged.validate();
                if report.is_valid() && !merged.is_empty() {
                    Some((merged, "merge".to_string()))
                } else {
                    tlog_warn!("Merged plan invalid: {}", report.errors.join("; "));
                    None
                }
            }
            JudgeVerdict::RejectBoth => None,
        }
    }
}
