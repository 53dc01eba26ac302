//! Task execution: routes each task to the right worker path, runs the
//! judge, applies retry and escalation policy, and walks the graph.
//!
//! One coordinating flow owns all state. The only parallelism is the
//! fan-out of the two workers of a pair (and their verifications); the
//! judge runs only after both legs have joined. Worker and judge failures
//! become task-level results, never a crash of the whole graph run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::CompletionBackend;
use crate::config::Config;
use crate::core::{Criticality, TaskGraph, TaskSpec, TaskStatus};
use crate::error::{Error, Result};
use crate::judge::{should_escalate, Judge, JudgeDecision, JudgeVerdict, RetryFeedback};
use crate::worker::{strategy_pair_for, verify_output, Worker, WorkerResponse};
use crate::{tlog, tlog_warn};

/// Human decision point. The orchestrator blocks on this call and marks
/// the task completed with whatever output the human chose.
#[async_trait]
pub trait EscalationHandler: Send + Sync {
    async fn resolve(&self, task: &TaskSpec, result: &ExecutionResult) -> Result<String>;
}

/// Optional per-task progress notification, invoked once per task in
/// execution order, after that task's result is final.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn task_finished(&self, task_id: &str, result: &ExecutionResult);
}

/// Final record for one task's execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub worker_a_response: Option<WorkerResponse>,
    pub worker_b_response: Option<WorkerResponse>,
    pub judge_decision: Option<JudgeDecision>,
    pub final_output: Option<String>,
    pub attempts: u32,
    pub total_secs: f64,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub human_decision: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionResult {
    fn empty(task_id: &str, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.to_string(),
            status,
            worker_a_response: None,
            worker_b_response: None,
            judge_decision: None,
            final_output: None,
            attempts: 0,
            total_secs: 0.0,
            escalated: false,
            escalation_reason: None,
            human_decision: None,
            completed_at: None,
        }
    }

    /// Placeholder for a task that never ran because execution halted.
    pub fn pending(task_id: &str) -> Self {
        Self::empty(task_id, TaskStatus::Pending)
    }

    fn failed(task_id: &str, attempts: u32, total_secs: f64, reason: String) -> Self {
        Self {
            attempts,
            total_secs,
            escalated: true,
            escalation_reason: Some(reason),
            ..Self::empty(task_id, TaskStatus::Failed)
        }
    }
}

/// The dual-worker execution engine.
pub struct DualWorkerOrchestrator {
    config: Config,
    backend: Arc<dyn CompletionBackend>,
    escalation_handler: Option<Arc<dyn EscalationHandler>>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl DualWorkerOrchestrator {
    pub fn new(config: Config, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            config,
            backend,
            escalation_handler: None,
            observer: None,
        }
    }

    pub fn with_escalation_handler(mut self, handler: Arc<dyn EscalationHandler>) -> Self {
        self.escalation_handler = Some(handler);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the worker pair for a task's category.
    fn worker_pair(&self, task: &TaskSpec) -> (Worker, Worker) {
        let (strategy_a, strategy_b) = strategy_pair_for(task.category);
        let worker_a = Worker::new(
            "worker_a",
            self.config.models.worker_fast.clone(),
            strategy_a,
            Arc::clone(&self.backend),
        );
        let worker_b = Worker::new(
            "worker_b",
            self.config.models.worker_thorough.clone(),
            strategy_b,
            Arc::clone(&self.backend),
        );
        (worker_a, worker_b)
    }

    fn judge_for(&self, task: &TaskSpec) -> Judge {
        Judge::new(
            self.config.judge_model(task.criticality).clone(),
            Arc::clone(&self.backend),
        )
    }

    /// Single-worker path for simple tasks: no judge, acceptance gated
    /// purely on automated verification. Any verification failure
    /// escalates instead of being silently accepted.
    async fn execute_single_worker(
        &self,
        task: &TaskSpec,
        retry_feedback: Option<&RetryFeedback>,
    ) -> ExecutionResult {
        tlog!("Executing task {} with single worker", task.id);
        let started = Instant::now();
        let (worker, _) = self.worker_pair(task);

        let mut response = match worker.execute(task, retry_feedback).await {
            Ok(response) => response,
            Err(err) => {
                tlog_warn!("Single worker failed on task {}: {}", task.id, err);
                return ExecutionResult::failed(
                    &task.id,
                    task.attempts + 1,
                    started.elapsed().as_secs_f64(),
                    format!("Worker failed: {err}"),
                );
            }
        };
        response.apply_verification(verify_output(&response.output, task));

        let total_secs = started.elapsed().as_secs_f64();
        if response.syntax_valid == Some(false) {
            return ExecutionResult {
                worker_a_response: Some(response),
                attempts: task.attempts + 1,
                total_secs,
                escalated: true,
                escalation_reason: Some("Syntax validation failed".to_string()),
                ..ExecutionResult::empty(&task.id, TaskStatus::Escalated)
            };
        }

        let output = response.output.clone();
        ExecutionResult {
            worker_a_response: Some(response),
            final_output: Some(output),
            attempts: task.attempts + 1,
            total_secs,
            completed_at: Some(Utc::now()),
            ..ExecutionResult::empty(&task.id, TaskStatus::Completed)
        }
    }

    /// Dual-worker path: fan out both workers, join, verify both legs,
    /// then judge. A failure in either leg fails the task as a pair.
    async fn execute_dual_worker(
        &self,
        task: &TaskSpec,
        retry_feedback: Option<&RetryFeedback>,
    ) -> ExecutionResult {
        tlog!(
            "Executing task {} with dual workers + {} judge",
            task.id,
            if task.criticality == Criticality::Critical {
                "premium"
            } else {
                "standard"
            }
        );
        let started = Instant::now();
        let (worker_a, worker_b) = self.worker_pair(task);

        let pair = if self.config.enable_parallel_workers {
            futures::join!(
                worker_a.execute(task, retry_feedback),
                worker_b.execute(task, retry_feedback)
            )
        } else {
            // Sequential fallback for rate-limited backends.
            let a = worker_a.execute(task, retry_feedback).await;
            let b = worker_b.execute(task, retry_feedback).await;
            (a, b)
        };

        let (mut response_a, mut response_b) = match pair {
            (Ok(a), Ok(b)) => (a, b),
            (Err(err), _) | (_, Err(err)) => {
                tlog_warn!("Worker pair failed on task {}: {}", task.id, err);
                return ExecutionResult::failed(
                    &task.id,
                    task.attempts + 1,
                    started.elapsed().as_secs_f64(),
                    format!("Execution failed: {err}"),
                );
            }
        };

        response_a.apply_verification(verify_output(&response_a.output, task));
        response_b.apply_verification(verify_output(&response_b.output, task));

        let judge = self.judge_for(task);
        let decision = match judge.evaluate(task, &response_a, &response_b).await {
            Ok(decision) => decision,
            Err(err) => {
                tlog_warn!("Judge call failed on task {}: {}", task.id, err);
                return ExecutionResult {
                    worker_a_response: Some(response_a),
                    worker_b_response: Some(response_b),
                    attempts: task.attempts + 1,
                    total_secs: started.elapsed().as_secs_f64(),
                    escalated: true,
                    escalation_reason: Some(format!("Judge failed: {err}")),
                    ..ExecutionResult::empty(&task.id, TaskStatus::Failed)
                };
            }
        };

        let total_secs = started.elapsed().as_secs_f64();

        let mut status = TaskStatus::Completed;
        let mut final_output = None;
        let mut escalated = false;
        let mut escalation_reason = None;

        match decision.verdict {
            JudgeVerdict::AcceptA => final_output = Some(response_a.output.clone()),
            JudgeVerdict::AcceptB => final_output = Some(response_b.output.clone()),
            JudgeVerdict::RejectBoth => {
                status = TaskStatus::Rejected;
                escalated = true;
                escalation_reason = Some("Both outputs rejected by judge".to_string());
            }
            JudgeVerdict::Merge => {
                // No automated merge of task outputs; a human decides.
                status = TaskStatus::Escalated;
                escalated = true;
                escalation_reason =
                    Some("Judge recommends merging outputs, human decision needed".to_string());
            }
        }

        if !escalated {
            let (needs_human, reason) = should_escalate(
                &decision,
                self.config.auto_escalate_threshold,
                self.config.rejection_threshold,
                task.category,
            );
            if needs_human {
                status = TaskStatus::Escalated;
                escalated = true;
                escalation_reason = reason;
                // No accepted output until the human decides.
                final_output = None;
            }
        }

        ExecutionResult {
            worker_a_response: Some(response_a),
            worker_b_response: Some(response_b),
            judge_decision: Some(decision),
            final_output,
            attempts: task.attempts + 1,
            total_secs,
            escalated,
            escalation_reason,
            human_decision: None,
            completed_at: if escalated { None } else { Some(Utc::now()) },
            ..ExecutionResult::empty(&task.id, status)
        }
    }

    /// Execute one attempt, routed by criticality.
    pub async fn execute_task(
        &self,
        task: &TaskSpec,
        retry_feedback: Option<&RetryFeedback>,
    ) -> ExecutionResult {
        if task.criticality == Criticality::Simple {
            self.execute_single_worker(task, retry_feedback).await
        } else {
            self.execute_dual_worker(task, retry_feedback).await
        }
    }

    /// Execute a task, retrying on rejection with judge feedback.
    ///
    /// Rejection is the only retry trigger. Failure and escalation go
    /// straight through, and the attempt counter bounds the loop.
    pub async fn execute_with_retry(&self, task: &mut TaskSpec) -> ExecutionResult {
        let mut result = self.execute_task(task, None).await;

        while self.config.enable_auto_retry
            && result.status == TaskStatus::Rejected
            && result.attempts < task.max_attempts
        {
            tlog!(
                "Task {} rejected, retrying with feedback (attempt {}/{})",
                task.id,
                task.attempts + 1,
                task.max_attempts
            );
            let feedback = result
                .judge_decision
                .as_ref()
                .map(RetryFeedback::from_decision)
                .unwrap_or_else(|| RetryFeedback {
                    concerns: Vec::new(),
                    recommendation: "Improve the output quality".to_string(),
                });
            task.attempts += 1;
            result = self.execute_task(task, Some(&feedback)).await;
        }

        result
    }

    /// Resolve an escalated task through the human handler.
    ///
    /// # Errors
    ///
    /// `Error::NoEscalationHandler` when no handler is installed.
    pub async fn handle_escalation(
        &self,
        task: &TaskSpec,
        mut result: ExecutionResult,
    ) -> Result<ExecutionResult> {
        let handler = self
            .escalation_handler
            .as_ref()
            .ok_or_else(|| Error::NoEscalationHandler(task.id.clone()))?;

        tlog!("Escalating task {} to human", task.id);
        let chosen = handler.resolve(task, &result).await?;

        result.final_output = Some(chosen.clone());
        result.human_decision = Some(chosen);
        result.status = TaskStatus::Completed;
        result.completed_at = Some(Utc::now());
        Ok(result)
    }

    /// Execute a whole graph in topological order.
    ///
    /// Escalated tasks are resolved inline when a handler is installed
    /// and execution continues. Without a handler, or on failure, the
    /// run halts and every not-yet-run task is recorded as pending.
    pub async fn execute_graph(
        &self,
        graph: &TaskGraph,
    ) -> Result<BTreeMap<String, ExecutionResult>> {
        let report = graph.validate();
        if !report.is_valid() {
            return Err(Error::Validation(format!(
                "Invalid task graph: {}",
                report.errors.join("; ")
            )));
        }

        let order = graph.topological_order()?;
        tlog!(
            "Executing task graph with {} tasks in order: {:?}",
            graph.len(),
            order
        );

        let mut results = BTreeMap::new();
        let mut halted_at = None;

        for (index, task_id) in order.iter().enumerate() {
            // Validation guarantees every ordered id resolves.
            let Some(task) = graph.task(task_id) else {
                return Err(Error::Validation(format!("unknown task id: {task_id}")));
            };
            let mut task = task.clone();

            tlog!(
                "Executing task {} ({}/{} complete)",
                task_id,
                index,
                order.len()
            );
            let mut result = self.execute_with_retry(&mut task).await;

            if result.status == TaskStatus::Escalated && self.escalation_handler.is_some() {
                result = self.handle_escalation(&task, result).await?;
            }

            let status = result.status;
            if let Some(observer) = &self.observer {
                observer.task_finished(task_id, &result).await;
            }
            results.insert(task_id.clone(), result);

            if matches!(status, TaskStatus::Failed | TaskStatus::Escalated) {
                tlog_warn!("Task {} {} - stopping graph execution", task_id, status);
                halted_at = Some(index);
                break;
            }
        }

        if let Some(index) = halted_at {
            for remaining in &order[index + 1..] {
                results.insert(remaining.clone(), ExecutionResult::pending(remaining));
            }
        }

        Ok(results)
    }
}
