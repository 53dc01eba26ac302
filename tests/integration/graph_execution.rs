//! Graph execution integration tests.
//!
//! These drive `DualWorkerOrchestrator::execute_graph` end to end over a
//! scripted backend: worker routing, the verification override, escalation
//! policy, retry-on-rejection, and halt-on-failure ordering.

use std::sync::Arc;

use async_trait::async_trait;

use tandem::core::{Criticality, TaskSpec, TaskStatus};
use tandem::judge::JudgeVerdict;
use tandem::orchestrator::{DualWorkerOrchestrator, EscalationHandler, ExecutionResult};
use tandem::Result;

use crate::fixtures::{
    code_output, diamond_graph, judge_json, linear_graph, single_task_graph, test_config,
    MockBackend,
};

fn stub_happy_worker_defaults(backend: &MockBackend) {
    backend.stub(&["worker-fast"], &code_output(true, "fast_path"));
    backend.stub(&["worker-thorough"], &code_output(true, "thorough_path"));
    backend.stub(&["judge-standard"], &judge_json("accept_a", 0.9, 95.0, 70.0));
}

#[tokio::test]
async fn test_linear_graph_completes_in_order() {
    let backend = Arc::new(MockBackend::new());
    stub_happy_worker_defaults(&backend);

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let results = orchestrator.execute_graph(&linear_graph()).await.unwrap();

    assert_eq!(results.len(), 3);
    for id in ["T1", "T2", "T3"] {
        let result = &results[id];
        assert_eq!(result.status, TaskStatus::Completed, "task {id}");
        assert!(result.final_output.as_deref().unwrap().contains("fast_path"));
        assert_eq!(result.attempts, 1);
        assert!(result.judge_decision.is_some());
    }
}

/// One syntactically invalid output in a pair must lose, no matter how
/// the judge scored it.
#[tokio::test]
async fn test_syntax_invalid_output_forces_accepting_the_valid_one() {
    let backend = Arc::new(MockBackend::new());
    // Specific rules for T2 go first so they win over the defaults.
    backend.stub(&["worker-fast", "Task two"], &code_output(false, "broken"));
    backend.stub(
        &["worker-thorough", "Task two"],
        &code_output(true, "sound_version"),
    );
    // The judge perversely prefers the broken output with high scores.
    backend.stub(
        &["judge-standard", "Task two"],
        &judge_json("accept_a", 0.9, 95.0, 88.0),
    );
    stub_happy_worker_defaults(&backend);

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let results = orchestrator.execute_graph(&linear_graph()).await.unwrap();

    let t2 = &results["T2"];
    assert_eq!(t2.status, TaskStatus::Completed);
    let decision = t2.judge_decision.as_ref().unwrap();
    assert_eq!(decision.verdict, JudgeVerdict::AcceptB);
    assert!(t2
        .final_output
        .as_deref()
        .unwrap()
        .contains("sound_version"));
    assert!(decision
        .concerns
        .iter()
        .any(|c| c.contains("Worker A output has syntax errors")));
    assert_eq!(results["T3"].status, TaskStatus::Completed);
}

/// An accepted verdict under the confidence threshold still escalates.
#[tokio::test]
async fn test_low_confidence_escalates_despite_acceptance() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(true, "a_side"));
    backend.stub(&["worker-thorough"], &code_output(true, "b_side"));
    backend.stub(&["judge-standard"], &judge_json("accept_a", 0.55, 95.0, 70.0));

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let results = orchestrator
        .execute_graph(&single_task_graph(Criticality::Standard))
        .await
        .unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Escalated);
    assert!(t1.escalated);
    assert!(t1
        .escalation_reason
        .as_deref()
        .unwrap()
        .contains("confidence too low"));
    assert!(t1.final_output.is_none());
}

/// Halt-on-failure: in a diamond, a failure in one branch leaves the
/// other branch pending too, even though its own dependencies are met.
#[tokio::test]
async fn test_diamond_halts_downstream_on_failure() {
    let backend = Arc::new(MockBackend::new());
    // Only task one is scripted; task two's workers hit backend errors.
    backend.stub(&["worker-fast", "Task one"], &code_output(true, "one_a"));
    backend.stub(&["worker-thorough", "Task one"], &code_output(true, "one_b"));
    backend.stub(
        &["judge-standard", "Task one"],
        &judge_json("accept_a", 0.9, 95.0, 70.0),
    );

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let results = orchestrator.execute_graph(&diamond_graph()).await.unwrap();

    assert_eq!(results["T1"].status, TaskStatus::Completed);
    assert_eq!(results["T2"].status, TaskStatus::Failed);
    assert_eq!(results["T3"].status, TaskStatus::Pending);
    assert_eq!(results["T4"].status, TaskStatus::Pending);
    assert!(results["T2"]
        .escalation_reason
        .as_deref()
        .unwrap()
        .contains("Execution failed"));
}

/// Rejection triggers exactly one kind of retry: re-execution with the
/// judge's feedback, bounded by the attempt cap.
#[tokio::test]
async fn test_rejection_retries_with_feedback_then_completes() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(true, "first_try"));
    backend.stub(&["worker-thorough"], &code_output(true, "second_opinion"));
    backend.stub_sequence(
        &["judge-standard"],
        &[
            &judge_json("reject_both", 0.9, 40.0, 45.0),
            &judge_json("accept_a", 0.9, 95.0, 70.0),
        ],
    );

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend.clone());
    let results = orchestrator
        .execute_graph(&single_task_graph(Criticality::Standard))
        .await
        .unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Completed);
    assert_eq!(t1.attempts, 2);
    // Two judge rounds: the rejection and the acceptance.
    assert_eq!(backend.hits(&["judge-standard"]), 2);
}

#[tokio::test]
async fn test_rejection_exhausts_attempt_cap() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(true, "attempt"));
    backend.stub(&["worker-thorough"], &code_output(true, "attempt"));
    backend.stub(&["judge-standard"], &judge_json("reject_both", 0.9, 40.0, 45.0));

    let mut graph = single_task_graph(Criticality::Standard);
    graph.tasks[0].max_attempts = 2;

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend.clone());
    let results = orchestrator.execute_graph(&graph).await.unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Rejected);
    assert_eq!(t1.attempts, 2);
    assert_eq!(backend.hits(&["judge-standard"]), 2);
}

struct ScriptedHuman;

#[async_trait]
impl EscalationHandler for ScriptedHuman {
    async fn resolve(&self, _task: &TaskSpec, _result: &ExecutionResult) -> Result<String> {
        Ok("human chosen output".to_string())
    }
}

/// With a handler installed, an escalated task resolves to completed and
/// the graph keeps going.
#[tokio::test]
async fn test_escalation_handler_resolves_and_execution_continues() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(
        &["judge-standard", "Task one"],
        &judge_json("accept_a", 0.4, 95.0, 70.0),
    );
    stub_happy_worker_defaults(&backend);

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend)
        .with_escalation_handler(Arc::new(ScriptedHuman));
    let results = orchestrator.execute_graph(&linear_graph()).await.unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Completed);
    assert_eq!(t1.human_decision.as_deref(), Some("human chosen output"));
    assert_eq!(t1.final_output.as_deref(), Some("human chosen output"));
    assert_eq!(results["T2"].status, TaskStatus::Completed);
    assert_eq!(results["T3"].status, TaskStatus::Completed);
}

/// A merge verdict on task outputs is a human decision, not an automated
/// merge.
#[tokio::test]
async fn test_merge_verdict_escalates() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(true, "a_side"));
    backend.stub(&["worker-thorough"], &code_output(true, "b_side"));
    backend.stub(&["judge-standard"], &judge_json("merge", 0.9, 90.0, 89.0));

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let results = orchestrator
        .execute_graph(&single_task_graph(Criticality::Standard))
        .await
        .unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Escalated);
    assert!(t1
        .escalation_reason
        .as_deref()
        .unwrap()
        .contains("merging outputs"));
}

/// Simple criticality takes the single-worker path with no judge.
#[tokio::test]
async fn test_simple_task_skips_judge() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(true, "solo"));
    backend.stub(&["judge-standard"], &judge_json("accept_a", 0.9, 95.0, 70.0));

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend.clone());
    let results = orchestrator
        .execute_graph(&single_task_graph(Criticality::Simple))
        .await
        .unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Completed);
    assert!(t1.judge_decision.is_none());
    assert!(t1.worker_b_response.is_none());
    assert_eq!(backend.hits(&["judge-standard"]), 0);
}

/// A simple task whose only output fails verification escalates instead
/// of being accepted.
#[tokio::test]
async fn test_simple_task_with_invalid_syntax_escalates() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(false, "solo"));

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let results = orchestrator
        .execute_graph(&single_task_graph(Criticality::Simple))
        .await
        .unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Escalated);
    assert_eq!(
        t1.escalation_reason.as_deref(),
        Some("Syntax validation failed")
    );
}

/// Critical tasks route to the premium judge.
#[tokio::test]
async fn test_critical_task_uses_premium_judge() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["worker-fast"], &code_output(true, "a_side"));
    backend.stub(&["worker-thorough"], &code_output(true, "b_side"));
    backend.stub(&["judge-premium"], &judge_json("accept_b", 0.9, 70.0, 95.0));

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend.clone());
    let results = orchestrator
        .execute_graph(&single_task_graph(Criticality::Critical))
        .await
        .unwrap();

    let t1 = &results["T1"];
    assert_eq!(t1.status, TaskStatus::Completed);
    assert!(t1.final_output.as_deref().unwrap().contains("b_side"));
    assert_eq!(backend.hits(&["judge-premium"]), 1);
}

#[tokio::test]
async fn test_invalid_graph_is_rejected_before_execution() {
    let backend = Arc::new(MockBackend::new());
    let mut graph = single_task_graph(Criticality::Standard);
    graph.add_edge("T1", "T99");

    let orchestrator = DualWorkerOrchestrator::new(test_config(), backend);
    let outcome = orchestrator.execute_graph(&graph).await;
    assert!(outcome.is_err());
}
