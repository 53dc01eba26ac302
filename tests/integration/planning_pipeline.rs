//! Planning pipeline integration tests.
//!
//! These exercise `DualPlannerOrchestrator::create_validated_plan` over a
//! scripted backend: verdict handling, invalid-plan fallback, merge
//! re-validation, bounded retries, and terminal planning failure.

use std::sync::Arc;

use tandem::orchestrator::DualPlannerOrchestrator;
use tandem::Error;

use crate::fixtures::{plan_json, plan_verdict_json, test_config, MockBackend};

#[tokio::test]
async fn test_accepted_plan_first_attempt() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["planner-fast"], &plan_json("T1", "T2"));
    backend.stub(&["planner-thorough"], &plan_json("B1", "B2"));
    backend.stub(&["judge-premium"], &plan_verdict_json("accept_a", 0.9));

    let orchestrator = DualPlannerOrchestrator::new(test_config(), backend);
    let (graph, metadata) = orchestrator
        .create_validated_plan("build a url shortener")
        .await
        .unwrap();

    assert_eq!(metadata.verdict, "accept_a");
    assert_eq!(metadata.attempts, 1);
    assert_eq!(metadata.plan_a_score, Some(85.0));
    let ids: Vec<&str> = graph.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["T1", "T2"]);
    assert!(graph.validate().is_valid());
}

/// Both planners failing to produce parseable payloads on every attempt
/// must terminate in exactly maxRetries + 1 planning rounds.
#[tokio::test]
async fn test_unparseable_plans_exhaust_all_attempts() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["planner-fast"], "I cannot produce a plan right now.");
    backend.stub(&["planner-thorough"], "Let me think about this some more.");

    let mut config = test_config();
    config.max_planning_retries = 2;

    let orchestrator = DualPlannerOrchestrator::new(config, backend.clone());
    let outcome = orchestrator.create_validated_plan("impossible goal").await;

    match outcome {
        Err(Error::PlanningFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected PlanningFailed, got {other:?}"),
    }
    // Each planner was consulted once per attempt, and the judge never ran.
    assert_eq!(backend.hits(&["planner-fast"]), 3);
    assert_eq!(backend.hits(&["planner-thorough"]), 3);
}

/// An accepted side that fails validation falls back to the other side.
#[tokio::test]
async fn test_invalid_accepted_plan_falls_back_to_other_side() {
    let backend = Arc::new(MockBackend::new());
    // Plan A contains a cycle; plan B is sound.
    let cyclic = r#"{
        "tasks": [
            {"id": "T1", "description": "first"},
            {"id": "T2", "description": "second"}
        ],
        "edges": [["T1", "T2"], ["T2", "T1"]]
    }"#;
    backend.stub(&["planner-fast"], cyclic);
    backend.stub(&["planner-thorough"], &plan_json("B1", "B2"));
    backend.stub(&["judge-premium"], &plan_verdict_json("accept_a", 0.9));

    let orchestrator = DualPlannerOrchestrator::new(test_config(), backend);
    let (graph, metadata) = orchestrator
        .create_validated_plan("cyclic goal")
        .await
        .unwrap();

    assert_eq!(metadata.verdict, "accept_b (fallback)");
    let ids: Vec<&str> = graph.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["B1", "B2"]);
}

/// A merge keeps the named ids from each side and only the edges whose
/// endpoints both survive, then re-validates.
#[tokio::test]
async fn test_merge_verdict_produces_combined_plan() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["planner-fast"], &plan_json("T1", "T2"));
    backend.stub(&["planner-thorough"], &plan_json("B1", "B2"));
    let merge_verdict = r#"{
        "verdict": "merge",
        "confidence": 0.8,
        "plan_a_score": 80.0,
        "plan_b_score": 78.0,
        "reasoning": "scripted",
        "merge_strategy": {"take_from_a": ["T1"], "take_from_b": ["B1", "B2"]}
    }"#;
    backend.stub(&["judge-premium"], merge_verdict);

    let orchestrator = DualPlannerOrchestrator::new(test_config(), backend);
    let (graph, metadata) = orchestrator
        .create_validated_plan("merged goal")
        .await
        .unwrap();

    assert_eq!(metadata.verdict, "merge");
    let ids: Vec<&str> = graph.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["T1", "B1", "B2"]);
    // The T1 -> T2 edge dies with T2; B1 -> B2 survives.
    assert_eq!(graph.edges, vec![("B1".to_string(), "B2".to_string())]);
}

/// A rejected first round retries with the judge's recommendation and can
/// still succeed within the budget.
#[tokio::test]
async fn test_rejected_round_retries_then_accepts() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["planner-fast"], &plan_json("T1", "T2"));
    backend.stub(&["planner-thorough"], &plan_json("B1", "B2"));
    backend.stub_sequence(
        &["judge-premium"],
        &[
            &plan_verdict_json("reject_both", 0.9),
            &plan_verdict_json("accept_b", 0.85),
        ],
    );

    let orchestrator = DualPlannerOrchestrator::new(test_config(), backend.clone());
    let (graph, metadata) = orchestrator
        .create_validated_plan("retry goal")
        .await
        .unwrap();

    assert_eq!(metadata.verdict, "accept_b");
    assert_eq!(metadata.attempts, 2);
    assert_eq!(backend.hits(&["judge-premium"]), 2);
    let ids: Vec<&str> = graph.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["B1", "B2"]);
}

/// An unparseable planning-judge response is a reject-both, not a crash.
#[tokio::test]
async fn test_garbage_judge_response_counts_as_rejection() {
    let backend = Arc::new(MockBackend::new());
    backend.stub(&["planner-fast"], &plan_json("T1", "T2"));
    backend.stub(&["planner-thorough"], &plan_json("B1", "B2"));
    backend.stub(&["judge-premium"], "the first plan seems nicer to me");

    let mut config = test_config();
    config.max_planning_retries = 1;

    let orchestrator = DualPlannerOrchestrator::new(config, backend.clone());
    let outcome = orchestrator.create_validated_plan("vague goal").await;

    assert!(matches!(
        outcome,
        Err(Error::PlanningFailed { attempts: 2, .. })
    ));
    assert_eq!(backend.hits(&["judge-premium"]), 2);
}
