//! Test fixtures for integration tests.
//!
//! Provides a scripted completion backend, canned judge/planner payloads,
//! and predefined task graphs. No test here makes a real network call.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use tandem::backend::{ChatResponse, CompletionBackend, Message};
use tandem::config::{Config, ModelConfig};
use tandem::core::{Category, Criticality, TaskGraph, TaskSpec};
use tandem::{Error, Result};

struct Rule {
    needles: Vec<String>,
    responses: VecDeque<String>,
    hits: usize,
}

/// Completion backend that answers from scripted rules.
///
/// Rules are matched in registration order. A rule's first needle must
/// equal the requested model name exactly; any further needles must
/// appear somewhere in the message bodies. Exact model matching matters
/// because judge prompts embed the worker model names, so a substring
/// match on the model would let worker rules swallow judge calls. A
/// rule with several responses consumes them in order and repeats the
/// last one. An unmatched call errors, which doubles as a way to
/// script failures.
pub struct MockBackend {
    rules: Mutex<Vec<Rule>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
        }
    }

    /// Register a rule with a single repeating response.
    pub fn stub(&self, needles: &[&str], response: &str) {
        self.stub_sequence(needles, &[response]);
    }

    /// Register a rule that serves responses in order, repeating the last.
    pub fn stub_sequence(&self, needles: &[&str], responses: &[&str]) {
        let mut rules = self.rules.lock().unwrap();
        rules.push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            responses: responses.iter().map(|r| r.to_string()).collect(),
            hits: 0,
        });
    }

    /// How many calls a rule has served, identified by its needles.
    pub fn hits(&self, needles: &[&str]) -> usize {
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|r| r.needles == needles)
            .map_or(0, |r| r.hits)
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, messages: &[Message], model: &ModelConfig) -> Result<ChatResponse> {
        let mut haystack = String::new();
        for message in messages {
            haystack.push_str(&message.content);
            haystack.push('\n');
        }

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            let Some((model_needle, content_needles)) = rule.needles.split_first() else {
                continue;
            };
            if model_needle != &model.model_name {
                continue;
            }
            if content_needles.iter().all(|n| haystack.contains(n.as_str())) {
                rule.hits += 1;
                let response = if rule.responses.len() > 1 {
                    rule.responses.pop_front().unwrap()
                } else {
                    rule.responses
                        .front()
                        .cloned()
                        .expect("rule registered without responses")
                };
                return Ok(ChatResponse {
                    content: response,
                    total_tokens: Some(10),
                });
            }
        }

        Err(Error::Backend {
            attempts: 1,
            message: format!("no scripted response for model {}", model.model_name),
        })
    }
}

/// Config with one distinct model name per role so rules can target a
/// specific worker, judge, or planner.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.models.worker_fast.model_name = "worker-fast".to_string();
    config.models.worker_thorough.model_name = "worker-thorough".to_string();
    config.models.judge_standard.model_name = "judge-standard".to_string();
    config.models.judge_premium.model_name = "judge-premium".to_string();
    config.models.planner_fast.model_name = "planner-fast".to_string();
    config.models.planner_thorough.model_name = "planner-thorough".to_string();
    config
}

/// A judge payload with uniform sub-scores per side.
pub fn judge_json(verdict: &str, confidence: f64, score_a: f64, score_b: f64) -> String {
    let scores = |score: f64| {
        format!(
            r#"{{"correctness": {score}, "completeness": {score}, "edge_cases": {score},
                "security": {score}, "code_quality": {score}, "performance": {score},
                "clarity": {score}, "structure": {score}, "accuracy": {score}, "relevance": {score}}}"#
        )
    };
    format!(
        r#"{{
            "verdict": "{verdict}",
            "confidence": {confidence},
            "worker_a_scores": {},
            "worker_b_scores": {},
            "reasoning": "scripted evaluation",
            "concerns": ["scripted concern"],
            "winner_justification": "scripted",
            "recommendation": "scripted recommendation"
        }}"#,
        scores(score_a),
        scores(score_b),
    )
}

/// A worker output containing one rust code block, valid or not.
pub fn code_output(valid: bool, marker: &str) -> String {
    if valid {
        format!("```rust\nfn {marker}() {{ let x = 1; }}\n```")
    } else {
        format!("```rust\nfn {marker}( {{ let x = 1;\n```")
    }
}

/// A planner payload for a simple two-task chain.
pub fn plan_json(first_id: &str, second_id: &str) -> String {
    format!(
        r#"```json
        {{
            "tasks": [
                {{"id": "{first_id}", "description": "set up the module", "category": "code"}},
                {{"id": "{second_id}", "description": "wire up the api", "category": "code",
                 "dependencies": ["{first_id}"]}}
            ],
            "edges": [["{first_id}", "{second_id}"]]
        }}
        ```"#
    )
}

/// A planning-judge payload.
pub fn plan_verdict_json(verdict: &str, confidence: f64) -> String {
    format!(
        r#"{{
            "verdict": "{verdict}",
            "confidence": {confidence},
            "plan_a_score": 85.0,
            "plan_b_score": 70.0,
            "reasoning": "scripted",
            "recommendation": "scripted planning feedback"
        }}"#
    )
}

fn code_task(id: &str, description: &str) -> TaskSpec {
    TaskSpec::new(id, description).with_category(Category::Code)
}

/// Linear chain T1 -> T2 -> T3, all code category.
pub fn linear_graph() -> TaskGraph {
    let mut graph = TaskGraph::new();
    graph.add_task(code_task("T1", "Task one"));
    graph.add_task(code_task("T2", "Task two").with_dependencies(&["T1"]));
    graph.add_task(code_task("T3", "Task three").with_dependencies(&["T2"]));
    graph.add_edge("T1", "T2");
    graph.add_edge("T2", "T3");
    graph
}

/// Diamond: T1 -> {T2, T3} -> T4.
pub fn diamond_graph() -> TaskGraph {
    let mut graph = TaskGraph::new();
    graph.add_task(code_task("T1", "Task one"));
    graph.add_task(code_task("T2", "Task two").with_dependencies(&["T1"]));
    graph.add_task(code_task("T3", "Task three").with_dependencies(&["T1"]));
    graph.add_task(
        code_task("T4", "Task four").with_dependencies(&["T2", "T3"]),
    );
    graph.add_edge("T1", "T2");
    graph.add_edge("T1", "T3");
    graph.add_edge("T2", "T4");
    graph.add_edge("T3", "T4");
    graph
}

/// Single-task graph with the given criticality.
pub fn single_task_graph(criticality: Criticality) -> TaskGraph {
    let mut graph = TaskGraph::new();
    graph.add_task(code_task("T1", "Task one").with_criticality(criticality));
    graph
}
