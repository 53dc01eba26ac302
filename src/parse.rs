//! Structured payload extraction from free-text model responses.
//!
//! Judges and planners are asked for a single JSON object, but responses
//! routinely arrive wrapped in fenced code blocks or surrounded by prose.
//! Each payload shape gets one small parsing function here, so the
//! tolerance rules live in one place and every caller gets the same
//! documented fallback behavior.

use serde_json::Value;

use crate::core::{Category, Criticality, JudgeCriteria, TaskGraph, TaskSpec};
use crate::error::{Error, Result};

/// Fields a judge evaluation must carry, pre-normalization.
///
/// The verdict is kept as the raw string; the caller owns mapping it onto
/// a verdict enum (and the safe default when mapping fails).
#[derive(Debug, Clone)]
pub struct JudgePayload {
    pub verdict: String,
    pub confidence: f64,
    pub worker_a_scores: JudgeCriteria,
    pub worker_b_scores: JudgeCriteria,
    pub reasoning: String,
    pub concerns: Vec<String>,
    pub winner_justification: String,
    pub recommendation: Option<String>,
    pub merge_strategy: Option<String>,
}

/// Fields a planning-judge evaluation must carry.
#[derive(Debug, Clone)]
pub struct PlanVerdictPayload {
    pub verdict: String,
    pub confidence: f64,
    pub plan_a_score: f64,
    pub plan_b_score: f64,
    pub reasoning: String,
    pub recommendation: Option<String>,
    /// Task ids to keep from each plan when the verdict is a merge.
    pub take_from_a: Vec<String>,
    pub take_from_b: Vec<String>,
}

/// Isolate the JSON body of a response.
///
/// Prefers a ```json fence, then any ``` fence, then assumes the whole
/// response is JSON. Mirrors how models actually format their output; no
/// attempt is made to recover from multiple fenced blocks.
pub fn extract_json(content: &str) -> &str {
    if let Some(start) = content.find("```json") {
        let body = &content[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    } else if let Some(start) = content.find("```") {
        let body = &content[start + 3..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    content.trim()
}

fn parse_value(content: &str) -> Result<Value> {
    serde_json::from_str(extract_json(content))
        .map_err(|e| Error::Parse(format!("response is not valid JSON: {e}")))
}

fn require_str(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Parse(format!("missing required field: {field}")))
}

fn require_f64(value: &Value, field: &str) -> Result<f64> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Parse(format!("missing required field: {field}")))
}

fn optional_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Read a sub-score, accepting the alternate names different rubric
/// prompts use for the same quality dimension.
fn score_field(scores: &Value, names: &[&str], default: f64) -> f64 {
    for name in names {
        if let Some(v) = scores.get(*name).and_then(Value::as_f64) {
            return v;
        }
    }
    default
}

/// Build criteria from a raw scores object.
///
/// Any dimension the judge omitted defaults to 80.0 so a partially-filled
/// rubric still yields a usable weighted total.
fn normalize_scores(scores: &Value) -> JudgeCriteria {
    const DEFAULT: f64 = 80.0;
    JudgeCriteria {
        correctness: score_field(scores, &["correctness", "feasibility"], DEFAULT),
        completeness: score_field(scores, &["completeness"], DEFAULT),
        edge_cases: score_field(scores, &["edge_cases", "rigor"], DEFAULT),
        security: score_field(scores, &["security", "risk_management"], DEFAULT),
        code_quality: score_field(scores, &["code_quality"], DEFAULT),
        performance: score_field(scores, &["performance"], DEFAULT),
        clarity: score_field(scores, &["clarity"], DEFAULT),
        structure: score_field(scores, &["structure"], DEFAULT),
        accuracy: score_field(scores, &["accuracy", "strategic_soundness"], DEFAULT),
        relevance: score_field(scores, &["relevance", "actionability", "engagement"], DEFAULT),
    }
}

/// Parse a judge evaluation response.
///
/// Required: `verdict`, `confidence`, and both score objects. Everything
/// else is optional with empty defaults. The caller is expected to fall
/// back to a reject-both decision when this returns an error.
pub fn parse_judge_payload(content: &str) -> Result<JudgePayload> {
    let value = parse_value(content)?;

    let scores_a = value
        .get("worker_a_scores")
        .ok_or_else(|| Error::Parse("missing required field: worker_a_scores".to_string()))?;
    let scores_b = value
        .get("worker_b_scores")
        .ok_or_else(|| Error::Parse("missing required field: worker_b_scores".to_string()))?;

    Ok(JudgePayload {
        verdict: require_str(&value, "verdict")?,
        confidence: require_f64(&value, "confidence")?,
        worker_a_scores: normalize_scores(scores_a),
        worker_b_scores: normalize_scores(scores_b),
        reasoning: optional_str(&value, "reasoning").unwrap_or_default(),
        concerns: string_list(&value, "concerns"),
        winner_justification: optional_str(&value, "winner_justification").unwrap_or_default(),
        recommendation: optional_str(&value, "recommendation"),
        merge_strategy: optional_str(&value, "merge_strategy"),
    })
}

/// Parse a planner response into a task graph.
///
/// Unknown criticality or category strings fall back to their defaults
/// rather than failing the plan. Task-level `dependencies` and the
/// top-level `edges` list are both honored.
pub fn parse_plan_payload(content: &str) -> Result<TaskGraph> {
    let value = parse_value(content)?;

    let raw_tasks = value
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Parse("plan has no tasks array".to_string()))?;

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for raw in raw_tasks {
        let id = require_str(raw, "id")?;
        let description = require_str(raw, "description")?;
        let mut task = TaskSpec::new(&id, &description);
        task.input = optional_str(raw, "input").unwrap_or_default();
        task.output = optional_str(raw, "output").unwrap_or_default();
        task.constraints = string_list(raw, "constraints");
        task.dependencies = string_list(raw, "dependencies");
        if let Some(c) = optional_str(raw, "criticality") {
            task.criticality = Criticality::parse_or_standard(&c);
        }
        if let Some(c) = optional_str(raw, "category") {
            task.category = Category::parse_or_general(&c);
        }
        if let Some(lines) = raw.get("estimated_lines").and_then(Value::as_u64) {
            task.estimated_lines = lines as u32;
        }
        tasks.push(task);
    }

    let mut edges = Vec::new();
    if let Some(raw_edges) = value.get("edges").and_then(Value::as_array) {
        for edge in raw_edges {
            let pair = edge
                .as_array()
                .filter(|p| p.len() == 2)
                .and_then(|p| Some((p[0].as_str()?, p[1].as_str()?)))
                .ok_or_else(|| Error::Parse("plan edge is not a [from, to] pair".to_string()))?;
            edges.push((pair.0.to_string(), pair.1.to_string()));
        }
    }

    Ok(TaskGraph::from_parts(tasks, edges))
}

/// Parse a planning-judge evaluation response.
pub fn parse_plan_verdict_payload(content: &str) -> Result<PlanVerdictPayload> {
    let value = parse_value(content)?;

    let (take_from_a, take_from_b) = match value.get("merge_strategy") {
        Some(merge) => (
            string_list(merge, "take_from_a"),
            string_list(merge, "take_from_b"),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(PlanVerdictPayload {
        verdict: require_str(&value, "verdict")?,
        confidence: require_f64(&value, "confidence")?,
        plan_a_score: require_f64(&value, "plan_a_score")?,
        plan_b_score: require_f64(&value, "plan_b_score")?,
        reasoning: optional_str(&value, "reasoning").unwrap_or_default(),
        recommendation: optional_str(&value, "recommendation"),
        take_from_a,
        take_from_b,
    })
}
