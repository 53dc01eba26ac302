//! The judge: compares the two worker outputs for a task and decides.
//!
//! A judge call can fail in two distinct ways. Transport failure
//! propagates as an error. An unparseable or incomplete evaluation does
//! not: it collapses to a safe default that rejects both outputs with
//! zero confidence, because silently accepting an unverifiable verdict
//! would defeat the whole comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{CompletionBackend, Message};
use crate::config::ModelConfig;
use crate::core::{Category, JudgeCriteria, TaskSpec};
use crate::error::Result;
use crate::parse;
use crate::prompts;
use crate::worker::WorkerResponse;
use crate::{tlog, tlog_warn};

/// Judge verdict over a pair of outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeVerdict {
    AcceptA,
    AcceptB,
    RejectBoth,
    Merge,
}

impl fmt::Display for JudgeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AcceptA => "accept_a",
            Self::AcceptB => "accept_b",
            Self::RejectBoth => "reject_both",
            Self::Merge => "merge",
        };
        write!(f, "{s}")
    }
}

impl JudgeVerdict {
    /// Normalize a raw verdict string.
    ///
    /// Case, underscores, and hyphens are ignored; matching is by
    /// substring so "VERDICT: ACCEPT_A" still resolves.
    pub fn parse(raw: &str) -> Option<Self> {
        let squashed: String = raw
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect();
        if squashed.contains("accepta") {
            Some(Self::AcceptA)
        } else if squashed.contains("acceptb") {
            Some(Self::AcceptB)
        } else if squashed.contains("rejectboth") {
            Some(Self::RejectBoth)
        } else if squashed.contains("merge") {
            Some(Self::Merge)
        } else {
            None
        }
    }
}

/// Guidance carried into a retry attempt after a rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryFeedback {
    pub concerns: Vec<String>,
    pub recommendation: String,
}

impl RetryFeedback {
    /// Build retry guidance from a decision's concerns and recommendation.
    pub fn from_decision(decision: &JudgeDecision) -> Self {
        Self {
            concerns: decision.concerns.clone(),
            recommendation: decision
                .recommendation
                .clone()
                .unwrap_or_else(|| "Address the concerns above".to_string()),
        }
    }
}

/// One complete judge evaluation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeDecision {
    pub verdict: JudgeVerdict,
    /// Judge's self-reported confidence in [0, 1].
    pub confidence: f64,
    pub worker_a_scores: JudgeCriteria,
    pub worker_b_scores: JudgeCriteria,
    pub reasoning: String,
    pub concerns: Vec<String>,
    pub winner_justification: String,
    pub recommendation: Option<String>,
    pub merge_strategy: Option<String>,
    pub model_name: String,
    pub duration_secs: f64,
}

impl JudgeDecision {
    fn safe_default(model_name: &str, duration_secs: f64, reason: &str) -> Self {
        Self {
            verdict: JudgeVerdict::RejectBoth,
            confidence: 0.0,
            worker_a_scores: JudgeCriteria::uniform(0.0),
            worker_b_scores: JudgeCriteria::uniform(0.0),
            reasoning: format!("Judge failed to produce a valid evaluation: {reason}"),
            concerns: vec!["Judge response parsing failed".to_string()],
            winner_justification: "Unable to evaluate, rejecting both".to_string(),
            recommendation: Some("Review outputs manually and provide guidance".to_string()),
            merge_strategy: None,
            model_name: model_name.to_string(),
            duration_secs,
        }
    }
}

/// A judge bound to one model configuration.
pub struct Judge {
    pub model: ModelConfig,
    backend: Arc<dyn CompletionBackend>,
}

impl Judge {
    pub fn new(model: ModelConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { model, backend }
    }

    /// Evaluate two worker outputs for one task.
    ///
    /// Parse failures return the safe default rather than an error. The
    /// verification override runs after parsing: a single syntax-invalid
    /// side forces acceptance of the other, and two invalid sides force
    /// rejection, regardless of the model's stated verdict.
    pub async fn evaluate(
        &self,
        task: &TaskSpec,
        response_a: &WorkerResponse,
        response_b: &WorkerResponse,
    ) -> Result<JudgeDecision> {
        tlog!(
            "Judge ({}) evaluating task {}",
            self.model.model_name,
            task.id
        );

        let prompt = prompts::judge_prompt(
            task,
            &response_a.model_name,
            response_a.strategy,
            &response_a.output,
            &response_b.model_name,
            response_b.strategy,
            &response_b.output,
        );
        let messages = [Message::system(prompts::JUDGE_SYSTEM), Message::user(prompt)];

        let started = Instant::now();
        let response = self.backend.complete(&messages, &self.model).await?;
        let duration_secs = started.elapsed().as_secs_f64();

        let payload = match parse::parse_judge_payload(&response.content) {
            Ok(payload) => payload,
            Err(err) => {
                tlog_warn!("Judge response unusable for task {}: {}", task.id, err);
                return Ok(JudgeDecision::safe_default(
                    &self.model.model_name,
                    duration_secs,
                    &err.to_string(),
                ));
            }
        };

        let mut verdict = match JudgeVerdict::parse(&payload.verdict) {
            Some(verdict) => verdict,
            None => {
                tlog_warn!(
                    "Judge returned unknown verdict '{}' for task {}",
                    payload.verdict,
                    task.id
                );
                return Ok(JudgeDecision::safe_default(
                    &self.model.model_name,
                    duration_secs,
                    &format!("unknown verdict: {}", payload.verdict),
                ));
            }
        };

        let mut concerns = payload.concerns;
        let mut recommendation = payload.recommendation;

        match (response_a.syntax_valid, response_b.syntax_valid) {
            (Some(false), Some(false)) => {
                verdict = JudgeVerdict::RejectBoth;
                concerns.push("Both outputs have syntax errors".to_string());
                recommendation = Some("Fix syntax errors and retry".to_string());
            }
            (Some(false), _) => {
                verdict = JudgeVerdict::AcceptB;
                concerns.push("Worker A output has syntax errors".to_string());
            }
            (_, Some(false)) => {
                verdict = JudgeVerdict::AcceptA;
                concerns.push("Worker B output has syntax errors".to_string());
            }
            _ => {}
        }

        let decision = JudgeDecision {
            verdict,
            confidence: payload.confidence,
            worker_a_scores: payload.worker_a_scores,
            worker_b_scores: payload.worker_b_scores,
            reasoning: payload.reasoning,
            concerns,
            winner_justification: payload.winner_justification,
            recommendation,
            merge_strategy: payload.merge_strategy,
            model_name: self.model.model_name.clone(),
            duration_secs,
        };

        tlog!(
            "Judge decision for {}: {} (confidence {:.2}, A={:.1} B={:.1})",
            task.id,
            decision.verdict,
            decision.confidence,
            decision.worker_a_scores.total(task.category),
            decision.worker_b_scores.total(task.category)
        );

        Ok(decision)
    }
}

/// Decide whether a decision needs a human.
///
/// Four rules in fixed order, first hit supplies the reason: rejection,
/// low confidence, a winner under the rejection threshold, and scores
/// too close to call (under 5 points apart).
pub fn should_escalate(
    decision: &JudgeDecision,
    escalate_threshold: f64,
    rejection_threshold: f64,
    category: Category,
) -> (bool, Option<String>) {
    if decision.verdict == JudgeVerdict::RejectBoth {
        return (true, Some("Both outputs rejected by judge".to_string()));
    }

    if decision.confidence < escalate_threshold {
        return (
            true,
            Some(format!(
                "Judge confidence too low: {:.2}",
                decision.confidence
            )),
        );
    }

    let score_a = decision.worker_a_scores.total(category);
    let score_b = decision.worker_b_scores.total(category);

    let winner_score = match decision.verdict {
        JudgeVerdict::AcceptA => Some(score_a),
        JudgeVerdict::AcceptB => Some(score_b),
        _ => None,
    };
    if let Some(score) = winner_score {
        if score < rejection_threshold {
            return (true, Some(format!("Winner score too low: {score:.1}")));
        }
    }

    let diff = (score_a - score_b).abs();
    if diff < 5.0 {
        return (
            true,
            Some(format!(
                "Scores too close to call: {diff:.1} points difference"
            )),
        );
    }

    (false, None)
}
