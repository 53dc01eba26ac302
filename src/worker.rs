//! Workers: one backend call per task attempt, plus output verification.
//!
//! A worker pairs a model configuration with a strategy. The two workers
//! of a pair always get complementary strategies so every task sees one
//! fast take and one adversarial or thorough take. Verification is a
//! best-effort static check on the output; it advises the judge but
//! never fails a task on its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::Regex;

use crate::backend::{CompletionBackend, Message};
use crate::config::ModelConfig;
use crate::core::{Category, TaskSpec};
use crate::error::Result;
use crate::judge::RetryFeedback;
use crate::prompts;
use crate::tlog_debug;

/// Execution strategy a worker applies to its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStrategy {
    Pragmatic,
    SecurityFirst,
    PerformanceFirst,
    Comprehensive,
}

impl fmt::Display for WorkerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pragmatic => "pragmatic",
            Self::SecurityFirst => "security_first",
            Self::PerformanceFirst => "performance_first",
            Self::Comprehensive => "comprehensive",
        };
        write!(f, "{s}")
    }
}

/// The fixed strategy pairing for a task category.
///
/// Code-like work gets an adversarial second opinion; everything else
/// gets a thorough one. Not configurable.
pub fn strategy_pair_for(category: Category) -> (WorkerStrategy, WorkerStrategy) {
    if category.is_code_like() {
        (WorkerStrategy::Pragmatic, WorkerStrategy::SecurityFirst)
    } else {
        (WorkerStrategy::Pragmatic, WorkerStrategy::Comprehensive)
    }
}

/// Result of the automated verification pass.
///
/// `None` means the check could not be applied, which is distinct from a
/// check that ran and failed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Verification {
    pub syntax_valid: Option<bool>,
    pub tests_passed: Option<bool>,
    pub lint_score: Option<f64>,
}

/// One worker's output for one task attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub worker_id: String,
    pub model_name: String,
    pub strategy: WorkerStrategy,
    pub output: String,
    pub duration_secs: f64,
    pub tokens_used: Option<u32>,
    #[serde(default)]
    pub syntax_valid: Option<bool>,
    #[serde(default)]
    pub tests_passed: Option<bool>,
    #[serde(default)]
    pub lint_score: Option<f64>,
}

impl WorkerResponse {
    /// Fill in the verification fields after the fact.
    pub fn apply_verification(&mut self, verification: Verification) {
        self.syntax_valid = verification.syntax_valid;
        self.tests_passed = verification.tests_passed;
        self.lint_score = verification.lint_score;
    }
}

/// A worker bound to one model and one strategy.
pub struct Worker {
    pub id: String,
    pub model: ModelConfig,
    pub strategy: WorkerStrategy,
    backend: Arc<dyn CompletionBackend>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        model: ModelConfig,
        strategy: WorkerStrategy,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            id: id.into(),
            model,
            strategy,
            backend,
        }
    }

    /// Execute one attempt at a task.
    ///
    /// A retry attempt embeds the judge's feedback in the prompt; a first
    /// attempt uses the strategy prompt. Transport retry is the backend's
    /// concern, so an error here means the call is exhausted.
    pub async fn execute(
        &self,
        task: &TaskSpec,
        retry_feedback: Option<&RetryFeedback>,
    ) -> Result<WorkerResponse> {
        tlog_debug!(
            "Worker {} ({}) executing task {} with strategy {}",
            self.id,
            self.model.model_name,
            task.id,
            self.strategy
        );

        let user_content = match retry_feedback {
            Some(feedback) => prompts::worker_retry_prompt(task, self.strategy, feedback),
            None => prompts::worker_prompt(task, self.strategy),
        };
        let messages = [
            Message::system(prompts::WORKER_SYSTEM),
            Message::user(user_content),
        ];

        let started = Instant::now();
        let response = self.backend.complete(&messages, &self.model).await?;
        let duration_secs = started.elapsed().as_secs_f64();

        tlog_debug!(
            "Worker {} completed task {} in {:.2}s",
            self.id,
            task.id,
            duration_secs
        );

        Ok(WorkerResponse {
            worker_id: self.id.clone(),
            model_name: self.model.model_name.clone(),
            strategy: self.strategy,
            output: response.content,
            duration_secs,
            tokens_used: response.total_tokens,
            syntax_valid: None,
            tests_passed: None,
            lint_score: None,
        })
    }
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([A-Za-z+#]*)[ \t]*\n(.*?)```").unwrap())
}

const BALANCED_CHECK_LANGS: &[&str] = &[
    "rust", "python", "py", "javascript", "js", "typescript", "ts", "java", "c", "cpp", "c++",
    "csharp", "c#", "go", "ruby", "swift", "kotlin",
];

/// Static syntax check on one fenced code body.
///
/// JSON is parsed for real; bracket languages get a balanced-delimiter
/// scan that skips string literals. Unknown languages return `None`.
fn check_block(lang: &str, body: &str) -> Option<bool> {
    let lang = lang.to_ascii_lowercase();
    if lang == "json" {
        return Some(serde_json::from_str::<serde_json::Value>(body).is_ok());
    }
    if BALANCED_CHECK_LANGS.contains(&lang.as_str()) {
        return Some(delimiters_balanced(body));
    }
    None
}

/// Check that (), [], and {} nest correctly outside string literals.
///
/// A coarse filter: it cannot prove code valid, but mismatched brackets
/// reliably indicate a truncated or mangled output.
fn delimiters_balanced(code: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for ch in code.chars() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '(' | '[' | '{' => stack.push(ch),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

/// Best-effort static verification of a worker output.
///
/// Every fenced block with a checkable language must pass for
/// `syntax_valid` to be `Some(true)`. No checkable block at all yields
/// `None`, never `Some(false)`. Test execution and linting are not
/// wired up, so those fields stay `None`.
pub fn verify_output(output: &str, _task: &TaskSpec) -> Verification {
    let mut verdicts = Vec::new();
    for capture in fence_regex().captures_iter(output) {
        let lang = capture.get(1).map_or("", |m| m.as_str());
        let body = capture.get(2).map_or("", |m| m.as_str());
        if let Some(ok) = check_block(lang, body) {
            verdicts.push(ok);
        }
    }

    Verification {
        syntax_valid: if verdicts.is_empty() {
            None
        } else {
            Some(verdicts.iter().all(|v| *v))
        },
        tests_passed: None,
        lint_score: None,
    }
}
