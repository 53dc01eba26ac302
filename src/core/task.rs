//! Task data model for the execution graph.
//!
//! Tasks are the atomic units of work dispatched to workers. Each task
//! carries its input/output specification, dependency list, criticality
//! tier, and retry bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default retry cap for a task (initial attempt plus retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default estimated output size in lines.
pub const DEFAULT_ESTIMATED_LINES: u32 = 50;

/// Task criticality tier.
///
/// Criticality determines worker/judge routing: `Simple` tasks take the
/// single-worker path with no judge, everything else takes the dual-worker
/// path, and `Critical` tasks get the premium judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Single worker, no judge.
    Simple,
    /// Dual worker, standard judge.
    #[default]
    Standard,
    /// Dual worker, standard judge.
    Important,
    /// Dual worker, premium judge.
    Critical,
}

impl Criticality {
    /// Parse a criticality string, falling back to `Standard` for
    /// anything unrecognized (planner payloads are not trusted).
    pub fn parse_or_standard(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "simple" => Criticality::Simple,
            "standard" => Criticality::Standard,
            "important" => Criticality::Important,
            "critical" => Criticality::Critical,
            _ => Criticality::Standard,
        }
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criticality::Simple => write!(f, "simple"),
            Criticality::Standard => write!(f, "standard"),
            Criticality::Important => write!(f, "important"),
            Criticality::Critical => write!(f, "critical"),
        }
    }
}

/// Task category.
///
/// Categories select the judge's weighted scoring profile and the
/// strategy pairing for the two workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Code,
    Writing,
    Analysis,
    Planning,
    Translation,
    Review,
    Qa,
    Creative,
    #[default]
    General,
}

impl Category {
    /// Parse a category string, falling back to `General`.
    pub fn parse_or_general(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "code" => Category::Code,
            "writing" => Category::Writing,
            "analysis" => Category::Analysis,
            "planning" => Category::Planning,
            "translation" => Category::Translation,
            "review" => Category::Review,
            "qa" => Category::Qa,
            "creative" => Category::Creative,
            "general" => Category::General,
            _ => Category::General,
        }
    }

    /// Whether outputs in this category are expected to contain code.
    ///
    /// Adversarial (security-first) review only pays off for code-like
    /// outputs; other categories pair a thorough strategy instead.
    pub fn is_code_like(&self) -> bool {
        matches!(self, Category::Code | Category::Review | Category::Qa)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Code => write!(f, "code"),
            Category::Writing => write!(f, "writing"),
            Category::Analysis => write!(f, "analysis"),
            Category::Planning => write!(f, "planning"),
            Category::Translation => write!(f, "translation"),
            Category::Review => write!(f, "review"),
            Category::Qa => write!(f, "qa"),
            Category::Creative => write!(f, "creative"),
            Category::General => write!(f, "general"),
        }
    }
}

/// Task status in its lifecycle.
///
/// `pending → in_progress → {completed | failed | rejected | escalated}`.
/// A `Rejected` task may transition back to `InProgress` on retry, bounded
/// by the task's max-attempts cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created but not yet started.
    #[default]
    Pending,
    /// Task is being executed by workers.
    InProgress,
    /// Task completed with an accepted output.
    Completed,
    /// Task failed (worker/backend failure, not a judge rejection).
    Failed,
    /// Both outputs rejected by the judge; retryable.
    Rejected,
    /// Task deferred to a human collaborator.
    Escalated,
}

impl TaskStatus {
    /// Check if the status is terminal (no further automatic transitions).
    ///
    /// `Rejected` is not terminal: it may re-enter `InProgress` on retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Escalated
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Rejected => write!(f, "rejected"),
            TaskStatus::Escalated => write!(f, "escalated"),
        }
    }
}

/// An atomic task in the execution graph.
///
/// A task is atomic when it has one clear input, one measurable output,
/// and can be verified without hidden context. Ids are unique within the
/// owning graph and dependencies reference only ids in the same graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique task identifier within a graph (e.g. "T1").
    pub id: String,
    /// Clear, actionable task description.
    pub description: String,
    /// Input specification: what the task needs.
    #[serde(default)]
    pub input: String,
    /// Output specification: what the task produces.
    #[serde(default)]
    pub output: String,
    /// Constraints and requirements.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Ids of tasks that must complete first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Importance tier controlling worker/judge routing.
    #[serde(default)]
    pub criticality: Criticality,
    /// Category selecting scoring weights and strategy pairing.
    #[serde(default)]
    pub category: Category,
    /// Estimated output size in lines.
    #[serde(default = "default_estimated_lines")]
    pub estimated_lines: u32,
    /// Number of execution attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Maximum attempts before giving up on retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// When the task was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_estimated_lines() -> u32 {
    DEFAULT_ESTIMATED_LINES
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl TaskSpec {
    /// Create a new task with the given id and description.
    ///
    /// All other fields take their defaults: standard criticality,
    /// general category, no dependencies.
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            input: String::new(),
            output: String::new(),
            constraints: Vec::new(),
            dependencies: Vec::new(),
            criticality: Criticality::Standard,
            category: Category::General,
            estimated_lines: DEFAULT_ESTIMATED_LINES,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at: Utc::now(),
        }
    }

    /// Set the criticality tier.
    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the dependency list.
    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Set the input and output specifications.
    pub fn with_io(mut self, input: &str, output: &str) -> Self {
        self.input = input.to_string();
        self.output = output.to_string();
        self
    }

    /// Check if another retry attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
