//! Engine configuration loaded from `~/.tandem/tandem.toml`.
//!
//! Defines the backend endpoints, the per-role model table (two workers,
//! two judges, two planners), and the decision thresholds used by the
//! orchestrators. Missing file means defaults; the API key itself always
//! comes from the environment, never from disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::Criticality;
use crate::{tlog_debug, Error, Result};

/// Per-model request parameters for one role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Backend model identifier (e.g. "gpt-4o-mini").
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ModelConfig {
    fn new(model_name: &str, temperature: f64, max_tokens: u32, timeout_secs: u64) -> Self {
        Self {
            model_name: model_name.to_string(),
            temperature,
            max_tokens,
            timeout_secs,
        }
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Model assignments for every role in the engine.
///
/// Reasoning-heavy roles (thorough worker, premium judge, thorough
/// planner) get longer timeout budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelTable {
    /// Fast worker (pragmatic strategy).
    pub worker_fast: ModelConfig,
    /// Thorough worker (adversarial/comprehensive strategy).
    pub worker_thorough: ModelConfig,
    /// Judge for simple/standard/important tasks.
    pub judge_standard: ModelConfig,
    /// Judge for critical tasks and plan evaluation.
    pub judge_premium: ModelConfig,
    /// Pragmatic planner.
    pub planner_fast: ModelConfig,
    /// Comprehensive planner.
    pub planner_thorough: ModelConfig,
}

impl Default for ModelTable {
    fn default() -> Self {
        Self {
            worker_fast: ModelConfig::new("gpt-4o-mini", 0.7, 4096, 60),
            worker_thorough: ModelConfig::new("gpt-4o", 0.7, 4096, 90),
            judge_standard: ModelConfig::new("gpt-4o", 0.3, 4096, 60),
            judge_premium: ModelConfig::new("gpt-4o", 0.3, 4096, 90),
            planner_fast: ModelConfig::new("gpt-4o-mini", 0.5, 8192, 90),
            planner_thorough: ModelConfig::new("gpt-4o", 0.5, 8192, 120),
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSettings {
    /// Candidate chat-completion endpoints, tried in listed order.
    pub endpoints: Vec<String>,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Transport retries per endpoint per call.
    pub max_retries: u32,
    /// Initial delay between transport retries; doubles after each failure.
    pub retry_delay_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://models.inference.ai.azure.com/chat/completions".to_string(),
            ],
            api_key_env: "TANDEM_API_KEY".to_string(),
            max_retries: 2,
            retry_delay_secs: 5,
        }
    }
}

impl BackendSettings {
    /// Read the API key from the configured environment variable.
    ///
    /// An unset or empty key is an irrecoverable configuration error.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::MissingApiKey(self.api_key_env.clone())),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub models: ModelTable,
    /// Escalate when judge confidence falls below this value.
    #[serde(default = "default_escalate_threshold")]
    pub auto_escalate_threshold: f64,
    /// Escalate when the winning score falls below this value.
    #[serde(default = "default_rejection_threshold")]
    pub rejection_threshold: f64,
    /// Planning retries beyond the first attempt.
    #[serde(default = "default_max_planning_retries")]
    pub max_planning_retries: u32,
    /// Run the two workers of a pair concurrently.
    #[serde(default = "default_true")]
    pub enable_parallel_workers: bool,
    /// Re-run rejected tasks with judge feedback.
    #[serde(default = "default_true")]
    pub enable_auto_retry: bool,
    /// Reserved: workers critique each other before judging. Not wired up.
    #[serde(default)]
    pub enable_debate_mode: bool,
    /// Override for the storage root (defaults to ~/.tandem/state).
    pub storage_dir: Option<String>,
}

fn default_escalate_threshold() -> f64 {
    0.6
}

fn default_rejection_threshold() -> f64 {
    85.0
}

fn default_max_planning_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            models: ModelTable::default(),
            auto_escalate_threshold: default_escalate_threshold(),
            rejection_threshold: default_rejection_threshold(),
            max_planning_retries: default_max_planning_retries(),
            enable_parallel_workers: true,
            enable_auto_retry: true,
            enable_debate_mode: false,
            storage_dir: None,
        }
    }
}

impl Config {
    pub fn tandem_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".tandem"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::tandem_dir()?.join("tandem.toml"))
    }

    /// Resolve the storage root for plans and execution results.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::tandem_dir()?.join("state")),
        }
    }

    /// Select the judge model for a task's criticality tier.
    pub fn judge_model(&self, criticality: Criticality) -> &ModelConfig {
        if criticality == Criticality::Critical {
            &self.models.judge_premium
        } else {
            &self.models.judge_standard
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        tlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::tandem_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        tlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let dir = Self::tandem_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let storage = self.storage_dir()?;
        if !storage.exists() {
            fs::create_dir_all(&storage)?;
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
