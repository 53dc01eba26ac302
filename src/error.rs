use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("API key not set in environment variable: {0}")]
    MissingApiKey(String),

    #[error("Backend request failed after {attempts} attempts: {message}")]
    Backend {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cyclic task graph: {0}")]
    CyclicGraph(String),

    #[error("Planning failed after {attempts} attempts: {message}")]
    PlanningFailed {
        /// Total planning attempts made.
        attempts: u32,
        /// Reason for the final failure.
        message: String,
    },

    #[error("Escalation required but no handler configured for task {0}")]
    NoEscalationHandler(String),
}

pub type Result<T> = std::result::Result<T, Error>;
