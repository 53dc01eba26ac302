//! Chat-completion backend client.
//!
//! The engine treats text generation as an opaque request/response service:
//! role-tagged messages in, one completion string out. `HttpBackend` speaks
//! the OpenAI-style chat API over HTTP with per-call timeout, bounded retry
//! with exponential backoff, and fallback across candidate endpoints in
//! listed order. Orchestrators only see the `CompletionBackend` trait, so
//! tests swap in scripted backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{BackendSettings, ModelConfig};
use crate::error::{Error, Result};
use crate::{tlog_debug, tlog_warn};

/// Message role in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completed backend response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The completion text.
    pub content: String,
    /// Total token usage, when the backend reports it.
    pub total_tokens: Option<u32>,
}

/// The seam between the engine and the text-generation service.
///
/// One logical operation: complete a message list under a model
/// configuration. Implementations own their transport-level retry policy;
/// callers treat any returned error as exhaustion of that policy.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[Message], model: &ModelConfig) -> Result<ChatResponse>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct RawChatResponse {
    choices: Vec<RawChoice>,
    usage: Option<RawUsage>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize)]
struct RawMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct RawUsage {
    total_tokens: Option<u32>,
}

/// HTTP chat-completion client.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoints: Vec<String>,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpBackend {
    /// Build a client from backend settings.
    ///
    /// # Errors
    ///
    /// Fails with `Error::MissingApiKey` if the configured environment
    /// variable is unset: this is the one configuration error that should
    /// stop the whole operation up front.
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let api_key = settings.api_key()?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoints: settings.endpoints.clone(),
            api_key,
            max_retries: settings.max_retries,
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
        })
    }

    async fn complete_once(
        &self,
        endpoint: &str,
        messages: &[Message],
        model: &ModelConfig,
    ) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: &model.model_name,
            messages,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
        };

        let response = tokio::time::timeout(
            model.timeout(),
            self.client
                .post(endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| Error::Timeout(model.timeout()))??;

        let response = response.error_for_status()?;
        let raw: RawChatResponse = response.json().await?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Parse("backend response has no completion text".to_string()))?;

        Ok(ChatResponse {
            content,
            total_tokens: raw.usage.and_then(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    /// Complete with bounded retry per endpoint, then endpoint fallback.
    ///
    /// Each endpoint gets `max_retries + 1` attempts with a delay that
    /// doubles after every failure. Timeouts count as transient failures.
    /// Only when every attempt on every endpoint has failed does the call
    /// surface `Error::Backend`.
    async fn complete(&self, messages: &[Message], model: &ModelConfig) -> Result<ChatResponse> {
        let mut attempts = 0u32;
        let mut last_error = String::new();

        for endpoint in &self.endpoints {
            let mut delay = self.retry_delay;
            for attempt in 0..=self.max_retries {
                attempts += 1;
                match self.complete_once(endpoint, messages, model).await {
                    Ok(response) => {
                        tlog_debug!(
                            "Backend {} completed via {} (tokens: {:?})",
                            model.model_name,
                            endpoint,
                            response.total_tokens
                        );
                        return Ok(response);
                    }
                    Err(err) => {
                        last_error = err.to_string();
                        if attempt < self.max_retries {
                            tlog_warn!(
                                "Attempt {}/{} failed for {} at {}, retrying in {:?}: {}",
                                attempt + 1,
                                self.max_retries + 1,
                                model.model_name,
                                endpoint,
                                delay,
                                last_error
                            );
                            tokio::time::sleep(delay).await;
                            delay *= 2;
                        }
                    }
                }
            }
            tlog_warn!(
                "Endpoint {} exhausted for {}, trying next candidate",
                endpoint,
                model.model_name
            );
        }

        Err(Error::Backend {
            attempts,
            message: last_error,
        })
    }
}
