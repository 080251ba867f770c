//! HTTP client for the chat-completions grading endpoint.
//!
//! Wraps the grading service's OpenAI-compatible API using [`reqwest`].
//! The per-attempt time budget is enforced here with [`tokio::time::timeout`]
//! rather than on the HTTP client, so slow body reads count against the
//! budget too.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::context::{system_context, GradingRequest};
use crate::error::GraderError;
use crate::retry::{grade_with_retry, RetryConfig};
use crate::GradingProvider;

/// Default base URL of the grading service.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default grading model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default per-attempt time budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// Connection settings for the grading service.
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token for the grading service.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Per-attempt time budget.
    pub timeout: Duration,
    /// Backoff policy for transient failures.
    pub retry: RetryConfig,
}

impl GraderConfig {
    /// Config with default endpoint, model, timeout, and retry policy.
    pub fn new(api_key: String) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

/// HTTP client for the grading service.
pub struct OpenAiGrader {
    client: reqwest::Client,
    config: GraderConfig,
}

/// Response shape of the chat-completions endpoint, reduced to the fields
/// the adapter reads.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiGrader {
    /// Create a new grading client.
    pub fn new(config: GraderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a grading client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across services).
    pub fn with_client(client: reqwest::Client, config: GraderConfig) -> Self {
        Self { client, config }
    }

    /// Execute a single grading attempt within the configured time budget.
    ///
    /// Sends the per-kind system context and the normalized transcript,
    /// asks for a JSON object back, and parses the completion content as
    /// the rubric payload.
    pub async fn grade_once(
        &self,
        request: &GradingRequest,
    ) -> Result<serde_json::Value, GraderError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": system_context(request.kind, &request.scenario),
                },
                {
                    "role": "user",
                    "content": request.transcript,
                },
            ],
            "response_format": { "type": "json_object" },
        });

        let attempt = async {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.config.base_url))
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                return Err(GraderError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let completion: ChatCompletion = response.json().await?;
            Self::extract_rubric(&completion)
        };

        match tokio::time::timeout(self.config.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(GraderError::Timeout(self.config.timeout)),
        }
    }

    /// Pull the rubric JSON out of the first completion choice.
    fn extract_rubric(completion: &ChatCompletion) -> Result<serde_json::Value, GraderError> {
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| GraderError::MalformedResponse("no choices in completion".to_string()))?;

        serde_json::from_str(content).map_err(|e| {
            GraderError::MalformedResponse(format!("completion content is not JSON: {e}"))
        })
    }
}

#[async_trait]
impl GradingProvider for OpenAiGrader {
    async fn grade(&self, request: &GradingRequest) -> Result<serde_json::Value, GraderError> {
        grade_with_retry(&self.config.retry, request.kind, || self.grade_once(request)).await
    }
}
