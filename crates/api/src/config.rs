use std::time::Duration;

use oratia_grader::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use oratia_grader::{GraderConfig, RetryConfig};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables. Secrets have no
/// defaults; a missing secret disables the collaborator that needs it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ALLOWED_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Shared secret expected on workflow callback requests. `None`
    /// disables the webhook endpoints.
    pub webhook_shared_secret: Option<String>,
    /// Workflow runner endpoint for async evaluations. `None` disables
    /// workflow-mode submissions.
    pub workflow_webhook_url: Option<String>,
    /// Base URL of the grading service.
    pub grader_base_url: String,
    /// Bearer token for the grading service. `None` disables direct
    /// grading.
    pub grader_api_key: Option<String>,
    /// Model identifier sent with every grading request.
    pub grader_model: String,
    /// Per-attempt grading time budget in seconds (default: `25`).
    pub grader_timeout_secs: u64,
    /// Total grading attempts including the first (default: `3`).
    pub grader_max_attempts: u32,
    /// Submissions allowed per user per rolling minute (default: `5`).
    pub rate_limit_per_minute: u32,
    /// Submissions allowed per user per rolling day (default: `50`).
    pub rate_limit_per_day: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `HOST`                  | `0.0.0.0`                   |
    /// | `PORT`                  | `3000`                      |
    /// | `CORS_ALLOWED_ORIGINS`  | `http://localhost:5173`     |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                        |
    /// | `WEBHOOK_SHARED_SECRET` | unset (webhooks disabled)   |
    /// | `WORKFLOW_WEBHOOK_URL`  | unset (workflow disabled)   |
    /// | `GRADER_BASE_URL`       | `https://api.openai.com/v1` |
    /// | `GRADER_API_KEY`        | unset (direct grading disabled) |
    /// | `GRADER_MODEL`          | `gpt-4o`                    |
    /// | `GRADER_TIMEOUT_SECS`   | `25`                        |
    /// | `GRADER_MAX_ATTEMPTS`   | `3`                         |
    /// | `RATE_LIMIT_PER_MINUTE` | `5`                         |
    /// | `RATE_LIMIT_PER_DAY`    | `50`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let webhook_shared_secret = std::env::var("WEBHOOK_SHARED_SECRET").ok();
        let workflow_webhook_url = std::env::var("WORKFLOW_WEBHOOK_URL").ok();

        let grader_base_url =
            std::env::var("GRADER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let grader_api_key = std::env::var("GRADER_API_KEY").ok();
        let grader_model = std::env::var("GRADER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let grader_timeout_secs: u64 = std::env::var("GRADER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "25".into())
            .parse()
            .expect("GRADER_TIMEOUT_SECS must be a valid u64");

        let grader_max_attempts: u32 = std::env::var("GRADER_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("GRADER_MAX_ATTEMPTS must be a valid u32");

        let rate_limit_per_minute: u32 = std::env::var("RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("RATE_LIMIT_PER_MINUTE must be a valid u32");

        let rate_limit_per_day: u32 = std::env::var("RATE_LIMIT_PER_DAY")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("RATE_LIMIT_PER_DAY must be a valid u32");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            webhook_shared_secret,
            workflow_webhook_url,
            grader_base_url,
            grader_api_key,
            grader_model,
            grader_timeout_secs,
            grader_max_attempts,
            rate_limit_per_minute,
            rate_limit_per_day,
        }
    }

    /// Build the grading client configuration, or `None` when no API key
    /// is set and direct grading is disabled.
    pub fn grader_config(&self) -> Option<GraderConfig> {
        let api_key = self.grader_api_key.clone()?;
        Some(GraderConfig {
            base_url: self.grader_base_url.clone(),
            api_key,
            model: self.grader_model.clone(),
            timeout: Duration::from_secs(self.grader_timeout_secs),
            retry: RetryConfig {
                max_attempts: self.grader_max_attempts,
                ..RetryConfig::default()
            },
        })
    }
}
