//! Workflow job delivery with exponential-backoff retry.
//!
//! [`WorkflowDispatcher`] sends a JSON-encoded [`WorkflowJob`] to the
//! workflow runner via HTTP POST. Failed attempts are retried up to three
//! times with exponential backoff (1 s, 2 s, 4 s).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use oratia_core::types::{DbId, EvaluationKind, RequestId};

use crate::JobDispatcher;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single dispatch attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for workflow dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The workflow runner returned a non-2xx status code.
    #[error("Workflow runner returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WorkflowJob
// ---------------------------------------------------------------------------

/// Caller-supplied context forwarded to the runner alongside the
/// transcript.
#[derive(Debug, Clone, Serialize)]
pub struct JobMetadata {
    /// Owner of the session being evaluated.
    pub user_id: DbId,

    /// Number of user turns detected in the transcript.
    pub user_turn_count: usize,

    /// Interlocutor profile for roleplay scenarios.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Scenario name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,

    /// Session objective.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
}

/// The payload posted to the workflow runner for one evaluation.
///
/// Constructed via [`WorkflowJob::new`] and enriched with
/// [`with_scenario`](WorkflowJob::with_scenario).
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowJob {
    /// Public identifier of the evaluation record awaiting this result.
    pub request_id: RequestId,

    /// Session the transcript came from, when one exists.
    pub session_id: Option<DbId>,

    /// Which grading context the runner should apply.
    pub kind: EvaluationKind,

    /// Normalized transcript text.
    pub transcript: String,

    /// Context the runner forwards into its grading step.
    pub metadata: JobMetadata,
}

impl WorkflowJob {
    /// Create a job with empty scenario metadata.
    pub fn new(
        request_id: RequestId,
        session_id: Option<DbId>,
        kind: EvaluationKind,
        transcript: impl Into<String>,
        user_id: DbId,
        user_turn_count: usize,
    ) -> Self {
        Self {
            request_id,
            session_id,
            kind,
            transcript: transcript.into(),
            metadata: JobMetadata {
                user_id,
                user_turn_count,
                profile: None,
                scenario: None,
                objective: None,
            },
        }
    }

    /// Attach scenario metadata to the job.
    pub fn with_scenario(
        mut self,
        profile: Option<String>,
        scenario: Option<String>,
        objective: Option<String>,
    ) -> Self {
        self.metadata.profile = profile;
        self.metadata.scenario = scenario;
        self.metadata.objective = objective;
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowDispatcher
// ---------------------------------------------------------------------------

/// Delivers evaluation jobs to the workflow runner endpoint.
pub struct WorkflowDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WorkflowDispatcher {
    /// Create a dispatcher for the given runner URL with a pre-configured
    /// HTTP client.
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            url: url.into(),
        }
    }

    /// Deliver a job to the workflow runner with retry.
    ///
    /// Retries up to 3 times with exponential backoff before giving up.
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, job: &WorkflowJob) -> Result<(), DispatchError> {
        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(job).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        request_id = %job.request_id,
                        error = %e,
                        "Workflow dispatch attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(job).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    request_id = %job.request_id,
                    url = %self.url,
                    error = %e,
                    "Workflow dispatch failed after all retries"
                );
                Err(e)
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, job: &WorkflowJob) -> Result<(), DispatchError> {
        let response = self.client.post(&self.url).json(job).send().await?;
        if !response.status().is_success() {
            return Err(DispatchError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobDispatcher for WorkflowDispatcher {
    async fn dispatch(&self, job: &WorkflowJob) -> Result<(), DispatchError> {
        self.deliver(job).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> WorkflowJob {
        WorkflowJob::new(
            uuid::Uuid::new_v4(),
            Some(42),
            EvaluationKind::Roleplay,
            "Usuario: hola\nAgente: hola",
            7,
            1,
        )
    }

    #[test]
    fn new_does_not_panic() {
        let _dispatcher = WorkflowDispatcher::new("http://localhost:9999/hook");
    }

    #[test]
    fn dispatch_error_display_http_status() {
        let err = DispatchError::HttpStatus(502);
        assert_eq!(err.to_string(), "Workflow runner returned HTTP 502");
    }

    #[test]
    fn dispatch_error_display_request() {
        // Build a reqwest error from an invalid URL.
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = DispatchError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    // -- Payload shape --

    #[test]
    fn job_serializes_wire_fields() {
        let job = sample_job();
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["kind"], "roleplay");
        assert_eq!(value["session_id"], 42);
        assert_eq!(value["metadata"]["user_id"], 7);
        assert_eq!(value["metadata"]["user_turn_count"], 1);
        assert!(value["request_id"].is_string());
        assert!(value["transcript"].as_str().unwrap().contains("Usuario"));
    }

    #[test]
    fn absent_scenario_fields_are_omitted() {
        let value = serde_json::to_value(sample_job()).unwrap();
        let metadata = value["metadata"].as_object().unwrap();

        assert!(!metadata.contains_key("profile"));
        assert!(!metadata.contains_key("scenario"));
        assert!(!metadata.contains_key("objective"));
    }

    #[test]
    fn scenario_fields_pass_through() {
        let job = sample_job().with_scenario(
            Some("Ventas".to_string()),
            Some("Cliente enojado".to_string()),
            None,
        );
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["metadata"]["profile"], "Ventas");
        assert_eq!(value["metadata"]["scenario"], "Cliente enojado");
        assert!(!value["metadata"]
            .as_object()
            .unwrap()
            .contains_key("objective"));
    }

    #[test]
    fn detached_job_serializes_null_session() {
        let job = WorkflowJob::new(
            uuid::Uuid::new_v4(),
            None,
            EvaluationKind::TechWeek,
            "transcript",
            7,
            9,
        );
        let value = serde_json::to_value(&job).unwrap();

        assert!(value["session_id"].is_null());
        assert_eq!(value["kind"], "tech_week");
    }
}
