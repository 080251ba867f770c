//! LLM grading adapter for the evaluation pipeline.
//!
//! This crate wraps the external chat-completions grading call:
//!
//! - [`GradingRequest`] -- one grading call: normalized transcript plus the
//!   evaluation kind and scenario metadata selecting the system context.
//! - [`OpenAiGrader`] -- the production HTTP client, enforcing a per-attempt
//!   time budget inside the adapter rather than at the HTTP layer.
//! - [`retry`] -- bounded exponential backoff applied to transient failures
//!   only; permanent failures propagate immediately.
//! - [`GraderError`] -- transient/permanent error classification.

pub mod client;
pub mod context;
pub mod error;
pub mod retry;

pub use client::{GraderConfig, OpenAiGrader};
pub use context::{GradingRequest, ScenarioContext};
pub use error::GraderError;
pub use retry::RetryConfig;

use async_trait::async_trait;

/// Boundary for the grading collaborator.
///
/// The production implementation is [`OpenAiGrader`]; tests drive the
/// pipeline with a scripted provider instead of network access.
#[async_trait]
pub trait GradingProvider: Send + Sync {
    /// Grade a normalized transcript, returning the raw rubric payload.
    async fn grade(&self, request: &GradingRequest)
        -> Result<serde_json::Value, GraderError>;
}
