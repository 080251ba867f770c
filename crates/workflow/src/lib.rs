//! Outbound dispatch to the external workflow runner.
//!
//! When an evaluation is graded asynchronously, the submission handler
//! hands the transcript off to a workflow runner over HTTP and the runner
//! reports back through the completion webhooks. This crate owns that
//! outbound leg:
//!
//! - [`WorkflowJob`] -- the JSON payload posted to the runner.
//! - [`WorkflowDispatcher`] -- HTTP delivery with exponential-backoff
//!   retry.
//! - [`JobDispatcher`] -- the seam the submission pipeline calls through,
//!   so tests can swap in a recording dispatcher.

pub mod dispatch;

pub use dispatch::{DispatchError, JobMetadata, WorkflowDispatcher, WorkflowJob};

use async_trait::async_trait;

/// Boundary for the workflow-runner collaborator.
///
/// The production implementation is [`WorkflowDispatcher`]; tests drive the
/// pipeline with a recording dispatcher instead of network access.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Deliver one evaluation job to the runner.
    async fn dispatch(&self, job: &WorkflowJob) -> Result<(), DispatchError>;
}
