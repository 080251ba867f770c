//! Grading adapter errors and their retry classification.

use std::time::Duration;

/// Errors from the grading adapter.
#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A single attempt exceeded its time budget.
    #[error("Grading request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The grading service returned a non-2xx status code.
    #[error("Grading service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not the shape the adapter expects.
    #[error("Malformed grading response: {0}")]
    MalformedResponse(String),
}

impl GraderError {
    /// Whether a retry may succeed.
    ///
    /// Timeouts, connection failures, 5xx, and 429 are transient; auth
    /// failures, other 4xx, and malformed responses are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) => false,
        }
    }

    /// Whether the upstream asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }
}
