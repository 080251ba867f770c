//! Bounded exponential-backoff retry for grading attempts.
//!
//! Only transient failures are retried. The attempt budget counts the
//! first try, so `max_attempts = 3` means at most two retries.

use std::future::Future;
use std::time::Duration;

use oratia_core::types::EvaluationKind;

use crate::error::GraderError;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Total attempt budget, first try included.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`RetryConfig::max_delay`].
pub fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Run grading attempts until one succeeds, a permanent failure occurs,
/// or the attempt budget is exhausted.
///
/// Transient failures (timeout, connection failure, 5xx, 429) back off
/// and retry; permanent failures return immediately. Every attempt is
/// logged so grading cost stays reconstructable from the logs.
pub async fn grade_with_retry<F, Fut>(
    config: &RetryConfig,
    kind: EvaluationKind,
    mut attempt_fn: F,
) -> Result<serde_json::Value, GraderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, GraderError>>,
{
    let mut delay = config.base_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match attempt_fn().await {
            Ok(result) => {
                tracing::info!(kind = kind.as_str(), attempt, "Grading succeeded");
                return Ok(result);
            }
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                tracing::warn!(
                    kind = kind.as_str(),
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Grading attempt failed, retrying",
                );
                tokio::time::sleep(delay).await;
                delay = next_delay(delay, config);
            }
            Err(e) => {
                tracing::error!(
                    kind = kind.as_str(),
                    attempt,
                    transient = e.is_transient(),
                    error = %e,
                    "Grading failed",
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }

    fn transient(status: u16) -> GraderError {
        GraderError::Api {
            status,
            body: "upstream unavailable".to_string(),
        }
    }

    // -- Backoff delays --

    #[test]
    fn next_delay_doubles() {
        let config = RetryConfig::default();
        let d = next_delay(Duration::from_secs(1), &config);
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let d = next_delay(Duration::from_secs(8), &config);
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = RetryConfig::default();
        let mut delay = config.base_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    // -- Retry budget --

    #[tokio::test]
    async fn first_success_makes_one_attempt() {
        let attempts = Cell::new(0u32);
        let result = grade_with_retry(&fast_config(), EvaluationKind::Coach, || {
            attempts.set(attempts.get() + 1);
            async { Ok(json!({ "score": 70 })) }
        })
        .await;
        assert_eq!(result.unwrap(), json!({ "score": 70 }));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        let attempts = Cell::new(0u32);
        let result = grade_with_retry(&fast_config(), EvaluationKind::Coach, || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n < 3 {
                    Err(transient(503))
                } else {
                    Ok(json!({ "score": 80 }))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), json!({ "score": 80 }));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn budget_exhausted_returns_last_error() {
        let attempts = Cell::new(0u32);
        let result = grade_with_retry(&fast_config(), EvaluationKind::Roleplay, || {
            attempts.set(attempts.get() + 1);
            async { Err(transient(503)) }
        })
        .await;
        assert!(matches!(result, Err(GraderError::Api { status: 503, .. })));
        assert_eq!(attempts.get(), 3, "budget is three attempts total");
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let attempts = Cell::new(0u32);
        let result = grade_with_retry(&fast_config(), EvaluationKind::Coach, || {
            attempts.set(attempts.get() + 1);
            async {
                Err(GraderError::Api {
                    status: 401,
                    body: "invalid key".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(GraderError::Api { status: 401, .. })));
        assert_eq!(attempts.get(), 1, "permanent failures get no retry");
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let attempts = Cell::new(0u32);
        let result = grade_with_retry(&fast_config(), EvaluationKind::TechWeek, || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n == 1 {
                    Err(transient(429))
                } else {
                    Ok(json!({}))
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.get(), 2);
    }
}
