//! Shared-secret extractor for workflow callback endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use oratia_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the shared secret on workflow callbacks.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Proof that a request carried the configured webhook secret.
///
/// Use this as an extractor parameter on any handler the workflow runner
/// calls back into:
///
/// ```ignore
/// async fn my_webhook(_auth: WebhookAuth, ...) -> AppResult<Json<()>> {
///     ...
/// }
/// ```
///
/// Rejection happens before the handler body runs, so no state is
/// touched for unauthenticated callers.
#[derive(Debug, Clone, Copy)]
pub struct WebhookAuth;

impl FromRequestParts<AppState> for WebhookAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .webhook_shared_secret
            .as_deref()
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Webhook ingress is not configured".into(),
                ))
            })?;

        let provided = parts
            .headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing webhook secret header".into(),
                ))
            })?;

        if !secrets_match(provided, expected) {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid webhook secret".into(),
            )));
        }

        Ok(WebhookAuth)
    }
}

/// Compare secrets via their SHA-256 digests. The digest comparison runs
/// over fixed-length values, so timing does not depend on where the
/// secrets differ.
fn secrets_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}
