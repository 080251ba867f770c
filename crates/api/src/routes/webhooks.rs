//! Route definitions for the workflow callback endpoints.
//!
//! All endpoints require the shared webhook secret.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /evaluation-complete             -> evaluation_complete
/// POST   /interview-analysis-complete     -> interview_analysis_complete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/evaluation-complete",
            post(webhooks::evaluation_complete),
        )
        .route(
            "/interview-analysis-complete",
            post(webhooks::interview_analysis_complete),
        )
}
