pub mod evaluations;
pub mod health;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /evaluations                                  submit (POST)
/// /evaluations/{request_id}                     status poll (GET)
/// /evaluations/{request_id}/insufficient        close out a too-short session (POST)
///
/// /webhooks/evaluation-complete                 workflow runner callback (POST)
/// /webhooks/interview-analysis-complete         workflow runner callback (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Evaluation submission, polling, and close-out.
        .nest("/evaluations", evaluations::router())
        // Workflow runner callbacks (shared-secret protected).
        .nest("/webhooks", webhooks::router())
}
