//! Route definitions for the `/evaluations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::evaluations;
use crate::state::AppState;

/// Routes mounted at `/evaluations`.
///
/// ```text
/// POST   /                              -> submit
/// GET    /{request_id}                  -> poll
/// POST   /{request_id}/insufficient     -> mark_insufficient
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(evaluations::submit))
        .route("/{request_id}", get(evaluations::poll))
        .route(
            "/{request_id}/insufficient",
            post(evaluations::mark_insufficient),
        )
}
