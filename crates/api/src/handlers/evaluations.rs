//! Handlers for the `/evaluations` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use oratia_core::scoring::PASS_THRESHOLD;
use oratia_core::types::RequestId;
use oratia_db::models::evaluation::EvaluationOutcome;
use oratia_db::models::status::EvaluationStatus;
use oratia_db::repositories::EvaluationRepo;

use crate::error::{AppError, AppResult};
use crate::pipeline::finalize::{finalize_evaluation, project_onto_session, FinalizeResult};
use crate::pipeline::submit::{submit_evaluation, SubmitEvaluation, SubmitOutcome};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/evaluations
///
/// Submit a transcript for evaluation. Direct mode grades inline and
/// returns the finalized result; workflow mode queues the job on the
/// runner and returns 202 with the request id to poll.
pub async fn submit(
    State(state): State<AppState>,
    Json(input): Json<SubmitEvaluation>,
) -> AppResult<impl IntoResponse> {
    match submit_evaluation(&state, input).await? {
        SubmitOutcome::Graded(record) => {
            let score = record.score.unwrap_or(0);
            let body = json!({
                "ok": true,
                "evaluation": {
                    "request_id": record.request_id,
                    "score": score,
                    "passed": score >= PASS_THRESHOLD,
                    "result": record.result,
                },
            });
            Ok((StatusCode::OK, Json(body)))
        }
        SubmitOutcome::Queued(record) => {
            let body = json!({
                "request_id": record.request_id,
                "status": record.status_name(),
            });
            Ok((StatusCode::ACCEPTED, Json(body)))
        }
    }
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /api/v1/evaluations/{request_id}
///
/// Poll an evaluation's status. The rubric payload is included only once
/// the record is `complete`.
pub async fn poll(
    State(state): State<AppState>,
    Path(request_id): Path<RequestId>,
) -> AppResult<impl IntoResponse> {
    let record = EvaluationRepo::find_by_request_id(&state.pool, request_id)
        .await?
        .ok_or(AppError::RequestNotFound(request_id))?;

    let mut body = json!({
        "ok": true,
        "request_id": record.request_id,
        "session_id": record.session_id,
        "status": record.status_name(),
        "score": record.score,
        "error_message": record.error_message,
    });
    if record.status() == Some(EvaluationStatus::Complete) {
        body["result"] = record.result.clone().unwrap_or(serde_json::Value::Null);
    }

    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// Insufficient-content close-out
// ---------------------------------------------------------------------------

/// Request body for the insufficient-content close-out.
#[derive(Debug, Deserialize)]
pub struct InsufficientContent {
    /// User turns the client counted before giving up.
    pub user_turn_count: usize,
}

/// Feedback stored when a session is too short to evaluate.
const INSUFFICIENT_FEEDBACK: &str = "La interacción fue muy breve y limitada a un saludo \
    inicial. No hay suficiente contenido para evaluar técnicas de ventas ni conocimiento \
    del producto.";

/// POST /api/v1/evaluations/{request_id}/insufficient
///
/// Close out an evaluation with a canned zero-score result when the
/// client found too few user turns to be worth grading. Replays return
/// 409 like any other finalize.
pub async fn mark_insufficient(
    State(state): State<AppState>,
    Path(request_id): Path<RequestId>,
    Json(input): Json<InsufficientContent>,
) -> AppResult<impl IntoResponse> {
    let result = json!({
        "score": 0,
        "feedback": INSUFFICIENT_FEEDBACK,
        "metadata": {
            "user_turn_count": input.user_turn_count,
            "skipped_workflow": true,
            "reason": "insufficient_user_turns",
        },
    });
    let outcome = EvaluationOutcome::Complete { score: 0, result };

    let record = match finalize_evaluation(&state.pool, request_id, &outcome).await? {
        FinalizeResult::Finalized(record) => record,
        FinalizeResult::AlreadyFinalized(record) => {
            return Err(AppError::AlreadyFinalized {
                current_status: record.status_name().to_string(),
            });
        }
    };

    project_onto_session(&state.pool, &record).await;

    Ok(Json(json!({
        "ok": true,
        "evaluation": {
            "request_id": record.request_id,
            "status": record.status_name(),
            "result": record.result,
            "updated_at": record.updated_at,
        },
    })))
}
