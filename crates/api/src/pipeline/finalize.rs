//! Terminal-state transition and session projection.

use sqlx::PgPool;

use oratia_core::scoring::PASS_THRESHOLD;
use oratia_core::types::{EvaluationKind, RequestId};
use oratia_db::models::evaluation::{EvaluationOutcome, EvaluationRequest};
use oratia_db::models::session::{SessionProjection, INTERVIEW_CANCELLED, INTERVIEW_COMPLETED};
use oratia_db::models::status::EvaluationStatus;
use oratia_db::repositories::{CoachingSessionRepo, EvaluationRepo, InterviewSessionRepo};

use crate::error::{AppError, AppResult};

/// What a finalize attempt did.
#[derive(Debug)]
pub enum FinalizeResult {
    /// This call moved the record into its terminal state.
    Finalized(EvaluationRequest),
    /// The record was already terminal; the stored row is returned
    /// unchanged.
    AlreadyFinalized(EvaluationRequest),
}

/// Move an evaluation into a terminal state exactly once.
///
/// The conditional UPDATE only fires while the record is `pending` or
/// `processing`; a lost race or a replayed callback yields
/// [`FinalizeResult::AlreadyFinalized`] with the stored row. An unknown
/// `request_id` is a loud failure.
pub async fn finalize_evaluation(
    pool: &PgPool,
    request_id: RequestId,
    outcome: &EvaluationOutcome,
) -> AppResult<FinalizeResult> {
    if let Some(record) = EvaluationRepo::finalize(pool, request_id, outcome).await? {
        tracing::info!(
            request_id = %request_id,
            status = record.status_name(),
            score = record.score,
            "Evaluation finalized"
        );
        return Ok(FinalizeResult::Finalized(record));
    }

    // The UPDATE matched nothing: either the record is already terminal
    // or it never existed.
    match EvaluationRepo::find_by_request_id(pool, request_id).await? {
        Some(record) => {
            tracing::warn!(
                request_id = %request_id,
                current_status = record.status_name(),
                "Duplicate finalize ignored"
            );
            Ok(FinalizeResult::AlreadyFinalized(record))
        }
        None => {
            tracing::error!(request_id = %request_id, "Finalize for unknown evaluation request");
            Err(AppError::RequestNotFound(request_id))
        }
    }
}

/// Write a finalized evaluation's outcome onto its session row.
///
/// Best-effort by design: the evaluation record is the source of truth,
/// so projection failures are logged and swallowed rather than failing
/// the request that delivered the result. Diagnostic evaluations close
/// out an interview session; every other kind writes the denormalized
/// outcome onto a coaching session, whether the evaluation completed or
/// errored.
pub async fn project_onto_session(pool: &PgPool, record: &EvaluationRequest) {
    let Some(session_id) = record.session_id else {
        tracing::debug!(
            request_id = %record.request_id,
            "No session attached, skipping projection"
        );
        return;
    };

    match record.kind() {
        Some(EvaluationKind::Diagnostic) => {
            let status = if record.status() == Some(EvaluationStatus::Error) {
                INTERVIEW_CANCELLED
            } else {
                INTERVIEW_COMPLETED
            };
            match InterviewSessionRepo::close_out(pool, session_id, status).await {
                Ok(true) => {
                    tracing::info!(session_id, status, "Interview session closed out");
                }
                Ok(false) => {
                    tracing::error!(
                        session_id,
                        request_id = %record.request_id,
                        "Interview session missing during projection"
                    );
                }
                Err(e) => {
                    tracing::error!(session_id, error = %e, "Interview projection failed");
                }
            }
        }
        _ => {
            let score = record.score.unwrap_or(0);
            let projection = SessionProjection {
                score,
                passed: score >= PASS_THRESHOLD,
                feedback: record.result.clone(),
            };
            match CoachingSessionRepo::apply_evaluation(pool, session_id, &projection).await {
                Ok(true) => {
                    tracing::info!(
                        session_id,
                        score,
                        passed = projection.passed,
                        "Session updated with evaluation outcome"
                    );
                }
                Ok(false) => {
                    tracing::error!(
                        session_id,
                        request_id = %record.request_id,
                        "Coaching session missing during projection"
                    );
                }
                Err(e) => {
                    tracing::error!(session_id, error = %e, "Session projection failed");
                }
            }
        }
    }
}
