//! Repository for the `evaluation_requests` table.
//!
//! All terminal transitions go through [`EvaluationRepo::finalize`], whose
//! conditional update carries the `{pending, processing}` allow-list in the
//! SQL itself. Concurrent finalizers of the same request therefore converge
//! on a single terminal write; the losers observe `None`.

use oratia_core::types::RequestId;
use sqlx::PgPool;

use crate::models::evaluation::{CreateEvaluation, EvaluationOutcome, EvaluationRequest};
use crate::models::status::{EvaluationStatus, StatusId};

/// Column list for `evaluation_requests` queries.
const COLUMNS: &str = "\
    id, request_id, user_id, session_id, kind, status_id, \
    score, result, error_message, \
    created_at, updated_at, completed_at";

/// Statuses that still accept a terminal transition.
const ACTIVE_STATUSES: [StatusId; 2] = [
    EvaluationStatus::Pending as StatusId,
    EvaluationStatus::Processing as StatusId,
];

/// Provides persistence operations for evaluation requests.
pub struct EvaluationRepo;

impl EvaluationRepo {
    /// Insert a new pending evaluation request.
    ///
    /// `request_id` is unique; inserting a duplicate surfaces the
    /// constraint violation to the caller.
    pub async fn create(
        pool: &PgPool,
        input: &CreateEvaluation,
    ) -> Result<EvaluationRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO evaluation_requests \
                 (request_id, user_id, session_id, kind, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EvaluationRequest>(&query)
            .bind(input.request_id)
            .bind(input.user_id)
            .bind(input.session_id)
            .bind(input.kind.as_str())
            .bind(EvaluationStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Find an evaluation request by its idempotency key.
    pub async fn find_by_request_id(
        pool: &PgPool,
        request_id: RequestId,
    ) -> Result<Option<EvaluationRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM evaluation_requests WHERE request_id = $1");
        sqlx::query_as::<_, EvaluationRequest>(&query)
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    /// Move a pending request to `processing`.
    ///
    /// Returns `None` when the request is missing or no longer pending.
    pub async fn mark_processing(
        pool: &PgPool,
        request_id: RequestId,
    ) -> Result<Option<EvaluationRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE evaluation_requests \
             SET status_id = $2, updated_at = NOW() \
             WHERE request_id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EvaluationRequest>(&query)
            .bind(request_id)
            .bind(EvaluationStatus::Processing.id())
            .bind(EvaluationStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Apply a terminal outcome if the request is still in an active status.
    ///
    /// `completed_at` is written only when the outcome is `complete`.
    /// Returns the updated row, or `None` when no row matched the guard:
    /// the request either does not exist or is already terminal. Callers
    /// disambiguate with [`Self::find_by_request_id`].
    pub async fn finalize(
        pool: &PgPool,
        request_id: RequestId,
        outcome: &EvaluationOutcome,
    ) -> Result<Option<EvaluationRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE evaluation_requests \
             SET status_id = $2, score = $3, result = $4, error_message = $5, \
                 updated_at = NOW(), \
                 completed_at = CASE WHEN $2 = $6 THEN NOW() ELSE completed_at END \
             WHERE request_id = $1 AND status_id IN ($7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EvaluationRequest>(&query)
            .bind(request_id)
            .bind(outcome.status().id())
            .bind(outcome.score())
            .bind(outcome.result())
            .bind(outcome.error_message())
            .bind(EvaluationStatus::Complete.id())
            .bind(ACTIVE_STATUSES[0])
            .bind(ACTIVE_STATUSES[1])
            .fetch_optional(pool)
            .await
    }
}
