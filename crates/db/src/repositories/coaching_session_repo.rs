//! Repository for the `coaching_sessions` table.
//!
//! Session rows are created by the wider platform. This service reads them
//! for ownership checks and writes the denormalized evaluation outcome.

use oratia_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{CoachingSession, SessionProjection, SESSION_COMPLETED};

/// Column list for `coaching_sessions` queries.
const COLUMNS: &str = "\
    id, user_id, raw_transcript, score, passed, processed_feedback, \
    status, ended_at, created_at, updated_at";

/// Provides read and projection operations for coaching sessions.
pub struct CoachingSessionRepo;

impl CoachingSessionRepo {
    /// Find a coaching session by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CoachingSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM coaching_sessions WHERE id = $1");
        sqlx::query_as::<_, CoachingSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Write a finalized evaluation's denormalized fields onto a session.
    ///
    /// Marks the session completed and stamps `ended_at`. Returns `false`
    /// when the session does not exist.
    pub async fn apply_evaluation(
        pool: &PgPool,
        id: DbId,
        projection: &SessionProjection,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE coaching_sessions \
             SET score = $2, passed = $3, processed_feedback = $4, \
                 status = $5, ended_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(projection.score)
        .bind(projection.passed)
        .bind(projection.feedback.as_ref())
        .bind(SESSION_COMPLETED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
