//! Repository for the `interview_sessions` table.

use oratia_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::InterviewSession;

/// Column list for `interview_sessions` queries.
const COLUMNS: &str = "id, user_id, status, ended_at, created_at, updated_at";

/// Provides read and close-out operations for diagnostic interviews.
pub struct InterviewSessionRepo;

impl InterviewSessionRepo {
    /// Find an interview session by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<InterviewSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM interview_sessions WHERE id = $1");
        sqlx::query_as::<_, InterviewSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Close out an interview with the given terminal status string and
    /// stamp `ended_at`. Returns `false` when the session does not exist.
    pub async fn close_out(
        pool: &PgPool,
        id: DbId,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE interview_sessions \
             SET status = $2, ended_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
