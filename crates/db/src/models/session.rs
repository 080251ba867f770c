//! Session entity models.
//!
//! Session rows are created by the wider platform; only the columns this
//! service reads for ownership checks or writes during projection are
//! modeled here.

use oratia_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Status written onto a coaching session once its evaluation lands.
pub const SESSION_COMPLETED: &str = "completed";

/// Interview status when analysis succeeded.
pub const INTERVIEW_COMPLETED: &str = "completed";

/// Interview status when analysis failed.
pub const INTERVIEW_CANCELLED: &str = "cancelled";

/// A row from the `coaching_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoachingSession {
    pub id: DbId,
    pub user_id: DbId,
    pub raw_transcript: Option<String>,
    pub score: Option<i32>,
    pub passed: Option<bool>,
    pub processed_feedback: Option<serde_json::Value>,
    pub status: String,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `interview_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InterviewSession {
    pub id: DbId,
    pub user_id: DbId,
    pub status: String,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Denormalized evaluation outcome written onto a coaching session.
#[derive(Debug, Clone)]
pub struct SessionProjection {
    pub score: i32,
    pub passed: bool,
    pub feedback: Option<serde_json::Value>,
}
