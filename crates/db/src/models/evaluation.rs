//! Evaluation request entity models and DTOs.

use oratia_core::types::{DbId, EvaluationKind, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{EvaluationStatus, StatusId};

/// A row from the `evaluation_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EvaluationRequest {
    pub id: DbId,
    pub request_id: RequestId,
    pub user_id: DbId,
    pub session_id: Option<DbId>,
    pub kind: String,
    pub status_id: StatusId,
    pub score: Option<i32>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl EvaluationRequest {
    /// Decoded lifecycle status. `None` only for status ids the enum does
    /// not know, which the seeded lookup table rules out.
    pub fn status(&self) -> Option<EvaluationStatus> {
        EvaluationStatus::from_id(self.status_id)
    }

    /// Status name for API responses.
    pub fn status_name(&self) -> &'static str {
        self.status().map(EvaluationStatus::name).unwrap_or("unknown")
    }

    /// Decoded evaluation kind. `None` for kind strings written by a
    /// newer deployment.
    pub fn kind(&self) -> Option<EvaluationKind> {
        EvaluationKind::parse(&self.kind)
    }

    /// Whether the record has reached `complete` or `error`.
    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(EvaluationStatus::is_terminal)
    }
}

/// DTO for inserting a new evaluation request.
#[derive(Debug, Deserialize)]
pub struct CreateEvaluation {
    pub request_id: RequestId,
    pub user_id: DbId,
    pub session_id: Option<DbId>,
    pub kind: EvaluationKind,
}

/// Terminal outcome applied through the single finalize operation.
///
/// A failed run may still carry a score and a partial result payload, so
/// both arms bind the same columns.
#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    /// Grading finished; the record becomes `complete`.
    Complete {
        score: i32,
        result: serde_json::Value,
    },
    /// Grading failed; the record becomes `error`.
    Error {
        message: String,
        score: Option<i32>,
        result: Option<serde_json::Value>,
    },
}

impl EvaluationOutcome {
    /// Terminal status this outcome maps to.
    pub fn status(&self) -> EvaluationStatus {
        match self {
            Self::Complete { .. } => EvaluationStatus::Complete,
            Self::Error { .. } => EvaluationStatus::Error,
        }
    }

    /// Score column value.
    pub fn score(&self) -> Option<i32> {
        match self {
            Self::Complete { score, .. } => Some(*score),
            Self::Error { score, .. } => *score,
        }
    }

    /// Result column value.
    pub fn result(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Complete { result, .. } => Some(result),
            Self::Error { result, .. } => result.as_ref(),
        }
    }

    /// Error message column value, `None` on success.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Complete { .. } => None,
            Self::Error { message, .. } => Some(message),
        }
    }
}
