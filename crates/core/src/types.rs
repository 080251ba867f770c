//! Shared identifier types and the evaluation kind.

use serde::{Deserialize, Serialize};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Evaluation requests are identified by a caller- or server-generated
/// UUID, the pipeline's sole idempotency key.
pub type RequestId = uuid::Uuid;

/// What produced the session under evaluation.
///
/// The kind selects the grading context and decides which session table a
/// finalized evaluation projects onto: `diagnostic` targets interview
/// sessions, everything else targets coaching sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    Roleplay,
    Coach,
    Diagnostic,
    TechWeek,
}

impl EvaluationKind {
    /// Stable string form, matching the stored `kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roleplay => "roleplay",
            Self::Coach => "coach",
            Self::Diagnostic => "diagnostic",
            Self::TechWeek => "tech_week",
        }
    }

    /// Parse a stored kind string. Unknown strings yield `None`.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "roleplay" => Some(Self::Roleplay),
            "coach" => Some(Self::Coach),
            "diagnostic" => Some(Self::Diagnostic),
            "tech_week" => Some(Self::TechWeek),
            _ => None,
        }
    }
}
