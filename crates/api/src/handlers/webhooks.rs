//! Workflow runner callback handlers.
//!
//! The runner reports grading outcomes here once an async evaluation
//! finishes. Both endpoints require the shared webhook secret and are
//! idempotent: a replayed callback returns 409 without touching state.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use oratia_core::scoring::{resolve_final_score, PASS_THRESHOLD};
use oratia_core::types::RequestId;
use oratia_db::models::evaluation::EvaluationOutcome;

use crate::error::{AppError, AppResult};
use crate::middleware::webhook_auth::WebhookAuth;
use crate::pipeline::finalize::{finalize_evaluation, project_onto_session, FinalizeResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Callback payload reporting one finished evaluation.
#[derive(Debug, Deserialize)]
pub struct EvaluationComplete {
    pub request_id: RequestId,
    /// `"error"` marks a failed run; anything else means success.
    pub status: Option<String>,
    /// Rubric payload produced by the grading step.
    pub result: Option<Value>,
    /// Failure description when the run errored.
    pub error: Option<String>,
}

/// Callback payload for a finished interview analysis.
#[derive(Debug, Deserialize)]
pub struct InterviewAnalysisComplete {
    pub request_id: RequestId,
    pub status: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Interviewee name the analysis extracted, when present.
    pub interviewee_name: Option<String>,
    /// Free-form analysis text to fold into the stored result.
    pub analysis_text: Option<String>,
}

// ---------------------------------------------------------------------------
// Evaluation complete
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/evaluation-complete
///
/// Terminal callback for coaching evaluations. Resolves the final score
/// from the rubric, finalizes the record, and projects the outcome onto
/// the session row.
pub async fn evaluation_complete(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    Json(payload): Json<EvaluationComplete>,
) -> AppResult<impl IntoResponse> {
    let outcome = resolve_outcome(payload.status.as_deref(), payload.result, payload.error);

    let record = match finalize_evaluation(&state.pool, payload.request_id, &outcome).await? {
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
            "score": record.score,
            "passed": record.score.is_some_and(|s| s >= PASS_THRESHOLD),
            "updated_at": record.updated_at,
            "completed_at": record.completed_at,
        },
    })))
}

// ---------------------------------------------------------------------------
// Interview analysis complete
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/interview-analysis-complete
///
/// Terminal callback for diagnostic interviews. Extracted analysis
/// fields are folded into the stored result; the interview session is
/// closed out as completed, or cancelled when the run errored.
pub async fn interview_analysis_complete(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    Json(payload): Json<InterviewAnalysisComplete>,
) -> AppResult<impl IntoResponse> {
    let has_analysis = payload.analysis_text.is_some();
    let interviewee_name = payload.interviewee_name.clone();

    let result = fold_analysis_fields(
        payload.result,
        payload.interviewee_name,
        payload.analysis_text,
    );
    let outcome = resolve_outcome(payload.status.as_deref(), result, payload.error);

    let record = match finalize_evaluation(&state.pool, payload.request_id, &outcome).await? {
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
            "has_analysis": has_analysis,
            "interviewee_name": interviewee_name,
            "updated_at": record.updated_at,
        },
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a callback payload onto a terminal outcome.
///
/// A payload is an error when its status says so or it carries an error
/// message; otherwise the final score is resolved from the rubric tree.
fn resolve_outcome(
    status: Option<&str>,
    result: Option<Value>,
    error: Option<String>,
) -> EvaluationOutcome {
    if status == Some("error") || error.is_some() {
        return EvaluationOutcome::Error {
            message: error.unwrap_or_else(|| "Workflow reported an error".to_string()),
            score: None,
            result,
        };
    }

    let rubric = result.unwrap_or_else(|| json!({}));
    let resolved = resolve_final_score(&rubric);
    EvaluationOutcome::Complete {
        score: resolved.score,
        result: rubric,
    }
}

/// Fold interview-specific fields into the stored result object.
///
/// A non-object result is wrapped under an `analysis` key first so the
/// extracted fields always land on an object.
fn fold_analysis_fields(
    result: Option<Value>,
    interviewee_name: Option<String>,
    analysis_text: Option<String>,
) -> Option<Value> {
    if interviewee_name.is_none() && analysis_text.is_none() {
        return result;
    }

    let mut folded = match result {
        Some(Value::Object(map)) => Value::Object(map),
        Some(other) => json!({ "analysis": other }),
        None => json!({}),
    };
    if let Some(name) = interviewee_name {
        folded["interviewee_name"] = json!(name);
    }
    if let Some(text) = analysis_text {
        folded["analysis_text"] = json!(text);
    }
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_yields_error_outcome() {
        let outcome = resolve_outcome(Some("error"), None, Some("runner exploded".into()));
        assert_eq!(outcome.status().name(), "error");
        assert_eq!(outcome.error_message(), Some("runner exploded"));
    }

    #[test]
    fn error_message_alone_yields_error_outcome() {
        let outcome = resolve_outcome(None, None, Some("timeout in runner".into()));
        assert_eq!(outcome.status().name(), "error");
    }

    #[test]
    fn missing_error_message_gets_a_default() {
        let outcome = resolve_outcome(Some("error"), None, None);
        assert_eq!(outcome.error_message(), Some("Workflow reported an error"));
    }

    #[test]
    fn success_resolves_score_from_rubric() {
        let rubric = json!({
            "Evaluacion": {
                "Claridad": { "Vocalizacion": 80, "Ritmo": 90 },
            },
        });
        let outcome = resolve_outcome(Some("complete"), Some(rubric), None);
        assert_eq!(outcome.status().name(), "complete");
        assert_eq!(outcome.score(), Some(85));
    }

    #[test]
    fn missing_result_completes_with_zero_score() {
        let outcome = resolve_outcome(None, None, None);
        assert_eq!(outcome.status().name(), "complete");
        assert_eq!(outcome.score(), Some(0));
    }

    #[test]
    fn analysis_fields_fold_into_object_result() {
        let folded = fold_analysis_fields(
            Some(json!({ "summary": "ok" })),
            Some("Ana".into()),
            Some("habla claro".into()),
        )
        .unwrap();

        assert_eq!(folded["summary"], "ok");
        assert_eq!(folded["interviewee_name"], "Ana");
        assert_eq!(folded["analysis_text"], "habla claro");
    }

    #[test]
    fn analysis_fields_wrap_non_object_result() {
        let folded = fold_analysis_fields(Some(json!("texto")), Some("Ana".into()), None).unwrap();

        assert_eq!(folded["analysis"], "texto");
        assert_eq!(folded["interviewee_name"], "Ana");
    }

    #[test]
    fn absent_analysis_fields_leave_result_untouched() {
        assert_eq!(fold_analysis_fields(None, None, None), None);
        assert_eq!(
            fold_analysis_fields(Some(json!("raw")), None, None),
            Some(json!("raw"))
        );
    }
}
