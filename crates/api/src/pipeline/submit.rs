//! Submission intake: quota, transcript normalization, ownership checks,
//! and routing to the grading path.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use oratia_core::error::CoreError;
use oratia_core::scoring::resolve_final_score;
use oratia_core::transcript::{
    has_recognizable_turns, normalize_raw, normalize_turns, NormalizedTranscript, TranscriptTurn,
    MIN_USER_TURNS,
};
use oratia_core::types::{DbId, EvaluationKind, RequestId};
use oratia_db::models::evaluation::{CreateEvaluation, EvaluationOutcome, EvaluationRequest};
use oratia_db::repositories::{CoachingSessionRepo, EvaluationRepo, InterviewSessionRepo};
use oratia_grader::{GradingRequest, ScenarioContext};
use oratia_workflow::WorkflowJob;

use crate::error::{AppError, AppResult};
use crate::pipeline::finalize::{finalize_evaluation, project_onto_session, FinalizeResult};
use crate::rate_limit::Admission;
use crate::state::AppState;

/// Who grades a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Grade inline and reply with the finalized result.
    #[default]
    Direct,
    /// Queue on the workflow runner and reply `202 Accepted`.
    Workflow,
}

/// `POST /api/v1/evaluations` request body.
///
/// Exactly one of `transcript` and `messages` must be present.
#[derive(Debug, Deserialize)]
pub struct SubmitEvaluation {
    /// Client-supplied idempotency key; generated when absent.
    pub request_id: Option<RequestId>,
    /// Session the transcript came from, when one exists.
    pub session_id: Option<DbId>,
    /// Owner of the submission.
    pub user_id: DbId,
    pub kind: EvaluationKind,
    /// Raw transcript text.
    pub transcript: Option<String>,
    /// Structured turns, ordered.
    pub messages: Option<Vec<TranscriptTurn>>,
    /// Grading path; defaults to `direct`.
    #[serde(default)]
    pub mode: SubmissionMode,
    /// Scenario metadata forwarded into the grading context.
    #[serde(default)]
    pub scenario: ScenarioContext,
}

/// What a submission produced.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Graded inline; the finalized record carries the rubric.
    Graded(EvaluationRequest),
    /// Handed to the workflow runner; the record is `processing`.
    Queued(EvaluationRequest),
}

/// Run one submission through the pipeline.
///
/// The quota check runs first, so a malformed request still consumes a
/// submission slot. Ownership of a referenced session is verified before
/// any record is written.
pub async fn submit_evaluation(
    state: &AppState,
    mut input: SubmitEvaluation,
) -> AppResult<SubmitOutcome> {
    if let Admission::Denied { retry_after_secs } = state.rate_limiter.admit(input.user_id).await {
        return Err(AppError::Core(CoreError::RateLimited { retry_after_secs }));
    }

    let normalized = normalize_submission(input.transcript.take(), input.messages.take())?;

    if let Some(session_id) = input.session_id {
        verify_session_owner(&state.pool, session_id, input.user_id, input.kind).await?;
    }

    // A dropped client connection cancels the handler future, but it must
    // not abort grading or dispatch mid-flight and strand the record in a
    // non-terminal state. The mutation sequence runs on its own task.
    let state = state.clone();
    let task = tokio::spawn(async move {
        match input.mode {
            SubmissionMode::Workflow => queue_on_workflow(&state, &input, &normalized).await,
            SubmissionMode::Direct => grade_directly(&state, &input, &normalized).await,
        }
    });
    task.await
        .map_err(|e| AppError::Core(CoreError::Internal(format!("Submission task failed: {e}"))))?
}

/// Normalize the transcript input, rejecting ambiguous or empty bodies.
fn normalize_submission(
    transcript: Option<String>,
    messages: Option<Vec<TranscriptTurn>>,
) -> AppResult<NormalizedTranscript> {
    match (transcript, messages) {
        (Some(_), Some(_)) => Err(AppError::Core(CoreError::Validation(
            "Provide either transcript or messages, not both".into(),
        ))),
        (None, None) => Err(AppError::Core(CoreError::Validation(
            "A transcript or a messages array is required".into(),
        ))),
        (Some(raw), None) => {
            if raw.trim().is_empty() {
                return Err(AppError::Core(CoreError::Validation(
                    "Transcript must not be empty".into(),
                )));
            }
            if !has_recognizable_turns(&raw) {
                tracing::warn!(
                    "No speaker labels recognized, treating the whole transcript as one user turn"
                );
            }
            Ok(normalize_raw(&raw))
        }
        (None, Some(turns)) => {
            if turns.is_empty() {
                return Err(AppError::Core(CoreError::Validation(
                    "Messages array must not be empty".into(),
                )));
            }
            Ok(normalize_turns(turns))
        }
    }
}

/// Check that the referenced session exists and belongs to the caller.
///
/// Diagnostic evaluations reference interview sessions; every other kind
/// references coaching sessions.
async fn verify_session_owner(
    pool: &PgPool,
    session_id: DbId,
    user_id: DbId,
    kind: EvaluationKind,
) -> AppResult<()> {
    let owner = match kind {
        EvaluationKind::Diagnostic => InterviewSessionRepo::find_by_id(pool, session_id)
            .await?
            .map(|s| s.user_id)
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Interview session",
                id: session_id,
            }))?,
        _ => CoachingSessionRepo::find_by_id(pool, session_id)
            .await?
            .map(|s| s.user_id)
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Coaching session",
                id: session_id,
            }))?,
    };

    if owner != user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Session belongs to another user".into(),
        )));
    }
    Ok(())
}

/// Create the record and hand the job to the workflow runner.
///
/// Too-short sessions are rejected before anything is written, so no
/// record and no dispatch exist for them. A dispatch failure after the
/// runner's retry budget finalizes the record as `error`.
async fn queue_on_workflow(
    state: &AppState,
    input: &SubmitEvaluation,
    normalized: &NormalizedTranscript,
) -> AppResult<SubmitOutcome> {
    let Some(dispatcher) = &state.dispatcher else {
        return Err(AppError::WorkflowUnavailable);
    };

    if !normalized.is_sufficient() {
        return Err(AppError::Core(CoreError::InsufficientContent {
            user_turns: normalized.user_turn_count,
            required: MIN_USER_TURNS,
        }));
    }

    let request_id = input.request_id.unwrap_or_else(Uuid::new_v4);
    let record = EvaluationRepo::create(
        &state.pool,
        &CreateEvaluation {
            request_id,
            user_id: input.user_id,
            session_id: input.session_id,
            kind: input.kind,
        },
    )
    .await?;

    let job = WorkflowJob::new(
        request_id,
        input.session_id,
        input.kind,
        normalized.text.clone(),
        input.user_id,
        normalized.user_turn_count,
    )
    .with_scenario(
        input.scenario.profile.clone(),
        input.scenario.scenario.clone(),
        input.scenario.objective.clone(),
    );

    if let Err(e) = dispatcher.dispatch(&job).await {
        let outcome = EvaluationOutcome::Error {
            message: format!("Workflow dispatch failed: {e}"),
            score: None,
            result: None,
        };
        let _ = finalize_evaluation(&state.pool, request_id, &outcome).await?;
        return Err(AppError::Dispatch(e));
    }

    let record = EvaluationRepo::mark_processing(&state.pool, request_id)
        .await?
        .unwrap_or(record);

    tracing::info!(
        request_id = %request_id,
        kind = input.kind.as_str(),
        user_id = input.user_id,
        "Evaluation queued on workflow runner"
    );

    Ok(SubmitOutcome::Queued(record))
}

/// Create the record, grade inline, finalize, and project.
async fn grade_directly(
    state: &AppState,
    input: &SubmitEvaluation,
    normalized: &NormalizedTranscript,
) -> AppResult<SubmitOutcome> {
    let Some(grader) = &state.grader else {
        return Err(AppError::GradingUnavailable);
    };

    let request_id = input.request_id.unwrap_or_else(Uuid::new_v4);
    EvaluationRepo::create(
        &state.pool,
        &CreateEvaluation {
            request_id,
            user_id: input.user_id,
            session_id: input.session_id,
            kind: input.kind,
        },
    )
    .await?;
    EvaluationRepo::mark_processing(&state.pool, request_id).await?;

    let grading_request = GradingRequest {
        kind: input.kind,
        transcript: normalized.text.clone(),
        scenario: input.scenario.clone(),
    };

    let rubric = match grader.grade(&grading_request).await {
        Ok(rubric) => rubric,
        Err(e) => {
            let outcome = EvaluationOutcome::Error {
                message: e.to_string(),
                score: None,
                result: None,
            };
            let _ = finalize_evaluation(&state.pool, request_id, &outcome).await?;
            return Err(AppError::Grading(e));
        }
    };

    let resolved = resolve_final_score(&rubric);
    let outcome = EvaluationOutcome::Complete {
        score: resolved.score,
        result: rubric,
    };

    let record = match finalize_evaluation(&state.pool, request_id, &outcome).await? {
        FinalizeResult::Finalized(record) | FinalizeResult::AlreadyFinalized(record) => record,
    };

    project_onto_session(&state.pool, &record).await;

    tracing::info!(
        request_id = %request_id,
        score = resolved.score,
        passed = resolved.passed,
        "Evaluation graded directly"
    );

    Ok(SubmitOutcome::Graded(record))
}
