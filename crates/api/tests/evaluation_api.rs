//! HTTP-level integration tests for the evaluation endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener. The grading and dispatch collaborators
//! are replaced with in-process doubles, so no network access happens.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, get, post_json};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use oratia_core::types::EvaluationKind;
use oratia_db::models::evaluation::CreateEvaluation;
use oratia_db::models::status::EvaluationStatus;
use oratia_db::repositories::EvaluationRepo;
use oratia_grader::{GraderError, GradingProvider, GradingRequest};
use oratia_workflow::{DispatchError, JobDispatcher, WorkflowJob};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Grading double returning a canned rubric (or a canned failure) and
/// recording every transcript it was asked to grade.
struct FakeGrader {
    rubric: serde_json::Value,
    fail: Option<(u16, String)>,
    transcripts: Mutex<Vec<String>>,
}

impl FakeGrader {
    fn returning(rubric: serde_json::Value) -> Self {
        Self {
            rubric,
            fail: None,
            transcripts: Mutex::new(Vec::new()),
        }
    }

    fn failing(status: u16, body: &str) -> Self {
        Self {
            rubric: serde_json::Value::Null,
            fail: Some((status, body.to_string())),
            transcripts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GradingProvider for FakeGrader {
    async fn grade(&self, request: &GradingRequest) -> Result<serde_json::Value, GraderError> {
        self.transcripts
            .lock()
            .unwrap()
            .push(request.transcript.clone());
        match &self.fail {
            Some((status, body)) => Err(GraderError::Api {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(self.rubric.clone()),
        }
    }
}

/// Dispatch double recording every job as its serialized JSON payload.
#[derive(Default)]
struct RecordingDispatcher {
    jobs: Mutex<Vec<serde_json::Value>>,
    fail_status: Option<u16>,
}

impl RecordingDispatcher {
    fn failing(status: u16) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail_status: Some(status),
        }
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: &WorkflowJob) -> Result<(), DispatchError> {
        self.jobs
            .lock()
            .unwrap()
            .push(serde_json::to_value(job).unwrap());
        match self.fail_status {
            Some(status) => Err(DispatchError::HttpStatus(status)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A rubric whose dimensions average to 85 and 65, for an overall 75.
fn sample_rubric() -> serde_json::Value {
    json!({
        "Evaluacion": {
            "Claridad": {"Vocalizacion": 80, "Ritmo": 90, "Comentarios": "Bien"},
            "Persuasion": {"Argumentos": 70, "Cierre": 60, "Comentarios": "Regular"},
        },
        "Puntuacion_Total": 100,
    })
}

/// Raw transcript text with the given number of user turns.
fn transcript_with_turns(user_turns: usize) -> String {
    (0..user_turns)
        .map(|i| format!("Agente: pregunta {i}\nUsuario: respuesta {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn seed_coaching_session(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO coaching_sessions (user_id) VALUES ($1) RETURNING id")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn evaluation_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM evaluation_requests")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Direct grading
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn direct_submission_grades_and_finalizes(pool: PgPool) {
    let grader = Arc::new(FakeGrader::returning(sample_rubric()));
    let app = common::build_app(pool.clone(), common::test_config(), Some(grader.clone()), None);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["evaluation"]["score"], 75);
    assert_eq!(body["evaluation"]["passed"], true);
    assert_eq!(
        body["evaluation"]["result"]["Evaluacion"]["Claridad"]["Vocalizacion"],
        80
    );

    // The stored record is terminal with the same score.
    let request_id: Uuid = body["evaluation"]["request_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let record = EvaluationRepo::find_by_request_id(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), Some(EvaluationStatus::Complete));
    assert_eq!(record.score, Some(75));
    assert!(record.completed_at.is_some());

    // The grading double saw the canonical transcript rendering.
    let transcripts = grader.transcripts.lock().unwrap();
    assert_eq!(transcripts.len(), 1);
    assert!(transcripts[0].starts_with("Agente: pregunta 0\nUsuario: respuesta 0"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn structured_messages_normalize_before_grading(pool: PgPool) {
    let grader = Arc::new(FakeGrader::returning(sample_rubric()));
    let app = common::build_app(pool.clone(), common::test_config(), Some(grader.clone()), None);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "coach",
            "messages": [
                {"speaker": "user", "text": "hola"},
                {"speaker": "ai", "text": "hola, empecemos"},
            ],
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let transcripts = grader.transcripts.lock().unwrap();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0], "Usuario: hola\nAgente: hola, empecemos");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn direct_submission_projects_onto_coaching_session(pool: PgPool) {
    let session_id = seed_coaching_session(&pool, 7).await;
    let grader = Arc::new(FakeGrader::returning(sample_rubric()));
    let app = common::build_app(pool.clone(), common::test_config(), Some(grader), None);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "session_id": session_id,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (score, passed, status, feedback): (Option<i32>, Option<bool>, String, Option<serde_json::Value>) =
        sqlx::query_as(
            "SELECT score, passed, status, processed_feedback \
             FROM coaching_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(score, Some(75));
    assert_eq!(passed, Some(true));
    assert_eq!(status, "completed");
    assert_eq!(
        feedback.unwrap()["Evaluacion"]["Persuasion"]["Argumentos"],
        70
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn grading_failure_finalizes_record_as_error(pool: PgPool) {
    let request_id = Uuid::new_v4();
    let grader = Arc::new(FakeGrader::failing(500, "model overloaded"));
    let app = common::build_app(pool.clone(), common::test_config(), Some(grader), None);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "request_id": request_id,
            "user_id": 7,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "GRADING_FAILED");
    assert_eq!(body["transient"], true);

    // The record is parked in a terminal error state, not left processing.
    let record = EvaluationRepo::find_by_request_id(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), Some(EvaluationStatus::Error));
    assert_eq!(record.score, None);
    assert!(record.error_message.unwrap().contains("model overloaded"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn direct_mode_without_grader_returns_503(pool: PgPool) {
    let app = common::build_test_app(pool.clone());

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["code"], "GRADING_UNAVAILABLE");

    // Nothing was written for the unconfigured path.
    assert_eq!(evaluation_count(&pool).await, 0);
}

// ---------------------------------------------------------------------------
// Workflow dispatch
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn workflow_submission_queues_job(pool: PgPool) {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let app = common::build_app(
        pool.clone(),
        common::test_config(),
        None,
        Some(dispatcher.clone()),
    );

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "coach",
            "transcript": transcript_with_turns(8),
            "mode": "workflow",
            "scenario": {"profile": "Gerente de compras"},
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "processing");
    let request_id = body["request_id"].as_str().unwrap().to_string();

    {
        let jobs = dispatcher.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job["request_id"].as_str().unwrap(), request_id);
        assert_eq!(job["kind"], "coach");
        assert_eq!(job["metadata"]["user_id"], 7);
        assert_eq!(job["metadata"]["user_turn_count"], 8);
        assert_eq!(job["metadata"]["profile"], "Gerente de compras");
        assert!(job["transcript"]
            .as_str()
            .unwrap()
            .contains("Usuario: respuesta 7"));
    }

    // The record waits in processing for the completion webhook.
    let record = EvaluationRepo::find_by_request_id(&pool, request_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), Some(EvaluationStatus::Processing));
    assert!(!record.is_terminal());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn short_workflow_submission_returns_422_without_record(pool: PgPool) {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let app = common::build_app(
        pool.clone(),
        common::test_config(),
        None,
        Some(dispatcher.clone()),
    );

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "coach",
            "transcript": transcript_with_turns(3),
            "mode": "workflow",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INSUFFICIENT_CONTENT");
    assert_eq!(body["error"], "Session has 3 user turns, at least 8 required");

    // The gate fires before any record or dispatch exists.
    assert!(dispatcher.jobs.lock().unwrap().is_empty());
    assert_eq!(evaluation_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn dispatch_failure_finalizes_record_as_error(pool: PgPool) {
    let request_id = Uuid::new_v4();
    let dispatcher = Arc::new(RecordingDispatcher::failing(502));
    let app = common::build_app(
        pool.clone(),
        common::test_config(),
        None,
        Some(dispatcher),
    );

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "request_id": request_id,
            "user_id": 7,
            "kind": "coach",
            "transcript": transcript_with_turns(8),
            "mode": "workflow",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "WORKFLOW_DISPATCH_FAILED");

    let record = EvaluationRepo::find_by_request_id(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), Some(EvaluationStatus::Error));
    assert!(record.error_message.unwrap().contains("HTTP 502"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn workflow_mode_without_dispatcher_returns_503(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "coach",
            "transcript": transcript_with_turns(8),
            "mode": "workflow",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["code"], "WORKFLOW_UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn submission_with_both_transcript_and_messages_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "kind": "roleplay",
            "transcript": "Usuario: hola",
            "messages": [{"speaker": "user", "text": "hola"}],
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Provide either transcript or messages, not both");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submission_without_content_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({"user_id": 7, "kind": "roleplay"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "A transcript or a messages array is required");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn blank_transcript_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({"user_id": 7, "kind": "roleplay", "transcript": "   \n  "}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Transcript must not be empty");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_messages_array_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({"user_id": 7, "kind": "roleplay", "messages": []}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Messages array must not be empty");
}

// ---------------------------------------------------------------------------
// Session ownership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_session_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 7,
            "session_id": 999999,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Coaching session with id 999999 not found");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn foreign_session_returns_403(pool: PgPool) {
    let session_id = seed_coaching_session(&pool, 2).await;
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "user_id": 1,
            "session_id": session_id,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn poll_returns_result_only_when_complete(pool: PgPool) {
    // A freshly created record polls as pending without a rubric.
    let pending_id = Uuid::new_v4();
    EvaluationRepo::create(
        &pool,
        &CreateEvaluation {
            request_id: pending_id,
            user_id: 7,
            session_id: None,
            kind: EvaluationKind::Roleplay,
        },
    )
    .await
    .unwrap();

    let app = common::build_test_app(pool.clone());
    let response = get(app, &format!("/api/v1/evaluations/{pending_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["score"], serde_json::Value::Null);
    assert!(body.get("result").is_none());

    // A directly graded record polls as complete with the rubric attached.
    let graded_id = Uuid::new_v4();
    let grader = Arc::new(FakeGrader::returning(sample_rubric()));
    let app = common::build_app(pool.clone(), common::test_config(), Some(grader), None);
    let response = post_json(
        app,
        "/api/v1/evaluations",
        json!({
            "request_id": graded_id,
            "user_id": 7,
            "kind": "roleplay",
            "transcript": transcript_with_turns(3),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool);
    let response = get(app, &format!("/api/v1/evaluations/{graded_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "complete");
    assert_eq!(body["score"], 75);
    assert_eq!(
        body["result"]["Evaluacion"]["Claridad"]["Ritmo"],
        90
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn poll_unknown_request_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = get(
        app,
        &format!("/api/v1/evaluations/{}", Uuid::new_v4()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Insufficient-content close-out
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn insufficient_closeout_finalizes_with_zero_score(pool: PgPool) {
    let session_id = seed_coaching_session(&pool, 7).await;
    let request_id = Uuid::new_v4();
    EvaluationRepo::create(
        &pool,
        &CreateEvaluation {
            request_id,
            user_id: 7,
            session_id: Some(session_id),
            kind: EvaluationKind::Roleplay,
        },
    )
    .await
    .unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        &format!("/api/v1/evaluations/{request_id}/insufficient"),
        json!({"user_turn_count": 2}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["evaluation"]["status"], "complete");
    assert_eq!(body["evaluation"]["result"]["score"], 0);
    assert_eq!(
        body["evaluation"]["result"]["metadata"]["reason"],
        "insufficient_user_turns"
    );
    assert_eq!(body["evaluation"]["result"]["metadata"]["user_turn_count"], 2);

    // The zero score projects onto the session as a failed completion.
    let (score, passed, status): (Option<i32>, Option<bool>, String) =
        sqlx::query_as("SELECT score, passed, status FROM coaching_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(score, Some(0));
    assert_eq!(passed, Some(false));
    assert_eq!(status, "completed");

    // Replaying the close-out conflicts instead of rewriting the record.
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        &format!("/api/v1/evaluations/{request_id}/insufficient"),
        json!({"user_turn_count": 2}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "ALREADY_FINALIZED");
    assert_eq!(body["current_status"], "complete");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn insufficient_closeout_for_unknown_request_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        &format!("/api/v1/evaluations/{}/insufficient", Uuid::new_v4()),
        json!({"user_turn_count": 2}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Quotas and idempotency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn per_minute_quota_returns_429(pool: PgPool) {
    let mut config = common::test_config();
    config.rate_limit_per_minute = 1;
    let grader = Arc::new(FakeGrader::returning(sample_rubric()));
    let app = common::build_app(pool, config, Some(grader), None);

    let payload = json!({
        "user_id": 7,
        "kind": "roleplay",
        "transcript": transcript_with_turns(3),
    });

    let first = post_json(app.clone(), "/api/v1/evaluations", payload.clone()).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_json(app, "/api/v1/evaluations", payload).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().get("retry-after").is_some());

    let body = body_json(second).await;
    assert_eq!(body["code"], "RATE_LIMITED");
    let retry_after = body["retry_after_secs"].as_u64().unwrap();
    assert!(
        (1..=60).contains(&retry_after),
        "retry hint should fall within the minute window, got {retry_after}"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn duplicate_request_id_returns_409(pool: PgPool) {
    let request_id = Uuid::new_v4();
    let grader = Arc::new(FakeGrader::returning(sample_rubric()));
    let app = common::build_app(pool, common::test_config(), Some(grader), None);

    let payload = json!({
        "request_id": request_id,
        "user_id": 7,
        "kind": "roleplay",
        "transcript": transcript_with_turns(3),
    });

    let first = post_json(app.clone(), "/api/v1/evaluations", payload.clone()).await;
    assert_eq!(first.status(), StatusCode::OK);
    let body = body_json(first).await;
    assert_eq!(
        body["evaluation"]["request_id"].as_str().unwrap(),
        request_id.to_string()
    );

    let second = post_json(app, "/api/v1/evaluations", payload).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["code"], "CONFLICT");
}
