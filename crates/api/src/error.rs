use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use oratia_core::error::CoreError;
use oratia_core::types::RequestId;
use oratia_grader::GraderError;
use oratia_workflow::DispatchError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors, the collaborator error types,
/// and adds HTTP-specific variants. Implements [`IntoResponse`] to
/// produce consistent JSON error responses with a stable `code` field.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `oratia-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The grading collaborator failed after its retry budget.
    #[error("Grading failed: {0}")]
    Grading(#[from] GraderError),

    /// Workflow dispatch failed after its retry budget.
    #[error("Workflow dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// A finalize replay against an already-terminal record.
    #[error("Evaluation request is already finalized ({current_status})")]
    AlreadyFinalized { current_status: String },

    /// No evaluation record exists for the given request id.
    #[error("Evaluation request {0} not found")]
    RequestNotFound(RequestId),

    /// Direct grading was requested but no grading API key is configured.
    #[error("Direct grading is not configured")]
    GradingUnavailable,

    /// Workflow mode was requested but no runner URL is configured.
    #[error("Workflow dispatch is not configured")]
    WorkflowUnavailable,

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::RateLimited { retry_after_secs } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    format!("Too many evaluation requests, retry in {retry_after_secs}s"),
                ),
                CoreError::InsufficientContent {
                    user_turns,
                    required,
                } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INSUFFICIENT_CONTENT",
                    format!("Session has {user_turns} user turns, at least {required} required"),
                ),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Collaborator errors ---
            AppError::Grading(err) => {
                tracing::error!(error = %err, transient = err.is_transient(), "Grading failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "GRADING_FAILED",
                    format!("Grading failed: {err}"),
                )
            }
            AppError::Dispatch(err) => {
                tracing::error!(error = %err, "Workflow dispatch failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "WORKFLOW_DISPATCH_FAILED",
                    format!("Workflow dispatch failed: {err}"),
                )
            }

            // --- Pipeline errors ---
            AppError::AlreadyFinalized { .. } => (
                StatusCode::CONFLICT,
                "ALREADY_FINALIZED",
                "Evaluation request is already finalized".to_string(),
            ),
            AppError::RequestNotFound(request_id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Evaluation request {request_id} not found"),
            ),
            AppError::GradingUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "GRADING_UNAVAILABLE",
                "Direct grading is not configured".to_string(),
            ),
            AppError::WorkflowUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "WORKFLOW_UNAVAILABLE",
                "Workflow dispatch is not configured".to_string(),
            ),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });

        // Fields callers react to programmatically.
        match &self {
            AppError::Core(CoreError::RateLimited { retry_after_secs }) => {
                body["retry_after_secs"] = json!(retry_after_secs);
            }
            AppError::AlreadyFinalized { current_status } => {
                body["current_status"] = json!(current_status);
            }
            AppError::Grading(err) => {
                body["transient"] = json!(err.is_transient());
            }
            _ => {}
        }

        let mut response = (status, axum::Json(body)).into_response();

        if let AppError::Core(CoreError::RateLimited { retry_after_secs }) = &self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }

        response
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
