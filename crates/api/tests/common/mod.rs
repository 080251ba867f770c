// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, Response};
use axum::Router;
use sqlx::PgPool;
use tower::ServiceExt;

use oratia_api::config::ServerConfig;
use oratia_api::rate_limit::RateLimiter;
use oratia_api::router::build_app_router;
use oratia_api::state::AppState;
use oratia_grader::GradingProvider;
use oratia_workflow::JobDispatcher;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout, and quotas high enough that rate limiting
/// never interferes with tests that are not about rate limiting.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        webhook_shared_secret: Some("test-secret".to_string()),
        workflow_webhook_url: None,
        grader_base_url: "https://api.openai.com/v1".to_string(),
        grader_api_key: None,
        grader_model: "gpt-4o".to_string(),
        grader_timeout_secs: 25,
        grader_max_attempts: 3,
        rate_limit_per_minute: 100,
        rate_limit_per_day: 1000,
    }
}

/// Build the application router with the given pool, config, and optional
/// grading/dispatch collaborators.
///
/// Goes through [`build_app_router`] so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub fn build_app(
    pool: PgPool,
    config: ServerConfig,
    grader: Option<Arc<dyn GradingProvider>>,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_per_minute,
        config.rate_limit_per_day,
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        rate_limiter,
        grader,
        dispatcher,
    };

    build_app_router(state, &config)
}

/// Build the application router with default test config and no grading or
/// dispatch collaborators configured.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app(pool, test_config(), None, None)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request to the given URI.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body to the given URI.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body and one extra header.
pub async fn post_json_with_header(
    app: Router,
    uri: &str,
    header: (&str, &str),
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(header.0, header.1)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
