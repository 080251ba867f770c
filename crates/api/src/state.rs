use std::sync::Arc;

use oratia_grader::GradingProvider;
use oratia_workflow::JobDispatcher;

use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: oratia_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Per-user submission quotas.
    pub rate_limiter: Arc<RateLimiter>,
    /// Direct grading collaborator. `None` when no API key is configured.
    pub grader: Option<Arc<dyn GradingProvider>>,
    /// Workflow runner collaborator. `None` when no runner URL is
    /// configured.
    pub dispatcher: Option<Arc<dyn JobDispatcher>>,
}
