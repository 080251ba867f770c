use std::net::SocketAddr;
use std::sync::Arc;

use oratia_api::config::ServerConfig;
use oratia_api::rate_limit::RateLimiter;
use oratia_api::router::build_app_router;
use oratia_api::state::AppState;
use oratia_grader::{GradingProvider, OpenAiGrader};
use oratia_workflow::{JobDispatcher, WorkflowDispatcher};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env if present (development convenience; no-op in production).
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oratia_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        "Loaded server configuration"
    );

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = oratia_db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");
    info!("Database pool created");

    oratia_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    info!("Database connection verified");

    oratia_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    info!("Database migrations applied");

    let grader: Option<Arc<dyn GradingProvider>> = match config.grader_config() {
        Some(grader_config) => Some(Arc::new(OpenAiGrader::new(grader_config))),
        None => {
            warn!("GRADER_API_KEY not set, direct grading disabled");
            None
        }
    };

    let dispatcher: Option<Arc<dyn JobDispatcher>> = match &config.workflow_webhook_url {
        Some(url) => Some(Arc::new(WorkflowDispatcher::new(url.clone()))),
        None => {
            warn!("WORKFLOW_WEBHOOK_URL not set, workflow dispatch disabled");
            None
        }
    };

    if config.webhook_shared_secret.is_none() {
        warn!("WEBHOOK_SHARED_SECRET not set, webhook callbacks disabled");
    }

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

    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Graceful shutdown complete");
}

/// Resolves when the process receives SIGINT (Ctrl-C) or SIGTERM, letting
/// in-flight requests drain before the server exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
