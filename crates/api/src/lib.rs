//! Oratia evaluation API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! the grading pipeline) so integration tests and the binary entrypoint
//! can both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod state;
