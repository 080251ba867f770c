//! HTTP handlers, grouped by resource.

pub mod evaluations;
pub mod webhooks;
