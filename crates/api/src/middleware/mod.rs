//! Request extractors guarding protected endpoints.

pub mod webhook_auth;
