//! Domain logic for the Oratia evaluation pipeline.
//!
//! Pure, storage-agnostic building blocks shared by every other crate:
//!
//! - [`scoring`] -- deterministic rubric aggregation (dimension averages,
//!   overall score, pass threshold).
//! - [`transcript`] -- raw-transcript parsing and normalization into the
//!   format the grading model expects.
//! - [`error`] -- the [`CoreError`] taxonomy surfaced across crate
//!   boundaries.
//! - [`types`] -- shared type aliases.

pub mod error;
pub mod scoring;
pub mod transcript;
pub mod types;

pub use error::CoreError;
