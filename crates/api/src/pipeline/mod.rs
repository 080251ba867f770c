//! The evaluation pipeline: submission intake, grading, finalization,
//! and projection onto session rows.
//!
//! Handlers stay thin; the flows shared by the HTTP surface and the
//! webhook callbacks live here. [`finalize::finalize_evaluation`] is the
//! single entry point into a terminal state, invoked from every call
//! site, so the replay guard exists in exactly one place.

pub mod finalize;
pub mod submit;

pub use finalize::{finalize_evaluation, project_onto_session, FinalizeResult};
pub use submit::{submit_evaluation, SubmissionMode, SubmitEvaluation, SubmitOutcome};
