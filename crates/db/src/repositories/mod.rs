//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async operations
//! that accept `&PgPool` as the first argument.

pub mod coaching_session_repo;
pub mod evaluation_repo;
pub mod interview_session_repo;

pub use coaching_session_repo::CoachingSessionRepo;
pub use evaluation_repo::EvaluationRepo;
pub use interview_session_repo::InterviewSessionRepo;
