//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for the writes the pipeline performs
//! - Pure helpers for status decoding and outcome mapping

pub mod evaluation;
pub mod session;
pub mod status;
