//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Serializable views returned by the API where the row is not enough

pub mod asset;
pub mod job;
pub mod project;
pub mod scene;
pub mod workflow;
