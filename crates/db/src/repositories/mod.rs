//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Helpers that participate in a
//! larger transaction take `&mut Transaction` instead and are crate-private.

pub mod asset_repo;
pub mod job_repo;
pub mod project_repo;
pub mod scene_repo;
pub mod workflow_repo;

pub use asset_repo::AssetRepo;
pub use job_repo::JobRepo;
pub use project_repo::ProjectRepo;
pub use scene_repo::SceneRepo;
pub use workflow_repo::WorkflowRepo;
