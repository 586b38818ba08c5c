pub mod assets;
pub mod events;
pub mod jobs;
pub mod projects;
pub mod workflow;
