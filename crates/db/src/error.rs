use storyforge_core::error::CoreError;

/// Error returned by transactional repository operations.
///
/// Those operations make domain decisions while holding row locks, so they
/// can fail either in the database or on a domain rule.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
