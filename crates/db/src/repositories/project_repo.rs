//! Repository for the `projects` table, including the generation lock.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use storyforge_core::error::CoreError;
use storyforge_core::lock::{check_acquire, check_release};
use storyforge_core::status::ProjectStatus;
use storyforge_core::types::DbId;

use crate::error::DbError;
use crate::models::project::{CreateProject, Project};

/// Column list for `projects` queries.
pub(crate) const COLUMNS: &str = "\
    id, owner_id, name, status_id, lock_session_id, lock_expires_at, \
    channel_id, voice_name, tts_provider, video_model, created_at, updated_at";

/// Provides project persistence and atomic lock transitions.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new draft project owned by `owner_id`.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (owner_id, name, channel_id, voice_name, tts_provider, video_model) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.channel_id)
            .bind(&input.voice_name)
            .bind(&input.tts_provider)
            .bind(&input.video_model)
            .fetch_one(pool)
            .await
    }

    /// Find a project by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Acquire (or extend) the project lock for `session_id` and mark the
    /// project as generating.
    ///
    /// The read-check-write runs under the row lock, so two sessions racing
    /// for the same project cannot both win.
    pub async fn acquire_lock(
        pool: &PgPool,
        id: DbId,
        session_id: &str,
        ttl_secs: i64,
    ) -> Result<Project, DbError> {
        let mut tx = pool.begin().await?;
        let project = lock_row(&mut tx, id).await?;

        let expires_at = check_acquire(project.lock_state(), session_id, Utc::now(), ttl_secs)?;

        let query = format!(
            "UPDATE projects \
             SET lock_session_id = $2, lock_expires_at = $3, status_id = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(session_id)
            .bind(expires_at)
            .bind(ProjectStatus::Generating.id())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(project)
    }

    /// Release the lock, optionally moving the project to `status`.
    ///
    /// Refused only when a different session holds a still-valid lock.
    pub async fn release_lock(
        pool: &PgPool,
        id: DbId,
        session_id: &str,
        status: Option<ProjectStatus>,
    ) -> Result<Project, DbError> {
        let mut tx = pool.begin().await?;
        let project = lock_row(&mut tx, id).await?;

        check_release(project.lock_state(), session_id, Utc::now())?;

        let query = format!(
            "UPDATE projects \
             SET lock_session_id = NULL, lock_expires_at = NULL, \
                 status_id = COALESCE($2, status_id) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(status.map(ProjectStatus::id))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(project)
    }
}

/// Load a project with `FOR UPDATE`, serializing every workflow mutation
/// on that project until the transaction ends.
pub(crate) async fn lock_row(
    tx: &mut Transaction<'_, Postgres>,
    id: DbId,
) -> Result<Project, DbError> {
    let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, Project>(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(DbError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))
}

pub(crate) async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    id: DbId,
    status: ProjectStatus,
) -> Result<Project, sqlx::Error> {
    let query = format!("UPDATE projects SET status_id = $2 WHERE id = $1 RETURNING {COLUMNS}");
    sqlx::query_as::<_, Project>(&query)
        .bind(id)
        .bind(status.id())
        .fetch_one(&mut **tx)
        .await
}
