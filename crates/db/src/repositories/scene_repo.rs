//! Repository for the `scenes` table.
//!
//! Kind state is only written through [`write_kind`], which takes a
//! [`KindUpdate`] so the URL/status pairing is decided in one place.

use sqlx::{PgPool, Postgres, Transaction};
use storyforge_core::dispatch::MessageUpdate;
use storyforge_core::scene_state::{KindUpdate, MediaKind, MediaType};
use storyforge_core::status::AssetStatus;
use storyforge_core::types::DbId;

use crate::models::scene::{kind_columns, CreateScene, Scene};

/// Column list for `scenes` queries.
pub(crate) const COLUMNS: &str = "\
    id, project_id, scene_number, media_type, visual_description, narration, \
    sfx_prompt, duration_seconds, \
    image_status_id, image_url, image_attempts, \
    audio_status_id, audio_url, audio_attempts, \
    video_status_id, video_url, video_attempts, \
    sfx_status_id, sfx_url, sfx_attempts, \
    error_message, skipped, created_at, updated_at";

/// Provides scene persistence.
pub struct SceneRepo;

impl SceneRepo {
    /// Insert a scene. Without an explicit number it is appended after the
    /// project's last scene.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateScene,
    ) -> Result<Scene, sqlx::Error> {
        let media_type = input
            .media_type
            .as_deref()
            .map_or(MediaType::Image, MediaType::parse_or_default);
        let query = format!(
            "INSERT INTO scenes \
                 (project_id, scene_number, media_type, visual_description, narration, \
                  sfx_prompt, duration_seconds) \
             VALUES ($1, \
                     COALESCE($2, (SELECT COALESCE(MAX(scene_number), 0) + 1 \
                                   FROM scenes WHERE project_id = $1)), \
                     $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(project_id)
            .bind(input.scene_number)
            .bind(media_type.as_str())
            .bind(&input.visual_description)
            .bind(&input.narration)
            .bind(&input.sfx_prompt)
            .bind(input.duration_seconds)
            .fetch_one(pool)
            .await
    }

    /// Find a scene by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenes WHERE id = $1");
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's scenes in scene order.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Scene>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenes WHERE project_id = $1 ORDER BY scene_number ASC"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// Transaction helpers
// ---------------------------------------------------------------------------

pub(crate) async fn list_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    project_id: DbId,
) -> Result<Vec<Scene>, sqlx::Error> {
    let query =
        format!("SELECT {COLUMNS} FROM scenes WHERE project_id = $1 ORDER BY scene_number ASC");
    sqlx::query_as::<_, Scene>(&query)
        .bind(project_id)
        .fetch_all(&mut **tx)
        .await
}

pub(crate) async fn find_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: DbId,
) -> Result<Option<Scene>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM scenes WHERE id = $1");
    sqlx::query_as::<_, Scene>(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

/// Persist one kind update.
pub(crate) async fn write_kind(
    tx: &mut Transaction<'_, Postgres>,
    scene_id: DbId,
    update: &KindUpdate,
) -> Result<(), sqlx::Error> {
    let cols = kind_columns(update.kind());
    let query = format!(
        "UPDATE scenes \
         SET {status} = $2, {url} = $3, {attempts} = COALESCE($4, {attempts}) \
         WHERE id = $1",
        status = cols.status,
        url = cols.url,
        attempts = cols.attempts,
    );
    sqlx::query(&query)
        .bind(scene_id)
        .bind(update.status().id())
        .bind(update.url())
        .bind(update.attempts())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Promote a kind to `processing` only if it still has the expected status.
///
/// Returns `None` when another writer changed the kind first.
pub(crate) async fn claim_kind(
    tx: &mut Transaction<'_, Postgres>,
    scene_id: DbId,
    kind: MediaKind,
    expected: AssetStatus,
) -> Result<Option<Scene>, sqlx::Error> {
    let cols = kind_columns(kind);
    let query = format!(
        "UPDATE scenes \
         SET {status} = $2, {url} = NULL \
         WHERE id = $1 AND {status} = $3 \
         RETURNING {COLUMNS}",
        status = cols.status,
        url = cols.url,
    );
    sqlx::query_as::<_, Scene>(&query)
        .bind(scene_id)
        .bind(AssetStatus::Processing.id())
        .bind(expected.id())
        .fetch_optional(&mut **tx)
        .await
}

pub(crate) async fn write_message(
    tx: &mut Transaction<'_, Postgres>,
    scene_id: DbId,
    message: &MessageUpdate,
) -> Result<(), sqlx::Error> {
    let value = match message {
        MessageUpdate::Keep => return Ok(()),
        MessageUpdate::Clear => None,
        MessageUpdate::Set(text) => Some(text.as_str()),
    };
    sqlx::query("UPDATE scenes SET error_message = $2 WHERE id = $1")
        .bind(scene_id)
        .bind(value)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub(crate) async fn set_skipped(
    tx: &mut Transaction<'_, Postgres>,
    scene_id: DbId,
    skipped: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE scenes SET skipped = $2 WHERE id = $1")
        .bind(scene_id)
        .bind(skipped)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Renumber scenes from 1 in the given order.
///
/// The uniqueness constraint is deferred to commit so intermediate
/// numbering collisions are allowed.
pub(crate) async fn renumber(
    tx: &mut Transaction<'_, Postgres>,
    project_id: DbId,
    scene_ids: &[DbId],
) -> Result<(), sqlx::Error> {
    sqlx::query("SET CONSTRAINTS uq_scenes_project_scene_number DEFERRED")
        .execute(&mut **tx)
        .await?;
    for (index, scene_id) in scene_ids.iter().enumerate() {
        sqlx::query("UPDATE scenes SET scene_number = $3 WHERE id = $1 AND project_id = $2")
            .bind(scene_id)
            .bind(project_id)
            .bind(index as i32 + 1)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
