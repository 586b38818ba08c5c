//! Repository for the asset reuse catalog (`asset_index`, `asset_usages`).
//!
//! Scoring and ranking live in `storyforge_core::catalog`; this module only
//! fetches candidates and records usage.

use sqlx::PgPool;
use storyforge_core::catalog::{categorize, AssetType, TypeUsage};
use storyforge_core::scene_state::MediaKind;
use storyforge_core::status::AssetStatus;
use storyforge_core::types::DbId;

use crate::models::asset::{
    AssetListQuery, AssetPage, CatalogAsset, CatalogSummary, NewCatalogAsset, SceneAssetCandidate,
};
use crate::models::scene::kind_columns;

/// Column list for `asset_index` queries.
const COLUMNS: &str = "\
    id, asset_type, url, description, tags, category, duration_seconds, \
    reuse_count, last_used_at, last_used_in_channel, quality_score, \
    source_scene_id, source_project_id, created_at, updated_at";

/// Indexed entries fetched per search before scoring.
const CANDIDATE_LIMIT: i64 = 200;

/// Completed scenes scored by the hybrid fallback.
const SCENE_CANDIDATE_LIMIT: i64 = 50;

/// Maximum page size for catalog listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for catalog listing.
const DEFAULT_LIMIT: i64 = 20;

/// Provides catalog storage and reuse tracking.
pub struct AssetRepo;

impl AssetRepo {
    /// Index a generated asset. Returns `None` if the URL is already
    /// cataloged.
    pub async fn register(
        pool: &PgPool,
        input: &NewCatalogAsset,
    ) -> Result<Option<CatalogAsset>, sqlx::Error> {
        let query = format!(
            "INSERT INTO asset_index \
                 (asset_type, url, description, tags, category, duration_seconds, \
                  source_scene_id, source_project_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_asset_index_url DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CatalogAsset>(&query)
            .bind(input.asset_type.as_str())
            .bind(&input.url)
            .bind(&input.description)
            .bind(&input.tags)
            .bind(&input.category)
            .bind(input.duration_seconds)
            .bind(input.source_scene_id)
            .bind(input.source_project_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a catalog entry by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CatalogAsset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM asset_index WHERE id = $1");
        sqlx::query_as::<_, CatalogAsset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch search candidates of one type, best quality first.
    ///
    /// When `exclude_channel` is set, entries that channel used within the
    /// last `recency_days` are left out.
    pub async fn find_candidates(
        pool: &PgPool,
        asset_type: AssetType,
        exclude_channel: Option<&str>,
        recency_days: i32,
    ) -> Result<Vec<CatalogAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM asset_index a \
             WHERE a.asset_type = $1 \
               AND NOT ($2 AND EXISTS ( \
                   SELECT 1 FROM asset_usages u \
                   WHERE u.asset_id = a.id \
                     AND u.channel_id = $3 \
                     AND u.used_at > NOW() - make_interval(days => $4) \
               )) \
             ORDER BY a.quality_score DESC, a.reuse_count ASC \
             LIMIT $5"
        );
        sqlx::query_as::<_, CatalogAsset>(&query)
            .bind(asset_type.as_str())
            .bind(exclude_channel.is_some())
            .bind(exclude_channel)
            .bind(recency_days)
            .bind(CANDIDATE_LIMIT)
            .fetch_all(pool)
            .await
    }

    /// Completed scene assets of one kind, newest first, for the hybrid
    /// search.
    pub async fn find_scene_candidates(
        pool: &PgPool,
        kind: MediaKind,
    ) -> Result<Vec<SceneAssetCandidate>, sqlx::Error> {
        let cols = kind_columns(kind);
        let query = format!(
            "SELECT id AS scene_id, project_id, {url} AS url, {desc} AS description, \
                    duration_seconds \
             FROM scenes \
             WHERE {status} = $1 AND {url} IS NOT NULL \
             ORDER BY updated_at DESC \
             LIMIT $2",
            url = cols.url,
            desc = cols.description,
            status = cols.status,
        );
        sqlx::query_as::<_, SceneAssetCandidate>(&query)
            .bind(AssetStatus::Completed.id())
            .bind(SCENE_CANDIDATE_LIMIT)
            .fetch_all(pool)
            .await
    }

    /// Record one reuse of an entry. Returns `None` for an unknown id.
    pub async fn track_reuse(
        pool: &PgPool,
        id: DbId,
        channel_id: Option<&str>,
    ) -> Result<Option<CatalogAsset>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE asset_index \
             SET reuse_count = reuse_count + 1, \
                 last_used_at = GREATEST(last_used_at, NOW()), \
                 last_used_in_channel = COALESCE($2, last_used_in_channel) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let asset = sqlx::query_as::<_, CatalogAsset>(&query)
            .bind(id)
            .bind(channel_id)
            .fetch_optional(&mut *tx)
            .await?;

        if asset.is_some() {
            sqlx::query("INSERT INTO asset_usages (asset_id, channel_id) VALUES ($1, $2)")
                .bind(id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(asset)
    }

    /// Index every completed scene asset not yet in the catalog.
    ///
    /// Idempotent: URLs already present are skipped by the unique
    /// constraint.
    pub async fn catalog_existing(pool: &PgPool) -> Result<CatalogSummary, sqlx::Error> {
        let mut summary = CatalogSummary::default();

        for kind in MediaKind::ALL {
            let cols = kind_columns(kind);
            let query = format!(
                "SELECT s.id AS scene_id, s.project_id, s.{url} AS url, \
                        s.{desc} AS description, s.duration_seconds \
                 FROM scenes s \
                 WHERE s.{status} = $1 AND s.{url} IS NOT NULL \
                   AND NOT EXISTS (SELECT 1 FROM asset_index a WHERE a.url = s.{url}) \
                 ORDER BY s.id ASC",
                url = cols.url,
                desc = cols.description,
                status = cols.status,
            );
            let candidates = sqlx::query_as::<_, SceneAssetCandidate>(&query)
                .bind(AssetStatus::Completed.id())
                .fetch_all(pool)
                .await?;

            let asset_type = AssetType::from(kind);
            for candidate in candidates {
                let description = candidate.description.unwrap_or_default();
                let categorization = categorize(&description);
                let input = NewCatalogAsset {
                    asset_type,
                    url: candidate.url,
                    description,
                    tags: categorization.tags,
                    category: Some(categorization.category),
                    duration_seconds: candidate.duration_seconds,
                    source_scene_id: Some(candidate.scene_id),
                    source_project_id: Some(candidate.project_id),
                };
                if Self::register(pool, &input).await?.is_some() {
                    summary.record(asset_type);
                }
            }
        }

        Ok(summary)
    }

    /// Page through the catalog, newest first.
    pub async fn list(pool: &PgPool, params: &AssetListQuery) -> Result<AssetPage, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let asset_type = params
            .asset_type
            .as_deref()
            .and_then(AssetType::parse)
            .map(AssetType::as_str);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if asset_type.is_some() {
            conditions.push(format!("asset_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.category.is_some() {
            conditions.push(format!("category = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM asset_index {where_clause}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(t) = asset_type {
            count = count.bind(t);
        }
        if let Some(c) = &params.category {
            count = count.bind(c);
        }
        let total = count.fetch_one(pool).await?;

        let query = format!(
            "SELECT {COLUMNS} FROM asset_index \
             {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );
        let mut q = sqlx::query_as::<_, CatalogAsset>(&query);
        if let Some(t) = asset_type {
            q = q.bind(t);
        }
        if let Some(c) = &params.category {
            q = q.bind(c);
        }
        let assets = q.bind(limit).bind(offset).fetch_all(pool).await?;

        Ok(AssetPage { assets, total })
    }

    /// Entry and reuse counts per asset type.
    pub async fn usage_by_type(pool: &PgPool) -> Result<Vec<TypeUsage>, sqlx::Error> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT asset_type, COUNT(*)::BIGINT, COALESCE(SUM(reuse_count), 0)::BIGINT \
             FROM asset_index \
             GROUP BY asset_type",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(asset_type, assets, reuses)| {
                AssetType::parse(&asset_type).map(|asset_type| TypeUsage {
                    asset_type,
                    assets,
                    reuses,
                })
            })
            .collect())
    }
}
