//! Asset reuse catalog: similarity scoring, ranking, and reuse statistics.
//!
//! Similarity is lexical. A query that contains (or is contained in) an
//! asset description scores 1.0; otherwise the score is the Jaccard index
//! of the query's keyword set against the asset's description words and
//! tags. Candidate loading and recency filtering happen in the database.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scene_state::MediaKind;
use crate::types::Timestamp;

/// Default threshold for `find_compatible_assets`.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.75;

/// Fewer indexed matches than this triggers the scene-table fallback.
pub const HYBRID_FALLBACK_THRESHOLD: usize = 3;

/// Maximum number of matches returned by a search.
pub const MAX_RESULTS: usize = 30;

/// Default window for "recently used by this channel" exclusion.
pub const DEFAULT_RECENCY_DAYS: i64 = 30;

/// Category assigned when no classifier is available.
pub const FALLBACK_CATEGORY: &str = "other";

/// Maximum number of tags derived for a new catalog entry.
const MAX_TAGS: usize = 5;

/// Estimated generation cost per asset, in USD.
const IMAGE_COST_USD: f64 = 0.04;
const AUDIO_COST_USD: f64 = 0.02;
const VIDEO_COST_USD: f64 = 0.15;

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

// ---------------------------------------------------------------------------
// Asset types
// ---------------------------------------------------------------------------

/// Catalog asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Image,
    Video,
    Audio,
    Sfx,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::Image,
        AssetType::Video,
        AssetType::Audio,
        AssetType::Sfx,
    ];

    /// Database representation (`asset_index.asset_type`).
    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Image => "IMAGE",
            AssetType::Video => "VIDEO",
            AssetType::Audio => "AUDIO",
            AssetType::Sfx => "SFX",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IMAGE" => Some(AssetType::Image),
            "VIDEO" => Some(AssetType::Video),
            "AUDIO" => Some(AssetType::Audio),
            "SFX" => Some(AssetType::Sfx),
            _ => None,
        }
    }

    /// The scene kind that produces assets of this type.
    pub fn media_kind(self) -> MediaKind {
        match self {
            AssetType::Image => MediaKind::Image,
            AssetType::Video => MediaKind::Video,
            AssetType::Audio => MediaKind::Audio,
            AssetType::Sfx => MediaKind::Sfx,
        }
    }

    fn unit_cost_usd(self) -> f64 {
        match self {
            AssetType::Image => IMAGE_COST_USD,
            AssetType::Video => VIDEO_COST_USD,
            AssetType::Audio | AssetType::Sfx => AUDIO_COST_USD,
        }
    }
}

impl From<MediaKind> for AssetType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => AssetType::Image,
            MediaKind::Video => AssetType::Video,
            MediaKind::Audio => AssetType::Audio,
            MediaKind::Sfx => AssetType::Sfx,
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Lowercased words of at least two characters, punctuation stripped.
pub fn keywords(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    NON_WORD_RE
        .replace_all(&lower, "")
        .split_whitespace()
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Score how well `description` (plus `tags`) matches `query`, in `[0, 1]`.
pub fn similarity(query: &str, description: &str, tags: &[String]) -> f64 {
    let q = query.trim().to_lowercase();
    let d = description.trim().to_lowercase();
    if q.is_empty() || d.is_empty() {
        return 0.0;
    }
    if d.contains(&q) || q.contains(&d) {
        return 1.0;
    }

    let query_words = keywords(&q);
    let mut asset_words = keywords(&d);
    asset_words.extend(tags.iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()));

    let union = query_words.union(&asset_words).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = query_words.intersection(&asset_words).count();
    intersection as f64 / union as f64
}

/// Reject thresholds outside `[0, 1]`.
pub fn validate_min_similarity(value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "min_similarity must be between 0 and 1 (got {value})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// A candidate with its score and tie-break fields.
#[derive(Debug, Clone, Serialize)]
pub struct Scored<T> {
    #[serde(flatten)]
    pub item: T,
    pub similarity: f64,
    #[serde(skip)]
    pub reuse_count: i32,
    #[serde(skip)]
    pub last_used_at: Option<Timestamp>,
}

/// Drop candidates below `min_similarity` and order the rest.
///
/// Order: similarity descending, then `reuse_count` descending, then
/// `last_used_at` descending (never-used last). At most [`MAX_RESULTS`]
/// entries are kept.
pub fn rank<T>(candidates: Vec<Scored<T>>, min_similarity: f64) -> Vec<Scored<T>> {
    let mut kept: Vec<Scored<T>> = candidates
        .into_iter()
        .filter(|c| c.similarity >= min_similarity)
        .collect();
    kept.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| b.reuse_count.cmp(&a.reuse_count))
            .then_with(|| b.last_used_at.cmp(&a.last_used_at))
    });
    kept.truncate(MAX_RESULTS);
    kept
}

/// Whether the scene-table fallback should run for this many indexed hits.
pub fn needs_hybrid_fallback(indexed_matches: usize) -> bool {
    indexed_matches < HYBRID_FALLBACK_THRESHOLD
}

// ---------------------------------------------------------------------------
// Categorisation
// ---------------------------------------------------------------------------

/// Category and tags for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Categorization {
    pub category: String,
    pub tags: Vec<String>,
}

/// Keyword categorisation: the first five words longer than three
/// characters become tags, and the category is [`FALLBACK_CATEGORY`].
pub fn categorize(description: &str) -> Categorization {
    let lower = description.to_lowercase();
    let cleaned = NON_WORD_RE.replace_all(&lower, "");
    let mut tags: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace().filter(|w| w.chars().count() > 3) {
        if !tags.iter().any(|t| t == word) {
            tags.push(word.to_string());
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    Categorization {
        category: FALLBACK_CATEGORY.to_string(),
        tags,
    }
}

// ---------------------------------------------------------------------------
// Reuse statistics
// ---------------------------------------------------------------------------

/// Catalog totals for one asset type, as counted by the database.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeUsage {
    pub asset_type: AssetType,
    pub assets: i64,
    pub reuses: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeStats {
    pub asset_type: AssetType,
    pub assets: i64,
    pub reuses: i64,
}

/// Aggregate reuse statistics for the whole catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReuseStats {
    pub total_assets: i64,
    pub total_reuses: i64,
    /// Share of asset uses served by reuse instead of generation.
    pub reuse_rate: f64,
    pub estimated_savings_usd: f64,
    pub by_type: Vec<TypeStats>,
}

/// Summarise per-type usage. Every asset counts as one generation; each
/// reuse is a generation avoided.
pub fn reuse_stats(usage: &[TypeUsage]) -> ReuseStats {
    let total_assets: i64 = usage.iter().map(|u| u.assets).sum();
    let total_reuses: i64 = usage.iter().map(|u| u.reuses).sum();
    let total_uses = total_assets + total_reuses;
    let reuse_rate = if total_uses > 0 {
        total_reuses as f64 / total_uses as f64
    } else {
        0.0
    };
    let estimated_savings_usd = usage
        .iter()
        .map(|u| u.reuses as f64 * u.asset_type.unit_cost_usd())
        .sum::<f64>();

    let by_type = AssetType::ALL
        .into_iter()
        .map(|asset_type| {
            let found = usage.iter().find(|u| u.asset_type == asset_type);
            TypeStats {
                asset_type,
                assets: found.map_or(0, |u| u.assets),
                reuses: found.map_or(0, |u| u.reuses),
            }
        })
        .collect();

    ReuseStats {
        total_assets,
        total_reuses,
        reuse_rate,
        estimated_savings_usd: (estimated_savings_usd * 100.0).round() / 100.0,
        by_type,
    }
}
