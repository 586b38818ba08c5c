//! Per-scene, per-kind generation state machine.
//!
//! Each scene tracks four independent asset kinds. A kind moves
//! `draft -> pending -> queued -> processing -> {completed | failed | error}`
//! (`loading` stands in for `processing`). Transitions are driven by
//! workflow commands and worker reports; this module decides whether a
//! report is acceptable and what it turns into, and derives the aggregate
//! scene and project status. Persistence lives in `storyforge_db`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{AssetStatus, ProjectStatus};

/// Default number of attempts a kind gets before it is marked failed.
pub const DEFAULT_MAX_TASK_ATTEMPTS: i16 = 2;

/// Worker error fragments that will not go away on retry.
const FATAL_ERROR_MARKERS: &[&str] = &[
    "api key missing",
    "rate limit exceeded",
    "quota hit",
    "model refusal",
];

/// Error message stored on a scene when a worker gives no reason.
const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";

// ---------------------------------------------------------------------------
// Kinds and media types
// ---------------------------------------------------------------------------

/// One of the four asset kinds tracked per scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Sfx,
}

impl MediaKind {
    /// All kinds, in dispatch order.
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Image,
        MediaKind::Audio,
        MediaKind::Video,
        MediaKind::Sfx,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Sfx => "sfx",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            "sfx" => Some(MediaKind::Sfx),
            _ => None,
        }
    }

    /// Primary kinds only accept completions while the project is generating.
    pub fn is_primary(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }

    /// Strict kinds reject reports unless the kind is in flight. Sound
    /// effects are relaxed: out-of-order reports are applied with a warning.
    pub fn is_strict(self) -> bool {
        !matches!(self, MediaKind::Sfx)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which primary asset is authoritative for a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    /// Unknown values fall back to `image`, the default scene type.
    pub fn parse_or_default(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("video") {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }

    /// Kinds that must all be completed before the scene counts as done.
    pub fn required_kinds(self) -> &'static [MediaKind] {
        match self {
            MediaType::Image => &[MediaKind::Image, MediaKind::Audio],
            MediaType::Video => &[MediaKind::Video, MediaKind::Audio],
        }
    }

    /// The visual kind whose URL represents the scene.
    pub fn primary_kind(self) -> MediaKind {
        match self {
            MediaType::Image => MediaKind::Image,
            MediaType::Video => MediaKind::Video,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind state
// ---------------------------------------------------------------------------

/// Stored state of one kind on one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindState {
    pub status: AssetStatus,
    pub url: Option<String>,
    pub attempts: i16,
}

impl KindState {
    pub fn new(status: AssetStatus) -> Self {
        Self {
            status,
            url: None,
            attempts: 0,
        }
    }
}

/// The four kind states of a scene, addressed by [`MediaKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneKinds {
    pub image: KindState,
    pub audio: KindState,
    pub video: KindState,
    pub sfx: KindState,
}

impl SceneKinds {
    pub fn get(&self, kind: MediaKind) -> &KindState {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
            MediaKind::Sfx => &self.sfx,
        }
    }

    pub fn get_mut(&mut self, kind: MediaKind) -> &mut KindState {
        match kind {
            MediaKind::Image => &mut self.image,
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
            MediaKind::Sfx => &mut self.sfx,
        }
    }

    pub fn status(&self, kind: MediaKind) -> AssetStatus {
        self.get(kind).status
    }

    /// Apply an update in memory (mirrors what the repository persists).
    pub fn apply(&mut self, update: &KindUpdate) {
        let state = self.get_mut(update.kind());
        state.status = update.status();
        state.url = update.url().map(str::to_string);
        if let Some(attempts) = update.attempts() {
            state.attempts = attempts;
        }
    }
}

/// A single write of one kind's status.
///
/// The only way to change a kind's status. Construction guarantees the URL
/// is present exactly when the status is `completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindUpdate {
    kind: MediaKind,
    status: AssetStatus,
    url: Option<String>,
    attempts: Option<i16>,
}

impl KindUpdate {
    /// Mark a kind completed with its output URL.
    pub fn completed(kind: MediaKind, url: impl Into<String>) -> Result<Self, CoreError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "A completed {kind} report must include an output URL"
            )));
        }
        Ok(Self {
            kind,
            status: AssetStatus::Completed,
            url: Some(url),
            attempts: None,
        })
    }

    /// Move a kind to any non-completed status, clearing its URL.
    pub fn transition(kind: MediaKind, status: AssetStatus) -> Result<Self, CoreError> {
        if status == AssetStatus::Completed {
            return Err(CoreError::Validation(format!(
                "Cannot mark {kind} completed without an output URL"
            )));
        }
        Ok(Self {
            kind,
            status,
            url: None,
            attempts: None,
        })
    }

    /// Reset a kind for a fresh generation run (attempt counter cleared).
    pub fn reset(kind: MediaKind, status: AssetStatus) -> Result<Self, CoreError> {
        Ok(Self::transition(kind, status)?.with_attempts(0))
    }

    pub fn with_attempts(mut self, attempts: i16) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn status(&self) -> AssetStatus {
        self.status
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// `None` leaves the stored attempt counter unchanged.
    pub fn attempts(&self) -> Option<i16> {
        self.attempts
    }
}

// ---------------------------------------------------------------------------
// Worker reports
// ---------------------------------------------------------------------------

/// A completion or failure report sent by a worker.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub kind: MediaKind,
    pub status: AssetStatus,
    pub output_url: Option<String>,
    pub error: Option<String>,
}

/// What accepting a report means for the stored scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDecision {
    pub update: KindUpdate,
    /// Message to store on the scene; `None` leaves it untouched.
    pub error_message: Option<String>,
    /// Set when a relaxed kind was reported out of order.
    pub warning: Option<String>,
    /// The failure was requeued for another attempt.
    pub retried: bool,
}

/// Retry policy for failed kinds.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: i16,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_TASK_ATTEMPTS,
        }
    }
}

/// Failures that will never succeed on retry (credentials, quota, refusals).
pub fn is_fatal_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    FATAL_ERROR_MARKERS.iter().any(|m| lower.contains(m))
}

/// Decide how a worker report changes a scene.
///
/// Rejections leave stored state untouched:
/// - `Validation` when the report itself is malformed;
/// - `InvalidStateTransition` when a primary kind arrives while the project
///   is not generating, or a strict kind is not currently in flight.
pub fn evaluate_report(
    project_status: ProjectStatus,
    current: &KindState,
    report: &WorkerReport,
    policy: RetryPolicy,
) -> Result<ReportDecision, CoreError> {
    let kind = report.kind;

    if !matches!(
        report.status,
        AssetStatus::Completed | AssetStatus::Failed | AssetStatus::Error
    ) {
        return Err(CoreError::Validation(format!(
            "Reported status must be completed, failed, or error (got {})",
            report.status
        )));
    }

    // Reject malformed completions before looking at stored state.
    let completed_update = if report.status == AssetStatus::Completed {
        Some(KindUpdate::completed(
            kind,
            report.output_url.clone().unwrap_or_default(),
        )?)
    } else {
        None
    };

    if kind.is_primary() && project_status != ProjectStatus::Generating {
        return Err(CoreError::InvalidStateTransition(format!(
            "Project is {project_status}; {kind} results are only accepted while generating"
        )));
    }

    let mut warning = None;
    if !current.status.is_in_flight() {
        let message = format!(
            "{kind} is {}, expected processing or loading",
            current.status
        );
        if kind.is_strict() {
            return Err(CoreError::InvalidStateTransition(message));
        }
        warning = Some(message);
    }

    if let Some(update) = completed_update {
        return Ok(ReportDecision {
            update,
            error_message: None,
            warning,
            retried: false,
        });
    }

    let reason = report
        .error
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string();
    let attempts = current.attempts.saturating_add(1);
    let retry = attempts < policy.max_attempts && !is_fatal_error(&reason);

    let decision = if retry {
        ReportDecision {
            update: KindUpdate::transition(kind, AssetStatus::Queued)?.with_attempts(attempts),
            error_message: None,
            warning,
            retried: true,
        }
    } else {
        ReportDecision {
            update: KindUpdate::transition(kind, report.status)?.with_attempts(attempts),
            error_message: Some(reason),
            warning,
            retried: false,
        }
    };
    Ok(decision)
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

/// Derived overall status of a scene. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneStatus {
    Draft,
    InProgress,
    Completed,
    Failed,
}

/// Derive a scene's overall status from its required kinds.
pub fn derive_scene_status(media_type: MediaType, kinds: &SceneKinds) -> SceneStatus {
    let required = media_type.required_kinds();
    let statuses = required.iter().map(|k| kinds.status(*k));

    if statuses.clone().all(|s| s == AssetStatus::Completed) {
        SceneStatus::Completed
    } else if statuses.clone().any(AssetStatus::is_failed) {
        SceneStatus::Failed
    } else if statuses.clone().all(|s| s == AssetStatus::Draft) {
        SceneStatus::Draft
    } else {
        SceneStatus::InProgress
    }
}

/// Re-evaluate the project status after a scene changed.
///
/// Only a generating project moves on its own: to `completed` when every
/// scene is complete, or to `failed` when nothing required is in flight or
/// waiting and at least one required kind failed. Returns `None` when the
/// status should stay as it is.
pub fn derive_project_status<'a, I>(current: ProjectStatus, scenes: I) -> Option<ProjectStatus>
where
    I: IntoIterator<Item = (MediaType, &'a SceneKinds)>,
{
    if current != ProjectStatus::Generating {
        return None;
    }

    let mut any_scene = false;
    let mut all_completed = true;
    let mut any_failed = false;
    let mut any_open = false;

    for (media_type, kinds) in scenes {
        any_scene = true;
        for kind in media_type.required_kinds() {
            let status = kinds.status(*kind);
            all_completed &= status == AssetStatus::Completed;
            any_failed |= status.is_failed();
            any_open |= status.is_in_flight() || status.is_dispatchable();
        }
    }

    if !any_scene {
        None
    } else if all_completed {
        Some(ProjectStatus::Completed)
    } else if any_failed && !any_open {
        Some(ProjectStatus::Failed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn kinds_with(status: AssetStatus) -> SceneKinds {
        SceneKinds {
            image: KindState::new(status),
            audio: KindState::new(status),
            video: KindState::new(status),
            sfx: KindState::new(status),
        }
    }

    fn completion(kind: MediaKind, url: Option<&str>) -> WorkerReport {
        WorkerReport {
            kind,
            status: AssetStatus::Completed,
            output_url: url.map(str::to_string),
            error: None,
        }
    }

    fn failure(kind: MediaKind, error: &str) -> WorkerReport {
        WorkerReport {
            kind,
            status: AssetStatus::Failed,
            output_url: None,
            error: Some(error.to_string()),
        }
    }

    // -- KindUpdate --------------------------------------------------------

    #[test]
    fn completed_update_requires_url() {
        assert_matches!(
            KindUpdate::completed(MediaKind::Image, "  "),
            Err(CoreError::Validation(_))
        );
        let update = KindUpdate::completed(MediaKind::Image, "https://cdn/x.png").unwrap();
        assert_eq!(update.status(), AssetStatus::Completed);
        assert_eq!(update.url(), Some("https://cdn/x.png"));
    }

    #[test]
    fn transition_never_carries_url_and_rejects_completed() {
        let update = KindUpdate::transition(MediaKind::Audio, AssetStatus::Pending).unwrap();
        assert_eq!(update.url(), None);
        assert_matches!(
            KindUpdate::transition(MediaKind::Audio, AssetStatus::Completed),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn apply_keeps_url_invariant() {
        let mut kinds = kinds_with(AssetStatus::Processing);
        kinds.apply(&KindUpdate::completed(MediaKind::Video, "v.mp4").unwrap());
        assert_eq!(kinds.video.url.as_deref(), Some("v.mp4"));

        kinds.apply(&KindUpdate::reset(MediaKind::Video, AssetStatus::Pending).unwrap());
        assert_eq!(kinds.video.status, AssetStatus::Pending);
        assert_eq!(kinds.video.url, None);
        assert_eq!(kinds.video.attempts, 0);
    }

    // -- evaluate_report ---------------------------------------------------

    #[test]
    fn completion_of_processing_kind_is_applied() {
        let current = KindState::new(AssetStatus::Processing);
        let decision = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &completion(MediaKind::Image, Some("img.png")),
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(decision.update.status(), AssetStatus::Completed);
        assert_eq!(decision.update.url(), Some("img.png"));
        assert!(decision.warning.is_none());
    }

    #[test]
    fn loading_counts_as_in_flight() {
        let current = KindState::new(AssetStatus::Loading);
        let decision = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &completion(MediaKind::Audio, Some("a.mp3")),
            RetryPolicy::default(),
        );
        assert!(decision.is_ok());
    }

    #[test]
    fn completion_without_url_is_rejected() {
        let current = KindState::new(AssetStatus::Processing);
        let result = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &completion(MediaKind::Image, None),
            RetryPolicy::default(),
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn stale_report_for_strict_kind_is_rejected() {
        for status in [AssetStatus::Completed, AssetStatus::Pending, AssetStatus::Queued] {
            let current = KindState::new(status);
            let result = evaluate_report(
                ProjectStatus::Generating,
                &current,
                &completion(MediaKind::Audio, Some("a.mp3")),
                RetryPolicy::default(),
            );
            assert_matches!(result, Err(CoreError::InvalidStateTransition(_)));
        }
    }

    #[test]
    fn stale_report_for_sfx_is_applied_with_warning() {
        let current = KindState::new(AssetStatus::Completed);
        let decision = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &completion(MediaKind::Sfx, Some("boom.wav")),
            RetryPolicy::default(),
        )
        .unwrap();
        assert!(decision.warning.is_some());
        assert_eq!(decision.update.url(), Some("boom.wav"));
    }

    #[test]
    fn primary_kind_requires_generating_project() {
        let current = KindState::new(AssetStatus::Processing);
        let result = evaluate_report(
            ProjectStatus::Paused,
            &current,
            &completion(MediaKind::Video, Some("v.mp4")),
            RetryPolicy::default(),
        );
        assert_matches!(result, Err(CoreError::InvalidStateTransition(_)));

        // Audio is not a primary kind.
        let result = evaluate_report(
            ProjectStatus::Paused,
            &current,
            &completion(MediaKind::Audio, Some("a.mp3")),
            RetryPolicy::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn non_terminal_report_status_is_rejected() {
        let current = KindState::new(AssetStatus::Processing);
        let report = WorkerReport {
            kind: MediaKind::Image,
            status: AssetStatus::Queued,
            output_url: None,
            error: None,
        };
        let result = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &report,
            RetryPolicy::default(),
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn first_transient_failure_is_requeued() {
        let current = KindState::new(AssetStatus::Processing);
        let decision = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &failure(MediaKind::Image, "upstream timeout"),
            RetryPolicy::default(),
        )
        .unwrap();
        assert!(decision.retried);
        assert_eq!(decision.update.status(), AssetStatus::Queued);
        assert_eq!(decision.update.attempts(), Some(1));
        assert!(decision.error_message.is_none());
    }

    #[test]
    fn failure_at_attempt_limit_marks_kind_failed() {
        let mut current = KindState::new(AssetStatus::Processing);
        current.attempts = 1;
        let decision = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &failure(MediaKind::Image, "upstream timeout"),
            RetryPolicy::default(),
        )
        .unwrap();
        assert!(!decision.retried);
        assert_eq!(decision.update.status(), AssetStatus::Failed);
        assert_eq!(decision.update.attempts(), Some(2));
        assert_eq!(decision.error_message.as_deref(), Some("upstream timeout"));
    }

    #[test]
    fn fatal_failure_is_not_retried() {
        let current = KindState::new(AssetStatus::Processing);
        let decision = evaluate_report(
            ProjectStatus::Generating,
            &current,
            &failure(MediaKind::Audio, "TTS: Rate limit exceeded"),
            RetryPolicy::default(),
        )
        .unwrap();
        assert!(!decision.retried);
        assert_eq!(decision.update.status(), AssetStatus::Failed);
    }

    #[test]
    fn fatal_markers_are_case_insensitive() {
        assert!(is_fatal_error("API KEY MISSING for provider"));
        assert!(is_fatal_error("model refusal: unsafe prompt"));
        assert!(!is_fatal_error("connection reset"));
    }

    // -- Aggregates --------------------------------------------------------

    #[test]
    fn image_scene_completes_without_video_or_sfx() {
        let mut kinds = kinds_with(AssetStatus::Draft);
        kinds.image = KindState {
            status: AssetStatus::Completed,
            url: Some("i".into()),
            attempts: 0,
        };
        kinds.audio = KindState {
            status: AssetStatus::Completed,
            url: Some("a".into()),
            attempts: 0,
        };
        assert_eq!(derive_scene_status(MediaType::Image, &kinds), SceneStatus::Completed);
        assert_eq!(derive_scene_status(MediaType::Video, &kinds), SceneStatus::InProgress);
    }

    #[test]
    fn scene_status_reports_failure_and_draft() {
        assert_eq!(
            derive_scene_status(MediaType::Image, &kinds_with(AssetStatus::Draft)),
            SceneStatus::Draft
        );
        let mut kinds = kinds_with(AssetStatus::Pending);
        kinds.audio.status = AssetStatus::Error;
        assert_eq!(derive_scene_status(MediaType::Image, &kinds), SceneStatus::Failed);
    }

    #[test]
    fn project_completes_when_all_scenes_complete() {
        let done = kinds_with(AssetStatus::Completed);
        let next = derive_project_status(
            ProjectStatus::Generating,
            [(MediaType::Image, &done), (MediaType::Video, &done)],
        );
        assert_eq!(next, Some(ProjectStatus::Completed));
    }

    #[test]
    fn project_fails_only_once_nothing_is_open() {
        let done = kinds_with(AssetStatus::Completed);
        let mut failed = kinds_with(AssetStatus::Completed);
        failed.image.status = AssetStatus::Failed;
        let mut waiting = kinds_with(AssetStatus::Completed);
        waiting.audio.status = AssetStatus::Queued;

        assert_eq!(
            derive_project_status(
                ProjectStatus::Generating,
                [(MediaType::Image, &failed), (MediaType::Image, &waiting)],
            ),
            None
        );
        assert_eq!(
            derive_project_status(
                ProjectStatus::Generating,
                [(MediaType::Image, &failed), (MediaType::Image, &done)],
            ),
            Some(ProjectStatus::Failed)
        );
    }

    #[test]
    fn project_status_is_left_alone_unless_generating() {
        let done = kinds_with(AssetStatus::Completed);
        assert_eq!(
            derive_project_status(ProjectStatus::Paused, [(MediaType::Image, &done)]),
            None
        );
        assert_eq!(
            derive_project_status(ProjectStatus::Generating, std::iter::empty()),
            None
        );
    }

    #[test]
    fn media_type_parse_defaults_to_image() {
        assert_eq!(MediaType::parse_or_default("VIDEO"), MediaType::Video);
        assert_eq!(MediaType::parse_or_default("slideshow"), MediaType::Image);
        assert_eq!(MediaType::Video.primary_kind(), MediaKind::Video);
    }
}
