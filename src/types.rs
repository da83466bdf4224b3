//! Core types for media-dl: task identity, lifecycle status, progress and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a download task
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Lifecycle status of a task
///
/// ```text
/// Pending -> Active <-> Paused -> { Completed | Failed | Cancelled }
/// ```
///
/// `Cancelled` is reachable from `Pending`, `Active` and `Paused`. Terminal states have no
/// outgoing edges except the explicit caller-issued retry back to `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the queue
    Pending,
    /// A runner is executing the fetch
    Active,
    /// Suspended by the caller (or by engine shutdown)
    Paused,
    /// Fetch finished successfully
    Completed,
    /// Fetch reported failure
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl Status {
    /// All statuses, in storage order
    pub const ALL: [Status; 6] = [
        Status::Pending,
        Status::Active,
        Status::Paused,
        Status::Completed,
        Status::Failed,
        Status::Cancelled,
    ];

    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Pending,
            1 => Status::Active,
            2 => Status::Paused,
            3 => Status::Completed,
            4 => Status::Failed,
            5 => Status::Cancelled,
            _ => Status::Failed, // corrupted rows surface as failures
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Pending => 0,
            Status::Active => 1,
            Status::Paused => 2,
            Status::Completed => 3,
            Status::Failed => 4,
            Status::Cancelled => 5,
        }
    }

    /// Lowercase name, as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Paused => "paused",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }

    /// Whether the status has no outgoing lifecycle edges
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }

    /// Whether the lifecycle state machine has an edge from `self` to `next`
    ///
    /// `Paused -> Pending` is the non-active resume path (the task goes back to the queue and
    /// is later admitted as `Active`). `Failed/Cancelled -> Pending` is the explicit retry.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Paused)
                | (Pending, Cancelled)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Pending)
                | (Paused, Cancelled)
                | (Failed, Pending)
                | (Cancelled, Pending)
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}

/// Media platform an extractor is registered for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// youtube.com / youtu.be
    Youtube,
    /// vimeo.com
    Vimeo,
    /// soundcloud.com
    Soundcloud,
    /// dailymotion.com / dai.ly
    Dailymotion,
    /// Any other http(s) URL
    Generic,
}

impl Platform {
    /// Lowercase platform name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Vimeo => "vimeo",
            Platform::Soundcloud => "soundcloud",
            Platform::Dailymotion => "dailymotion",
            Platform::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "vimeo" => Ok(Platform::Vimeo),
            "soundcloud" => Ok(Platform::Soundcloud),
            "dailymotion" => Ok(Platform::Dailymotion),
            "generic" => Ok(Platform::Generic),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Requested video quality
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum VideoQuality {
    /// Best available
    #[default]
    #[serde(rename = "best")]
    Best,
    /// Smallest available
    #[serde(rename = "worst")]
    Worst,
    /// At most 2160 lines
    #[serde(rename = "2160p")]
    P2160,
    /// At most 1440 lines
    #[serde(rename = "1440p")]
    P1440,
    /// At most 1080 lines
    #[serde(rename = "1080p")]
    P1080,
    /// At most 720 lines
    #[serde(rename = "720p")]
    P720,
    /// At most 480 lines
    #[serde(rename = "480p")]
    P480,
    /// At most 360 lines
    #[serde(rename = "360p")]
    P360,
    /// At most 240 lines
    #[serde(rename = "240p")]
    P240,
    /// At most 144 lines
    #[serde(rename = "144p")]
    P144,
    /// Audio stream only
    #[serde(rename = "audio_only")]
    AudioOnly,
}

impl VideoQuality {
    /// Height cap for resolution-bound qualities
    pub fn max_height(&self) -> Option<u32> {
        match self {
            VideoQuality::P2160 => Some(2160),
            VideoQuality::P1440 => Some(1440),
            VideoQuality::P1080 => Some(1080),
            VideoQuality::P720 => Some(720),
            VideoQuality::P480 => Some(480),
            VideoQuality::P360 => Some(360),
            VideoQuality::P240 => Some(240),
            VideoQuality::P144 => Some(144),
            VideoQuality::Best | VideoQuality::Worst | VideoQuality::AudioOnly => None,
        }
    }

    /// yt-dlp format selector for this quality
    pub fn format_selector(&self) -> String {
        match self {
            VideoQuality::Best => "best".to_string(),
            VideoQuality::Worst => "worst".to_string(),
            VideoQuality::AudioOnly => "bestaudio".to_string(),
            other => match other.max_height() {
                Some(height) => format!("best[height<={height}]"),
                None => "best".to_string(),
            },
        }
    }
}

/// Caller-supplied preferences, fixed at creation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DownloadOptions {
    /// Quality preference (default: best)
    #[serde(default)]
    pub quality: VideoQuality,

    /// Output container or audio codec (e.g. "mp4", "mp3")
    #[serde(default)]
    pub format: Option<String>,

    /// Output directory (default: configured download directory)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Custom filename template (yt-dlp syntax, e.g. "%(title)s.%(ext)s")
    #[serde(default)]
    pub filename_template: Option<String>,

    /// Keep the audio track only
    #[serde(default)]
    pub extract_audio: bool,

    /// Fetch subtitles when available
    #[serde(default)]
    pub download_subtitles: bool,
}

/// Progress of a task
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Progress {
    /// Bytes fetched so far
    pub bytes_done: u64,
    /// Total size when known
    pub bytes_total: Option<u64>,
    /// Percentage complete, 0.0 to 100.0
    pub percentage: f64,
    /// Transfer rate in bytes per second
    pub rate: Option<f64>,
    /// Estimated seconds remaining
    pub eta: Option<u64>,
}

/// Descriptive metadata resolved by the fetch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaMetadata {
    /// Media title
    pub title: Option<String>,
    /// Duration in seconds
    pub duration: Option<u64>,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
}

/// One downloadable rendition of a media resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaFormat {
    /// Backend format identifier, e.g. `137` or `direct`
    pub format_id: String,
    /// Container extension
    pub ext: Option<String>,
    /// Frame height in pixels
    pub height: Option<u32>,
    /// Resolution label, e.g. `1920x1080` or `audio only`
    pub resolution: Option<String>,
    /// Frames per second
    pub fps: Option<f64>,
    /// Video codec (`none` for audio-only streams)
    pub vcodec: Option<String>,
    /// Audio codec (`none` for video-only streams)
    pub acodec: Option<String>,
    /// Size in bytes, exact or estimated
    pub filesize: Option<u64>,
    /// Total bitrate in kbit/s
    pub tbr: Option<f64>,
}

impl MediaFormat {
    /// Whether the stream carries no video
    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
    }

    /// Whether this format is eligible under `quality`
    ///
    /// Height-capped qualities keep formats at or below the cap and formats of unknown
    /// height; `audio_only` keeps audio streams; `best` and `worst` keep everything.
    pub fn fits(&self, quality: VideoQuality) -> bool {
        if quality == VideoQuality::AudioOnly {
            return self.is_audio_only();
        }
        match (quality.max_height(), self.height) {
            (Some(cap), Some(height)) => height <= cap,
            _ => true,
        }
    }
}

/// Description of a resource resolved without downloading it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// Normalised URL that was described
    pub url: String,
    /// Platform of the extractor that described it
    pub platform: Platform,
    /// Media title
    pub title: Option<String>,
    /// Description text
    pub description: Option<String>,
    /// Uploader or channel name
    pub uploader: Option<String>,
    /// Duration in seconds
    pub duration: Option<u64>,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Whether the resource is a live stream
    pub is_live: bool,
    /// Available renditions
    pub formats: Vec<MediaFormat>,
}

/// A download task as seen by callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskRecord {
    /// Unique task identifier
    pub id: TaskId,
    /// Resource locator the task was created for
    pub url: String,
    /// Platform of the extractor that accepted the URL
    pub platform: Option<Platform>,
    /// Current lifecycle status
    pub status: Status,
    /// Current progress
    pub progress: Progress,
    /// Caller preferences
    pub options: DownloadOptions,
    /// Concrete destination once the fetch resolved one
    pub output_path: Option<PathBuf>,
    /// Resolved metadata
    #[serde(flatten)]
    pub metadata: MediaMetadata,
    /// Failure reason, set only when `status` is `failed`
    pub error: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task was first admitted
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

/// Event published through the notification hub
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress sample applied to a task
    Progress {
        /// Task ID
        task_id: TaskId,
        /// Progress after the sample was applied
        progress: Progress,
    },

    /// Task changed status
    Status {
        /// Task ID
        task_id: TaskId,
        /// New status
        status: Status,
        /// Failure reason for `failed`
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Event {
    /// Task the event refers to
    pub fn task_id(&self) -> TaskId {
        match self {
            Event::Progress { task_id, .. } | Event::Status { task_id, .. } => *task_id,
        }
    }

    /// Event type name (`progress` or `status`)
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Progress { .. } => "progress",
            Event::Status { .. } => "status",
        }
    }
}

/// Aggregate counts across all known tasks
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusSnapshot {
    /// Tasks currently executing
    pub active: u64,
    /// Tasks waiting (pending or paused)
    pub queued: u64,
    /// Completed tasks
    pub completed: u64,
    /// Failed tasks
    pub failed: u64,
    /// Cancelled tasks
    pub cancelled: u64,
    /// All tasks
    pub total: u64,
}

/// One page of a task listing
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskPage {
    /// Tasks on this page, newest first
    pub tasks: Vec<TaskRecord>,
    /// Number of tasks matching the filter
    pub total: u64,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
    /// Whether a later page exists
    pub has_next: bool,
    /// Whether an earlier page exists
    pub has_prev: bool,
}

/// Result of checking whether a URL can be downloaded
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UrlValidation {
    /// The URL that was checked
    pub url: String,
    /// Whether an extractor accepts it
    pub is_valid: bool,
    /// Platform of the accepting extractor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Why the URL was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
