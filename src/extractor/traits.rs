//! Extractor trait and the fetch contract shared by all backends

use crate::error::{FetchError, Result};
use crate::types::{DownloadOptions, MediaInfo, MediaMetadata, Platform, TaskId};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a backend needs to fetch one task
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Task being fetched (for logging)
    pub task_id: TaskId,
    /// Parsed resource locator
    pub url: Url,
    /// Caller preferences
    pub options: DownloadOptions,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
}

/// Terminal success of a fetch
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchOutcome {
    /// Final artifact location
    pub output_path: PathBuf,
    /// Metadata resolved during the fetch
    pub metadata: MediaMetadata,
}

/// One progress observation reported by a backend
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressSample {
    /// Bytes fetched so far in this attempt
    pub bytes_done: u64,
    /// Total size when known
    pub bytes_total: Option<u64>,
    /// Transfer rate in bytes per second
    pub rate: Option<f64>,
    /// Estimated seconds remaining
    pub eta: Option<u64>,
}

/// Message flowing from a backend to the task runner
#[derive(Clone, Debug, PartialEq)]
pub enum FetchSignal {
    /// Progress observation
    Progress(ProgressSample),
    /// The backend resolved where the artifact will be written
    Destination(PathBuf),
}

/// Channel a backend reports progress through
///
/// Sends wait when the runner is behind. Once the runner stops listening, reports are
/// discarded silently.
#[derive(Clone, Debug)]
pub struct ProgressSink {
    tx: mpsc::Sender<FetchSignal>,
}

impl ProgressSink {
    /// Create a sink and the receiver the runner drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FetchSignal>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Report a progress sample
    pub async fn progress(&self, sample: ProgressSample) {
        self.tx.send(FetchSignal::Progress(sample)).await.ok();
    }

    /// Announce the artifact location before writing to it
    pub async fn destination(&self, path: PathBuf) {
        self.tx.send(FetchSignal::Destination(path)).await.ok();
    }
}

/// A fetch capability for a family of URLs
///
/// Implementations must honour `cancel` promptly and must not report progress after
/// returning.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &'static str;

    /// Platform this extractor serves
    fn platform(&self) -> Platform;

    /// Whether this extractor accepts `url`
    fn can_handle(&self, url: &Url) -> bool;

    /// Fetch the resource, reporting progress through `sink`
    async fn execute_fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome>;

    /// Describe the resource and its available formats without downloading it
    async fn extract_info(&self, url: &Url) -> Result<MediaInfo> {
        Err(FetchError::Failed(format!(
            "{} extractor cannot describe {url}",
            self.name()
        ))
        .into())
    }
}
