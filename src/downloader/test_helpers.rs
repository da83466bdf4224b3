//! Shared test helpers: a scripted extractor and engine construction.

use crate::config::Config;
use crate::db::Database;
use crate::downloader::MediaDownloader;
use crate::error::{FetchError, Result};
use crate::extractor::{
    Extractor, ExtractorRegistry, FetchOutcome, FetchRequest, ProgressSample, ProgressSink,
};
use crate::hub::NotificationHub;
use crate::types::{MediaFormat, MediaInfo, MediaMetadata, Platform, Status, TaskId, TaskRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Host accepted by [`MockExtractor`]
pub(crate) const MOCK_HOST: &str = "mock.test";

/// URL for a scripted fetch, e.g. `mock_url("ok/a")`
pub(crate) fn mock_url(path: &str) -> String {
    format!("https://{MOCK_HOST}/{path}")
}

/// Extractor whose behaviour is chosen by the first URL path segment
///
/// - `ok/<name>`: two samples, writes `<name>.bin`, succeeds
/// - `fail/<name>`: fails immediately
/// - `gate/<name>`: writes a partial `<name>.part`, then waits for a gate permit (success)
///   or cancellation
/// - `stubborn/<name>`: reports one sample and ignores cancellation
/// - `late/<name>`: writes a partial `<name>.bin`, then ignores cancellation and succeeds
///   shortly after it
/// - `silent/<name>`: reports nothing until cancelled
/// - `panic/<name>`: panics
///
/// Describing a URL yields three formats (360p, 720p and audio) except in `fail/` mode.
pub(crate) struct MockExtractor {
    /// URLs fetched, in call order
    pub(crate) calls: std::sync::Mutex<Vec<String>>,
    pub(crate) running: AtomicUsize,
    pub(crate) max_running: AtomicUsize,
    /// Each permit lets one `gate/` fetch finish
    pub(crate) gate: Semaphore,
}

impl MockExtractor {
    pub(crate) fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        }
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Let `n` gated fetches complete
    pub(crate) fn open_gate(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn platform(&self) -> Platform {
        Platform::Generic
    }

    fn can_handle(&self, url: &Url) -> bool {
        url.host_str() == Some(MOCK_HOST)
    }

    async fn execute_fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome> {
        self.calls.lock().unwrap().push(request.url.to_string());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        let mut segments = request
            .url
            .path_segments()
            .map(|s| s.map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        let name = segments.pop().unwrap_or_else(|| "file".to_string());
        let mode = segments.first().cloned().unwrap_or_default();

        tokio::fs::create_dir_all(&request.output_dir).await?;

        match mode.as_str() {
            "ok" => {
                let path = request.output_dir.join(format!("{name}.bin"));
                sink.destination(path.clone()).await;
                sink.progress(sample(50, 100)).await;
                tokio::fs::write(&path, vec![0u8; 100]).await?;
                sink.progress(sample(100, 100)).await;
                Ok(FetchOutcome {
                    output_path: path,
                    metadata: MediaMetadata {
                        title: Some(name),
                        duration: Some(12),
                        thumbnail_url: None,
                    },
                })
            }
            "fail" => Err(FetchError::Failed("mock failure".to_string()).into()),
            "gate" => {
                let path = request.output_dir.join(format!("{name}.part"));
                sink.destination(path.clone()).await;
                tokio::fs::write(&path, vec![0u8; 10]).await?;
                sink.progress(sample(10, 100)).await;

                tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled.into()),
                    permit = self.gate.acquire() => {
                        if let Ok(permit) = permit {
                            permit.forget();
                        }
                        sink.progress(sample(100, 100)).await;
                        Ok(FetchOutcome {
                            output_path: path,
                            metadata: MediaMetadata::default(),
                        })
                    }
                }
            }
            "stubborn" => {
                sink.progress(sample(1, 100)).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(FetchError::Failed("stubborn fetch gave up".to_string()).into())
            }
            "late" => {
                let path = request.output_dir.join(format!("{name}.bin"));
                sink.destination(path.clone()).await;
                tokio::fs::write(&path, vec![0u8; 10]).await?;
                sink.progress(sample(10, 100)).await;

                cancel.cancelled().await;
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(FetchOutcome {
                    output_path: path,
                    metadata: MediaMetadata::default(),
                })
            }
            "silent" => {
                cancel.cancelled().await;
                Err(FetchError::Cancelled.into())
            }
            "panic" => panic!("mock extractor panic"),
            other => Err(FetchError::Failed(format!("unknown mock mode: {other}")).into()),
        }
    }

    async fn extract_info(&self, url: &Url) -> Result<MediaInfo> {
        if url.path().starts_with("/fail/") {
            return Err(FetchError::Failed("mock failure".to_string()).into());
        }
        let video = |id: &str, height| MediaFormat {
            format_id: id.to_string(),
            ext: Some("mp4".to_string()),
            height: Some(height),
            vcodec: Some("avc1".to_string()),
            acodec: Some("mp4a".to_string()),
            ..MediaFormat::default()
        };
        Ok(MediaInfo {
            url: url.to_string(),
            platform: Platform::Generic,
            title: url.path_segments().and_then(|s| s.last()).map(str::to_string),
            description: None,
            uploader: Some("mock".to_string()),
            duration: Some(12),
            thumbnail_url: None,
            is_live: false,
            formats: vec![
                video("18", 360),
                video("22", 720),
                MediaFormat {
                    format_id: "140".to_string(),
                    ext: Some("m4a".to_string()),
                    vcodec: Some("none".to_string()),
                    acodec: Some("mp4a".to_string()),
                    ..MediaFormat::default()
                },
            ],
        })
    }
}

fn sample(done: u64, total: u64) -> ProgressSample {
    ProgressSample {
        bytes_done: done,
        bytes_total: Some(total),
        rate: Some(1000.0),
        eta: Some(0),
    }
}

/// Fast timings and a temp database/output dir
pub(crate) fn test_config(temp_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.join("test.db");
    config.download.output_dir = temp_dir.join("downloads");
    config.download.max_concurrent_downloads = 2;
    config.scheduler.tick_interval = Duration::from_millis(20);
    config.scheduler.error_backoff = Duration::from_millis(50);
    config.scheduler.cancel_timeout = Duration::from_millis(500);
    config.scheduler.stop_timeout = Duration::from_secs(2);
    config.extractor.search_path = false;
    config
}

/// Engine backed by a [`MockExtractor`], with a customised config
///
/// Returns the engine, the tempdir (which must be kept alive) and the extractor.
pub(crate) async fn create_test_downloader_with(
    configure: impl FnOnce(&mut Config),
) -> (MediaDownloader, tempfile::TempDir, Arc<MockExtractor>) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();
    let mock = Arc::new(MockExtractor::new());
    let registry = ExtractorRegistry::new().with(mock.clone());
    let hub = Arc::new(NotificationHub::new(config.hub.listener_buffer));

    let downloader = MediaDownloader::with_services(config, Arc::new(db), registry, hub).unwrap();
    (downloader, temp_dir, mock)
}

/// Engine with the default test config
pub(crate) async fn create_test_downloader() -> (MediaDownloader, tempfile::TempDir) {
    let (downloader, temp_dir, _mock) = create_test_downloader_with(|_| {}).await;
    (downloader, temp_dir)
}

/// Poll until the task reaches `status` (panics after 5 seconds)
pub(crate) async fn wait_for_status(
    downloader: &MediaDownloader,
    id: TaskId,
    status: Status,
) -> TaskRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = downloader.get(id).await.unwrap();
        if record.status == status {
            return record;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "task {id} stuck in {} waiting for {status}",
                record.status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until `check` holds (panics after 5 seconds)
pub(crate) async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
