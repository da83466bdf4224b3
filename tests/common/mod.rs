//! Common utilities for the media-dl scenario tests
//!
//! Everything here goes through the public API only: a scripted [`Extractor`] and helpers
//! that build engines over a temp directory.

#![allow(dead_code)]

use async_trait::async_trait;
use media_dl::extractor::ProgressSample;
use media_dl::{
    Config, Database, Event, Extractor, ExtractorRegistry, FetchError, FetchOutcome,
    FetchRequest, MediaDownloader, MediaMetadata, NotificationHub, Platform, ProgressSink,
    Status, Subscription, TaskId, TaskRecord,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Host accepted by [`ScriptedExtractor`]
pub const HOST: &str = "scripted.test";

/// URL whose first path segment picks the scripted behaviour
pub fn url(path: &str) -> String {
    format!("https://{HOST}/{path}")
}

/// Extractor driven by the URL path
///
/// - `quick/<name>`: four samples of 25 bytes, succeeds
/// - `held/<name>`: waits for a permit or cancellation, then reports 100 bytes and succeeds;
///   the first attempt for a URL writes 10 bytes and reports them before waiting
/// - `broken/<name>`: fails
pub struct ScriptedExtractor {
    calls: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    permits: Semaphore,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            permits: Semaphore::new(0),
        }
    }

    /// URLs fetched so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of fetches observed running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Let `n` held fetches finish
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn sample(done: u64, total: u64) -> ProgressSample {
    ProgressSample {
        bytes_done: done,
        bytes_total: Some(total),
        rate: Some(2048.0),
        eta: Some(1),
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn platform(&self) -> Platform {
        Platform::Generic
    }

    fn can_handle(&self, url: &Url) -> bool {
        url.host_str() == Some(HOST)
    }

    async fn execute_fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> media_dl::Result<FetchOutcome> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.url.to_string());
            calls.iter().filter(|u| **u == request.url.as_str()).count()
        };
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _running = Running(&self.running);

        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.map(str::to_string).collect())
            .unwrap_or_default();
        let mode = segments.first().cloned().unwrap_or_default();
        let name = segments.last().cloned().unwrap_or_default();

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let path = request.output_dir.join(format!("{name}.media"));

        match mode.as_str() {
            "quick" => {
                sink.destination(path.clone()).await;
                for step in 1..=4u64 {
                    sink.progress(sample(step * 25, 100)).await;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                tokio::fs::write(&path, vec![1u8; 100]).await?;
                Ok(FetchOutcome {
                    output_path: path,
                    metadata: MediaMetadata {
                        title: Some(name),
                        duration: Some(30),
                        thumbnail_url: None,
                    },
                })
            }
            "held" => {
                sink.destination(path.clone()).await;
                if attempt == 1 {
                    tokio::fs::write(&path, vec![1u8; 10]).await?;
                    sink.progress(sample(10, 100)).await;
                }
                tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled.into()),
                    permit = self.permits.acquire() => {
                        if let Ok(permit) = permit {
                            permit.forget();
                        }
                        sink.progress(sample(100, 100)).await;
                        Ok(FetchOutcome { output_path: path, metadata: MediaMetadata::default() })
                    }
                }
            }
            _ => Err(FetchError::Failed(format!("scripted failure for {name}")).into()),
        }
    }
}

/// Fast timings rooted in `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("media.db");
    config.download.output_dir = dir.join("downloads");
    config.download.max_concurrent_downloads = 2;
    config.scheduler.tick_interval = Duration::from_millis(20);
    config.scheduler.error_backoff = Duration::from_millis(50);
    config.scheduler.cancel_timeout = Duration::from_millis(500);
    config.scheduler.stop_timeout = Duration::from_secs(2);
    config.extractor.search_path = false;
    config
}

/// Engine over `config` whose only extractor is `extractor`
pub async fn engine_with(config: Config, extractor: Arc<ScriptedExtractor>) -> MediaDownloader {
    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();
    let hub = Arc::new(NotificationHub::new(config.hub.listener_buffer));
    let registry = ExtractorRegistry::new().with(extractor);
    MediaDownloader::with_services(config, Arc::new(db), registry, hub).unwrap()
}

/// Poll until `id` reaches `status` (panics after 5 seconds)
pub async fn wait_for_status(downloader: &MediaDownloader, id: TaskId, status: Status) -> TaskRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = downloader.get(id).await.unwrap();
        if record.status == status {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} stuck in {} waiting for {status}",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Collect events until `done` returns true for one of them (panics after 5 seconds)
pub async fn collect_until(
    subscription: &mut Subscription,
    mut done: impl FnMut(&Event) -> bool,
) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("timed out waiting for events")
            .expect("hub dropped the listener");
        let finished = done(&event);
        events.push(event);
        if finished {
            return events;
        }
    }
}

/// Whether `event` is a status change of `id` to `status`
pub fn is_status(event: &Event, id: TaskId, status: Status) -> bool {
    matches!(event, Event::Status { task_id, status: s, .. } if *task_id == id && *s == status)
}

/// Poll until `check` holds (panics after 5 seconds)
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
