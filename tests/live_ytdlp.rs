//! Live downloads through yt-dlp against real sites
//!
//! Needs network access and a `yt-dlp` binary on `PATH`. The URL can be overridden with
//! `MEDIA_DL_LIVE_URL` (also read from a `.env` file).
//!
//! ```bash
//! cargo test --features live-tests --test live_ytdlp -- --nocapture
//! ```

#![cfg(feature = "live-tests")]

mod common;

use common::test_config;
use media_dl::{DownloadOptions, MediaDownloader, Status, VideoQuality};
use serial_test::serial;
use std::time::Duration;

/// Short, stable public video
const DEFAULT_URL: &str = "https://www.youtube.com/watch?v=jNQXAC9IVRw";

fn live_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("MEDIA_DL_LIVE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string())
}

async fn live_engine(temp_dir: &tempfile::TempDir) -> Option<MediaDownloader> {
    let mut config = test_config(temp_dir.path());
    config.extractor.search_path = true;
    config.download.fetch_timeout = Duration::from_secs(120);

    let downloader = MediaDownloader::new(config).await.unwrap();
    if which::which("yt-dlp").is_err() {
        eprintln!("yt-dlp not found on PATH, skipping");
        return None;
    }
    Some(downloader)
}

async fn wait_for_terminal(downloader: &MediaDownloader, id: media_dl::TaskId) -> Status {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(300);
    loop {
        let status = downloader.get(id).await.unwrap().status;
        if status.is_terminal() || tokio::time::Instant::now() > deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[tokio::test]
#[serial]
async fn downloads_a_short_video() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(downloader) = live_engine(&temp_dir).await else {
        return;
    };
    downloader.start().await.unwrap();

    let url = live_url();
    let validation = downloader.validate(&url);
    assert!(validation.is_valid, "{validation:?}");

    let id = downloader
        .create(
            &url,
            DownloadOptions {
                quality: VideoQuality::P360,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let status = wait_for_terminal(&downloader, id).await;
    let record = downloader.get(id).await.unwrap();
    assert_eq!(status, Status::Completed, "error: {:?}", record.error);
    assert!(record.metadata.title.is_some());
    assert!(record.output_path.unwrap().exists());

    downloader.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn cancelling_a_live_download_kills_yt_dlp() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(downloader) = live_engine(&temp_dir).await else {
        return;
    };
    downloader.start().await.unwrap();

    let id = downloader
        .create(&live_url(), DownloadOptions::default())
        .await
        .unwrap();
    while downloader.get(id).await.unwrap().status == Status::Pending {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // A short video may finish before the cancel lands
    let cancelled = downloader.cancel(id).await.is_ok();
    let record = downloader.get(id).await.unwrap();
    if cancelled {
        assert_eq!(record.status, Status::Cancelled);
        assert!(record.output_path.is_none());
    } else {
        assert_eq!(record.status, Status::Completed);
    }

    downloader.stop().await.unwrap();
}
