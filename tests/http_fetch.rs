//! Direct media downloads through the default extractor registry against a mock HTTP server.

mod common;

use common::{test_config, wait_for_status};
use media_dl::{DownloadOptions, MediaDownloader, Platform, Status};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn engine(temp_dir: &tempfile::TempDir) -> MediaDownloader {
    let mut config = test_config(temp_dir.path());
    config.extractor.retry.max_attempts = 1;
    MediaDownloader::new(config).await.unwrap()
}

#[tokio::test]
async fn direct_media_file_is_downloaded() {
    let server = MockServer::start().await;
    let body = vec![7u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/media/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let downloader = engine(&temp_dir).await;
    downloader.start().await.unwrap();

    let id = downloader
        .create(
            &format!("{}/media/clip.mp4", server.uri()),
            DownloadOptions::default(),
        )
        .await
        .unwrap();
    let record = wait_for_status(&downloader, id, Status::Completed).await;

    assert_eq!(record.platform, Some(Platform::Generic));
    assert_eq!(record.metadata.title.as_deref(), Some("clip"));
    assert_eq!(record.progress.bytes_done, body.len() as u64);
    assert_eq!(record.progress.percentage, 100.0);

    let output = record.output_path.unwrap();
    assert!(output.starts_with(temp_dir.path().join("downloads")));
    assert_eq!(tokio::fs::read(&output).await.unwrap(), body);

    downloader.stop().await.unwrap();
}

#[tokio::test]
async fn http_error_fails_the_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let downloader = engine(&temp_dir).await;
    downloader.start().await.unwrap();

    let id = downloader
        .create(
            &format!("{}/media/missing.mp4", server.uri()),
            DownloadOptions::default(),
        )
        .await
        .unwrap();
    let record = wait_for_status(&downloader, id, Status::Failed).await;

    let error = record.error.unwrap_or_default();
    assert!(error.contains("404"), "{error}");
    assert!(record.output_path.is_none());

    downloader.stop().await.unwrap();
}
