use super::*;
use crate::types::{DownloadOptions, Platform, VideoQuality};
use tempfile::NamedTempFile;

mod state;

async fn open_temp_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn new_task(url: &str) -> NewTask {
    NewTask {
        url: url.to_string(),
        platform: Some(Platform::Generic),
        options: DownloadOptions {
            quality: VideoQuality::P720,
            ..DownloadOptions::default()
        },
    }
}
