//! Direct HTTP fetcher for plain media file URLs

use super::traits::{FetchOutcome, FetchRequest, ProgressSample, ProgressSink};
use crate::config::{ExtractorConfig, RetryConfig};
use crate::error::{Error, FetchError, Result};
use crate::retry::fetch_with_retry;
use crate::types::MediaMetadata;
use crate::utils::{filename_from_headers, get_unique_path};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Minimum spacing between progress samples
const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Streams a URL to a file in the output directory
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build the HTTP client from extractor settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    /// Fetch `request.url` into `request.output_dir`
    pub async fn fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome> {
        let url = request.url.clone();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled.into()),
            response = fetch_with_retry(&self.retry, || self.send(&url)) => response?,
        };

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let name = filename_from_headers(response.headers(), url.as_str());
        let path = get_unique_path(&request.output_dir.join(&name))?;
        let bytes_total = response.content_length().filter(|len| *len > 0);

        tracing::debug!(
            task_id = request.task_id.0,
            path = %path.display(),
            bytes_total,
            "streaming response body"
        );

        sink.destination(path.clone()).await;
        let mut file = tokio::fs::File::create(&path).await?;

        let started = Instant::now();
        let mut last_sample: Option<Instant> = None;
        let mut bytes_done: u64 = 0;
        let mut response = response;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    drop(file);
                    return Err(FetchError::Cancelled.into());
                }
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else { break };

            file.write_all(&chunk).await?;
            bytes_done += chunk.len() as u64;

            if last_sample.is_none_or(|t| t.elapsed() >= SAMPLE_INTERVAL) {
                last_sample = Some(Instant::now());
                sink.progress(sample(bytes_done, bytes_total, started)).await;
            }
        }

        file.flush().await?;
        sink.progress(sample(bytes_done, bytes_total.or(Some(bytes_done)), started))
            .await;

        let title = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);

        Ok(FetchOutcome {
            output_path: path,
            metadata: MediaMetadata {
                title,
                ..Default::default()
            },
        })
    }

    async fn send(&self, url: &url::Url) -> Result<reqwest::Response> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }
        Ok(response)
    }
}

fn sample(bytes_done: u64, bytes_total: Option<u64>, started: Instant) -> ProgressSample {
    let elapsed = started.elapsed().as_secs_f64();
    let rate = (elapsed > 0.0).then(|| bytes_done as f64 / elapsed);
    let eta = match (bytes_total, rate) {
        (Some(total), Some(rate)) if rate > 0.0 => {
            Some((total.saturating_sub(bytes_done) as f64 / rate).round() as u64)
        }
        _ => None,
    };

    ProgressSample {
        bytes_done,
        bytes_total,
        rate,
        eta,
    }
}
