//! yt-dlp backend driven as a child process

use super::parser::{YtDlpLine, parse_info, parse_line};
use super::traits::{FetchOutcome, FetchRequest, ProgressSink};
use crate::config::ExtractorConfig;
use crate::error::{FetchError, Result};
use crate::types::{MediaInfo, Platform};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use url::Url;

const BINARY_NAME: &str = "yt-dlp";
const DEFAULT_TEMPLATE: &str = "%(title)s.%(ext)s";
const STDERR_TAIL_LINES: usize = 20;

/// Handle to the yt-dlp binary
///
/// Holds no binary when none was configured or found; every fetch then fails with
/// [`FetchError::ToolNotFound`].
///
/// ```no_run
/// use media_dl::extractor::YtDlp;
///
/// let ytdlp = YtDlp::from_path();
/// println!("yt-dlp available: {}", ytdlp.is_available());
/// ```
#[derive(Clone, Debug, Default)]
pub struct YtDlp {
    binary: Option<PathBuf>,
}

impl YtDlp {
    /// Use an explicit binary path
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary: Some(binary),
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Self {
        Self {
            binary: which::which(BINARY_NAME).ok(),
        }
    }

    /// Configured path first, then PATH lookup when `search_path` is on
    pub fn from_config(config: &ExtractorConfig) -> Self {
        if let Some(path) = &config.ytdlp_path {
            return Self::new(path.clone());
        }
        if config.search_path {
            return Self::from_path();
        }
        Self::default()
    }

    /// Whether a binary is configured
    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    /// Binary that will be executed
    pub fn binary(&self) -> Option<&PathBuf> {
        self.binary.as_ref()
    }

    /// Command-line arguments for one fetch
    pub fn build_args(request: &FetchRequest) -> Vec<String> {
        let options = &request.options;
        let mut args: Vec<String> = [
            "--newline",
            "--no-playlist",
            "--progress",
            "--no-simulate",
            "--progress-template",
            "download:[progress] %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s %(progress.eta)s",
            "--print",
            "before_dl:[destination] %(filename)s",
            "--print",
            "after_move:[filepath] %(filepath)s",
            "--print",
            "after_move:[meta] %(.{title,duration,thumbnail})j",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if options.extract_audio {
            args.extend([
                "-f".to_string(),
                "bestaudio/best".to_string(),
                "-x".to_string(),
                "--audio-format".to_string(),
                options.format.clone().unwrap_or_else(|| "mp3".to_string()),
                "--audio-quality".to_string(),
                "192K".to_string(),
            ]);
        } else {
            args.push("-f".to_string());
            args.push(options.quality.format_selector());
            if let Some(format) = &options.format {
                args.push("--merge-output-format".to_string());
                args.push(format.clone());
            }
        }

        if options.download_subtitles {
            args.push("--write-subs".to_string());
        }

        let template = options
            .filename_template
            .as_deref()
            .unwrap_or(DEFAULT_TEMPLATE);
        args.push("-o".to_string());
        args.push(request.output_dir.join(template).to_string_lossy().into_owned());

        args.push("--".to_string());
        args.push(request.url.to_string());
        args
    }

    /// Command-line arguments for describing a URL without downloading it
    pub fn build_info_args(url: &Url) -> Vec<String> {
        [
            "--dump-single-json",
            "--no-playlist",
            "--no-warnings",
            "--skip-download",
            "--",
            url.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Ask yt-dlp for the title and available formats of `url`
    ///
    /// The child is killed if the returned future is dropped.
    pub async fn describe(&self, url: &Url, platform: Platform) -> Result<MediaInfo> {
        let binary = self.binary.as_ref().ok_or(FetchError::ToolNotFound {
            tool: BINARY_NAME.to_string(),
        })?;
        tracing::debug!(url = %url, binary = %binary.display(), "describing with yt-dlp");

        let output = Command::new(binary)
            .args(Self::build_info_args(url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FetchError::ToolNotFound {
                        tool: BINARY_NAME.to_string(),
                    }
                } else {
                    FetchError::Failed(format!("Failed to execute yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
            let message = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
            return Err(FetchError::ToolFailed {
                tool: BINARY_NAME.to_string(),
                code: output.status.code(),
                message: if message.is_empty() {
                    "yt-dlp exited unsuccessfully".to_string()
                } else {
                    message
                },
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_info(stdout.trim(), url.to_string(), platform)
            .map_err(|e| FetchError::Failed(format!("unreadable yt-dlp info: {e}")).into())
    }

    /// Run yt-dlp for `request`, forwarding progress to `sink`
    pub async fn fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome> {
        let binary = self.binary.as_ref().ok_or(FetchError::ToolNotFound {
            tool: BINARY_NAME.to_string(),
        })?;

        tokio::fs::create_dir_all(&request.output_dir).await?;

        let args = Self::build_args(&request);
        tracing::debug!(task_id = request.task_id.0, binary = %binary.display(), "spawning yt-dlp");

        let mut child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FetchError::ToolNotFound {
                        tool: BINARY_NAME.to_string(),
                    }
                } else {
                    FetchError::Failed(format!("Failed to execute yt-dlp: {}", e))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Failed("yt-dlp stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Failed("yt-dlp stderr was not captured".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut destination: Option<PathBuf> = None;
        let mut final_path: Option<PathBuf> = None;
        let mut outcome = FetchOutcome::default();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task_id = request.task_id.0, "killing yt-dlp");
                    child.start_kill().ok();
                    child.wait().await.ok();
                    stderr_task.abort();
                    return Err(FetchError::Cancelled.into());
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else { break };

            match parse_line(&line) {
                YtDlpLine::Progress(sample) => sink.progress(sample).await,
                YtDlpLine::Destination(path) => {
                    if destination.as_ref() != Some(&path) {
                        sink.destination(path.clone()).await;
                        destination = Some(path);
                    }
                }
                YtDlpLine::FinalPath(path) => final_path = Some(path),
                YtDlpLine::Metadata(metadata) => outcome.metadata = metadata,
                YtDlpLine::Other(text) => {
                    if !text.is_empty() {
                        tracing::trace!(task_id = request.task_id.0, "yt-dlp: {}", text);
                    }
                }
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                child.start_kill().ok();
                child.wait().await.ok();
                stderr_task.abort();
                return Err(FetchError::Cancelled.into());
            }
            status = child.wait() => status?,
        };
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(FetchError::ToolFailed {
                tool: BINARY_NAME.to_string(),
                code: status.code(),
                message: if stderr_tail.is_empty() {
                    "yt-dlp exited unsuccessfully".to_string()
                } else {
                    stderr_tail
                },
            }
            .into());
        }

        outcome.output_path = final_path.or(destination).ok_or_else(|| {
            FetchError::Failed("yt-dlp did not report an output file".to_string())
        })?;

        Ok(outcome)
    }
}
