//! Site extractors backed by yt-dlp, plus the generic fallback

use super::http::HttpFetcher;
use super::traits::{Extractor, FetchOutcome, FetchRequest, ProgressSink};
use super::ytdlp::YtDlp;
use crate::error::Result;
use crate::types::{MediaFormat, MediaInfo, Platform};
use crate::utils::is_direct_media_url;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "m.youtube.com", "youtu.be"];
const YOUTUBE_PATTERNS: &[&str] = &[
    r"(?:youtube\.com/watch\?v=|youtu\.be/)([\w-]+)",
    r"youtube\.com/embed/([\w-]+)",
    r"youtube\.com/playlist\?list=([\w-]+)",
];

const VIMEO_DOMAINS: &[&str] = &["vimeo.com", "player.vimeo.com"];
const VIMEO_PATTERNS: &[&str] = &[r"vimeo\.com/(\d+)", r"player\.vimeo\.com/video/(\d+)"];

const SOUNDCLOUD_DOMAINS: &[&str] = &["soundcloud.com", "m.soundcloud.com"];
const SOUNDCLOUD_PATTERNS: &[&str] = &[r"soundcloud\.com/[\w-]+/[\w-]+"];

const DAILYMOTION_DOMAINS: &[&str] = &["dailymotion.com", "dai.ly"];
const DAILYMOTION_PATTERNS: &[&str] = &[r"dailymotion\.com/video/(\w+)", r"dai\.ly/(\w+)"];

/// Host with a leading `www.` stripped, lowercased
pub(crate) fn normalized_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn compile_patterns(platform: Platform, patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            match regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .size_limit(1024 * 1024)
                .build()
            {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        platform = %platform,
                        pattern = %pattern,
                        error = %e,
                        "invalid URL pattern, skipping"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Extractor for a known media site, fetched through yt-dlp
pub struct SiteExtractor {
    platform: Platform,
    domains: Vec<String>,
    patterns: Vec<Regex>,
    ytdlp: Arc<YtDlp>,
}

impl SiteExtractor {
    /// Build an extractor from a domain list and URL patterns
    pub fn new(platform: Platform, domains: &[&str], patterns: &[&str], ytdlp: Arc<YtDlp>) -> Self {
        Self {
            platform,
            domains: domains.iter().map(|d| d.to_ascii_lowercase()).collect(),
            patterns: compile_patterns(platform, patterns),
            ytdlp,
        }
    }

    /// YouTube videos, embeds and playlists
    pub fn youtube(ytdlp: Arc<YtDlp>) -> Self {
        Self::new(Platform::Youtube, YOUTUBE_DOMAINS, YOUTUBE_PATTERNS, ytdlp)
    }

    /// Vimeo videos
    pub fn vimeo(ytdlp: Arc<YtDlp>) -> Self {
        Self::new(Platform::Vimeo, VIMEO_DOMAINS, VIMEO_PATTERNS, ytdlp)
    }

    /// SoundCloud tracks
    pub fn soundcloud(ytdlp: Arc<YtDlp>) -> Self {
        Self::new(Platform::Soundcloud, SOUNDCLOUD_DOMAINS, SOUNDCLOUD_PATTERNS, ytdlp)
    }

    /// Dailymotion videos
    pub fn dailymotion(ytdlp: Arc<YtDlp>) -> Self {
        Self::new(Platform::Dailymotion, DAILYMOTION_DOMAINS, DAILYMOTION_PATTERNS, ytdlp)
    }
}

#[async_trait]
impl Extractor for SiteExtractor {
    fn name(&self) -> &'static str {
        self.platform.as_str()
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn can_handle(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        if let Some(host) = normalized_host(url)
            && self.domains.iter().any(|d| *d == host)
        {
            return true;
        }
        self.patterns.iter().any(|re| re.is_match(url.as_str()))
    }

    async fn execute_fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome> {
        self.ytdlp.fetch(request, sink, cancel).await
    }

    async fn extract_info(&self, url: &Url) -> Result<MediaInfo> {
        self.ytdlp.describe(url, self.platform).await
    }
}

/// Fallback for any http(s) URL
///
/// Direct media files go through [`HttpFetcher`]; other pages are handed to yt-dlp, which
/// knows far more sites than the registry does.
pub struct GenericExtractor {
    http: HttpFetcher,
    ytdlp: Arc<YtDlp>,
}

impl GenericExtractor {
    /// Create the fallback extractor
    pub fn new(http: HttpFetcher, ytdlp: Arc<YtDlp>) -> Self {
        Self { http, ytdlp }
    }
}

#[async_trait]
impl Extractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn platform(&self) -> Platform {
        Platform::Generic
    }

    fn can_handle(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    }

    async fn execute_fetch(
        &self,
        request: FetchRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome> {
        if is_direct_media_url(&request.url) {
            self.http.fetch(request, sink, cancel).await
        } else {
            self.ytdlp.fetch(request, sink, cancel).await
        }
    }

    /// Direct media files are described from the URL alone; other pages go to yt-dlp
    async fn extract_info(&self, url: &Url) -> Result<MediaInfo> {
        if is_direct_media_url(url) {
            Ok(direct_media_info(url))
        } else {
            self.ytdlp.describe(url, Platform::Generic).await
        }
    }
}

/// A direct media file has exactly one rendition: the file itself
fn direct_media_info(url: &Url) -> MediaInfo {
    let file = std::path::Path::new(url.path());
    let title = file
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let audio = ext
        .as_deref()
        .is_some_and(|e| crate::utils::AUDIO_EXTENSIONS.contains(&e));

    MediaInfo {
        url: url.to_string(),
        platform: Platform::Generic,
        title,
        description: None,
        uploader: url.host_str().map(str::to_string),
        duration: None,
        thumbnail_url: None,
        is_live: false,
        formats: vec![MediaFormat {
            format_id: "direct".to_string(),
            ext,
            vcodec: audio.then(|| "none".to_string()),
            ..MediaFormat::default()
        }],
    }
}
