//! Extractors: turning a URL into a fetched media file
//!
//! An [`Extractor`] answers whether it accepts a URL and performs the fetch, reporting
//! progress through a [`ProgressSink`]. The [`ExtractorRegistry`] holds extractors in
//! priority order; the first one whose [`Extractor::can_handle`] returns true wins.
//!
//! ## Backends
//!
//! - [`SiteExtractor`]: known media sites, fetched with the external `yt-dlp` binary
//! - [`GenericExtractor`]: any http(s) URL; direct media files are streamed with
//!   [`HttpFetcher`], everything else goes to yt-dlp
//!
//! ## Example
//!
//! ```no_run
//! use media_dl::config::ExtractorConfig;
//! use media_dl::extractor::ExtractorRegistry;
//!
//! # fn main() -> media_dl::Result<()> {
//! let registry = ExtractorRegistry::default_registry(&ExtractorConfig::default())?;
//! let url = url::Url::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
//! assert_eq!(registry.detect_platform(&url), Some(media_dl::Platform::Youtube));
//! # Ok(())
//! # }
//! ```

mod http;
mod parser;
mod sites;
mod traits;
mod ytdlp;

pub use http::HttpFetcher;
pub use parser::{YtDlpLine, parse_line};
pub use sites::{GenericExtractor, SiteExtractor};
pub use traits::{
    Extractor, FetchOutcome, FetchRequest, FetchSignal, ProgressSample, ProgressSink,
};
pub use ytdlp::YtDlp;

use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::types::Platform;
use std::sync::Arc;
use url::Url;

/// Ordered set of extractors, most specific first
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.extractors.iter().map(|e| e.name()))
            .finish()
    }
}

impl ExtractorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor; earlier registrations take precedence
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        tracing::debug!(extractor = extractor.name(), "registered extractor");
        self.extractors.push(extractor);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.register(extractor);
        self
    }

    /// Site extractors for every known platform followed by the generic fallback
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn default_registry(config: &ExtractorConfig) -> Result<Self> {
        let ytdlp = Arc::new(YtDlp::from_config(config));
        if !ytdlp.is_available() {
            tracing::warn!("yt-dlp not found; only direct media URLs can be fetched");
        }
        let http = HttpFetcher::new(config)?;

        Ok(Self::new()
            .with(Arc::new(SiteExtractor::youtube(ytdlp.clone())))
            .with(Arc::new(SiteExtractor::vimeo(ytdlp.clone())))
            .with(Arc::new(SiteExtractor::soundcloud(ytdlp.clone())))
            .with(Arc::new(SiteExtractor::dailymotion(ytdlp.clone())))
            .with(Arc::new(GenericExtractor::new(http, ytdlp))))
    }

    /// First extractor that accepts `url`
    pub fn find_url(&self, url: &Url) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(url))
            .cloned()
    }

    /// Parse `url` and return it with the first extractor that accepts it
    pub fn find(&self, url: &str) -> Option<(Url, Arc<dyn Extractor>)> {
        let parsed = Url::parse(url.trim()).ok()?;
        let extractor = self.find_url(&parsed)?;
        Some((parsed, extractor))
    }

    /// Platform of the extractor that would handle `url`
    pub fn detect_platform(&self, url: &Url) -> Option<Platform> {
        self.find_url(url).map(|e| e.platform())
    }

    /// Platforms served by registered extractors, in registration order
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        for extractor in &self.extractors {
            let platform = extractor.platform();
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        platforms
    }

    /// Number of registered extractors
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Whether no extractor is registered
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}
