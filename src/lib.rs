//! # media-dl
//!
//! Media download orchestration engine: a persistent task queue with bounded concurrency,
//! pluggable per-platform extractors and live progress notifications.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - The engine is a Rust crate; the REST API is an optional surface on top
//! - **Crash-safe** - Every lifecycle change is persisted before it is announced
//! - **Event-driven** - Consumers subscribe to progress and status events, no polling required
//! - **Pluggable** - Each platform is an [`Extractor`] in an ordered registry
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadOptions, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!     downloader.start().await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     downloader
//!         .create("https://vimeo.com/76979871", DownloadOptions::default())
//!         .await?;
//!
//!     media_dl::run_with_shutdown(downloader).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Download engine (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Platform extractors and fetch backends
pub mod extractor;
/// Event fan-out to subscribed listeners
pub mod hub;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use downloader::MediaDownloader;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, FetchError, Result, TaskError, ToHttpStatus,
};
pub use extractor::{Extractor, ExtractorRegistry, FetchOutcome, FetchRequest, ProgressSink};
pub use hub::{ListenerId, NotificationHub, Subscription};
pub use types::{
    DownloadOptions, Event, MediaFormat, MediaInfo, MediaMetadata, Platform, Progress, Status,
    StatusSnapshot, TaskId, TaskPage, TaskRecord, UrlValidation, VideoQuality,
};

/// Helper function to run the engine with graceful signal handling.
///
/// Waits for a termination signal and then calls the engine's `stop()` method, which parks
/// active tasks so the next `start()` picks them up again.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     downloader.start().await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.stop().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, some test harnesses)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "shutdown signal received"),
                _ = sigint.recv() => tracing::info!(signal = "SIGINT", "shutdown signal received"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!(signal = "SIGTERM", "shutdown signal received");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!(signal = "SIGINT", "shutdown signal received");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register signal handlers, falling back to ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "ctrl_c", "shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
