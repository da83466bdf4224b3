//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Download behavior configuration (directories, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum concurrent downloads (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Default output directory when a task does not name one (default: "downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Upper bound on a single fetch (default: 300 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Progress samples buffered between an extractor and its runner (default: 64)
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            output_dir: default_output_dir(),
            fetch_timeout: default_fetch_timeout(),
            progress_buffer: default_progress_buffer(),
        }
    }
}

/// Scheduler control-loop timing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between admission ticks (default: 1 second)
    #[serde(default = "default_tick_interval", with = "duration_serde")]
    pub tick_interval: Duration,

    /// Delay after a failed tick before the next one (default: 5 seconds)
    #[serde(default = "default_error_backoff", with = "duration_serde")]
    pub error_backoff: Duration,

    /// How long a pause/cancel waits for the fetch to acknowledge (default: 10 seconds)
    #[serde(default = "default_cancel_timeout", with = "duration_serde")]
    pub cancel_timeout: Duration,

    /// How long `stop()` waits for active runners before aborting them (default: 30 seconds)
    #[serde(default = "default_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            error_backoff: default_error_backoff(),
            cancel_timeout: default_cancel_timeout(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

/// Notification hub configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubConfig {
    /// Events buffered per listener before it is dropped (default: 1024)
    #[serde(default = "default_listener_buffer")]
    pub listener_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listener_buffer: default_listener_buffer(),
        }
    }
}

/// Extractor backends (yt-dlp binary, HTTP client)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// User agent for direct HTTP fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout for direct HTTP fetches (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Retry policy for the initial HTTP request
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            search_path: true,
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Sections:
/// - [`download`](DownloadConfig): concurrency, output directory, fetch limits
/// - [`scheduler`](SchedulerConfig): control-loop timing
/// - [`hub`](HubConfig): listener buffering
/// - [`extractor`](ExtractorConfig): yt-dlp and HTTP client settings
/// - [`persistence`](PersistenceConfig): database location
/// - [`api`](ApiConfig): REST server
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Scheduler timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Notification hub settings
    #[serde(default)]
    pub hub: HubConfig,

    /// Extractor backends
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Defaults overlaid with environment variables (a `.env` file is loaded first if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay process environment variables onto this configuration
    ///
    /// Recognised: `MAX_CONCURRENT_DOWNLOADS`, `DOWNLOADS_PATH` (or `DEFAULT_OUTPUT_PATH`),
    /// `DATABASE_PATH`, `API_HOST` (or `HOST`), `API_PORT` (or `PORT`), `ENABLE_CORS`,
    /// `YTDLP_PATH`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        if let Some(value) = first(&["MAX_CONCURRENT_DOWNLOADS"]) {
            self.download.max_concurrent_downloads =
                parse_env("MAX_CONCURRENT_DOWNLOADS", &value)?;
        }
        if let Some(value) = first(&["DOWNLOADS_PATH", "DEFAULT_OUTPUT_PATH"]) {
            self.download.output_dir = PathBuf::from(value);
        }
        if let Some(value) = first(&["DATABASE_PATH"]) {
            self.persistence.database_path = PathBuf::from(value);
        }
        if let Some(value) = first(&["API_HOST", "HOST"]) {
            let ip = parse_env("API_HOST", &value)?;
            self.api.bind_address.set_ip(ip);
        }
        if let Some(value) = first(&["API_PORT", "PORT"]) {
            let port = parse_env("API_PORT", &value)?;
            self.api.bind_address.set_port(port);
        }
        if let Some(value) = first(&["ENABLE_CORS"]) {
            self.api.cors_enabled = parse_bool("ENABLE_CORS", &value)?;
        }
        if let Some(value) = first(&["YTDLP_PATH"]) {
            self.extractor.ytdlp_path = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be greater than zero",
                "max_concurrent_downloads",
            ));
        }
        if self.scheduler.tick_interval.is_zero() {
            return Err(config_error(
                "tick_interval must be greater than zero",
                "tick_interval",
            ));
        }
        if self.scheduler.error_backoff.is_zero() {
            return Err(config_error(
                "error_backoff must be greater than zero",
                "error_backoff",
            ));
        }
        if self.download.progress_buffer == 0 {
            return Err(config_error(
                "progress_buffer must be greater than zero",
                "progress_buffer",
            ));
        }
        if self.hub.listener_buffer == 0 {
            return Err(config_error(
                "listener_buffer must be greater than zero",
                "listener_buffer",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| config_error(&format!("invalid value {value:?} for {key}: {e}"), key))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(config_error(
            &format!("invalid boolean {other:?} for {key}"),
            key,
        )),
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_progress_buffer() -> usize {
    64
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_error_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_cancel_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_listener_buffer() -> usize {
    1024
}

fn default_user_agent() -> String {
    concat!("media-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("media-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Durations as seconds; whole seconds serialize as integers, fractions as floats
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
