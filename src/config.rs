//! Configuration types for playlist-export

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Job lifecycle settings (retry policy, timeout, directories)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum fetch attempts per job before giving up on rate limiting (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between rate-limited attempts (default: 10 seconds)
    #[serde(default = "default_backoff", with = "duration_serde")]
    pub backoff: Duration,

    /// Age after which a non-terminal job is reported as failed (default: 30 minutes)
    #[serde(default = "default_job_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Parent directory for per-job scratch directories (default: "./downloads")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory where finished archives are written (default: "./exports")
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Template for the URL handed to the downloader; `{id}` is replaced by the job key
    #[serde(default = "default_source_url_template")]
    pub source_url_template: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            timeout: default_job_timeout(),
            work_dir: default_work_dir(),
            archive_dir: default_archive_dir(),
            source_url_template: default_source_url_template(),
        }
    }
}

/// External downloader settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Name of the downloader binary looked up on PATH (default: "spotdl")
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Explicit path to the downloader (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Extra arguments appended after the playlist URL (default: ["--bitrate", "192k"])
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,

    /// Install the downloader when it cannot be found (default: true)
    #[serde(default = "default_true")]
    pub install_on_demand: bool,

    /// Command used to install the downloader (default: ["pip", "install", "spotdl"])
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,

    /// Case-insensitive substrings marking a rate-limited run
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary_name: default_binary_name(),
            binary_path: None,
            extra_args: default_extra_args(),
            install_on_demand: true,
            install_command: default_install_command(),
            rate_limit_markers: default_rate_limit_markers(),
        }
    }
}

/// Archive settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// File extensions treated as tracks when packaging a job (lowercase, no dot)
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            audio_extensions: default_audio_extensions(),
        }
    }
}

/// Streaming-service Web API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaylistSourceConfig {
    /// Base URL of the Web API (default: "https://api.spotify.com/v1")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Page size requested when listing (default: 50)
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for PlaylistSourceConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            page_limit: default_page_limit(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
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

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Job lifecycle settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// External downloader settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Playlist source settings
    #[serde(default)]
    pub playlists: PlaylistSourceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Environment variables read by [`Config::from_env`]
pub mod env_keys {
    /// Maximum fetch attempts
    pub const MAX_ATTEMPTS: &str = "PLAYLIST_EXPORT_MAX_ATTEMPTS";
    /// Backoff between rate-limited attempts, in seconds
    pub const BACKOFF_SECS: &str = "PLAYLIST_EXPORT_BACKOFF_SECS";
    /// Job timeout, in seconds
    pub const TIMEOUT_SECS: &str = "PLAYLIST_EXPORT_TIMEOUT_SECS";
    /// API bind address
    pub const BIND_ADDRESS: &str = "PLAYLIST_EXPORT_BIND_ADDRESS";
    /// Parent directory for job scratch directories
    pub const WORK_DIR: &str = "PLAYLIST_EXPORT_WORK_DIR";
    /// Directory for finished archives
    pub const ARCHIVE_DIR: &str = "PLAYLIST_EXPORT_ARCHIVE_DIR";
    /// Explicit downloader binary
    pub const FETCHER_PATH: &str = "PLAYLIST_EXPORT_FETCHER_PATH";
}

impl Config {
    /// Defaults overridden by environment variables (and a `.env` file, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup; unset keys keep their current value
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(env_keys::MAX_ATTEMPTS) {
            self.jobs.max_attempts = parse_value(env_keys::MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(env_keys::BACKOFF_SECS) {
            self.jobs.backoff =
                Duration::from_secs(parse_value(env_keys::BACKOFF_SECS, &value)?);
        }
        if let Some(value) = lookup(env_keys::TIMEOUT_SECS) {
            self.jobs.timeout =
                Duration::from_secs(parse_value(env_keys::TIMEOUT_SECS, &value)?);
        }
        if let Some(value) = lookup(env_keys::BIND_ADDRESS) {
            self.api.bind_address = parse_value(env_keys::BIND_ADDRESS, &value)?;
        }
        if let Some(value) = lookup(env_keys::WORK_DIR) {
            self.jobs.work_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(env_keys::ARCHIVE_DIR) {
            self.jobs.archive_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(env_keys::FETCHER_PATH) {
            self.fetcher.binary_path = Some(PathBuf::from(value));
        }
        self.validate()
    }

    /// Reject settings the job runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.jobs.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".into(),
                key: Some("max_attempts".into()),
            });
        }
        if self.jobs.timeout.is_zero() {
            return Err(Error::Config {
                message: "timeout must be greater than zero".into(),
                key: Some("timeout".into()),
            });
        }
        if !self.jobs.source_url_template.contains("{id}") {
            return Err(Error::Config {
                message: "source_url_template must contain {id}".into(),
                key: Some("source_url_template".into()),
            });
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("invalid value {:?}: {}", raw, e),
        key: Some(key.to_string()),
    })
}

// Default value functions
fn default_max_attempts() -> u32 {
    5
}

fn default_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_source_url_template() -> String {
    "https://open.spotify.com/playlist/{id}".to_string()
}

fn default_binary_name() -> String {
    "spotdl".to_string()
}

fn default_extra_args() -> Vec<String> {
    vec!["--bitrate".into(), "192k".into()]
}

fn default_install_command() -> Vec<String> {
    vec!["pip".into(), "install".into(), "spotdl".into()]
}

fn default_rate_limit_markers() -> Vec<String> {
    vec![
        "rate/request limit".into(),
        "rate limit".into(),
        "http error 429".into(),
        "too many requests".into(),
    ]
}

fn default_audio_extensions() -> Vec<String> {
    vec![
        "mp3".into(),
        "m4a".into(),
        "flac".into(),
        "opus".into(),
        "ogg".into(),
        "wav".into(),
        "aac".into(),
        "wma".into(),
        "alac".into(),
    ]
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_page_limit() -> u32 {
    50
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
