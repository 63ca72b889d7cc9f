//! Centralized configuration for Streamgate.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, StreamGateError};

/// Central configuration for all Streamgate components.
///
/// Groups related settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct StreamGateConfig {
    pub server: ServerConfig,
    pub admission: AdmissionConfig,
    pub cache: CacheConfig,
    pub extraction: ExtractionConfig,
    pub download: DownloadConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Interval between cache and rate-window maintenance sweeps
    pub maintenance_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
            maintenance_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Sliding-window admission control.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Trailing window over which requests are counted
    pub window: Duration,
    /// Maximum requests admitted per client within one window
    pub max_requests: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            max_requests: 15,
        }
    }
}

/// Result cache bounds.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for resolved streams
    pub ttl: Duration,
    /// Maximum number of entries before FIFO eviction
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7200), // 2 hours
            max_entries: 1000,
        }
    }
}

/// External extractor (yt-dlp) invocation settings.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Path or name of the yt-dlp binary
    pub ytdlp_path: String,
    /// Timeout for direct video extraction and metadata lookups
    pub video_timeout: Duration,
    /// Timeout for each audio fallback method
    pub method_timeout: Duration,
    /// Extractor-side retry count for direct video extraction
    pub video_retries: u32,
    /// Extractor-side retry count for each audio fallback method
    pub method_retries: u32,
    /// Netscape cookie file handed to credential-authenticated methods
    pub credential_path: Option<PathBuf>,
    /// Proxy endpoint for all extractor traffic
    pub proxy: Option<String>,
    /// Country code used for geo-restriction bypass
    pub geo_bypass_country: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            video_timeout: Duration::from_secs(60),
            method_timeout: Duration::from_secs(30),
            video_retries: 10,
            method_retries: 3,
            credential_path: Some(PathBuf::from("cookies.txt")),
            proxy: None,
            geo_bypass_country: Some("IN".to_string()),
        }
    }
}

impl ExtractionConfig {
    /// Returns the credential file if one is configured and present on disk.
    pub fn credential_file(&self) -> Option<&Path> {
        self.credential_path
            .as_deref()
            .filter(|path| path.is_file())
    }
}

/// Download relay settings.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Largest upstream body the relay will forward, when the length is known
    pub max_download_size: u64,
    /// Directory created by `streamgate check` for local downloads
    pub download_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_download_size: 500 * 1024 * 1024, // 500 MiB
            download_dir: PathBuf::from("downloads"),
        }
    }
}

impl StreamGateConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via `STREAMGATE_*` variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("STREAMGATE_HOST") {
            config.server.host = host;
        }

        if let Some(port) = env_parse::<u16>("STREAMGATE_PORT") {
            config.server.port = port;
        }

        if let Some(seconds) = env_parse::<u64>("STREAMGATE_RATE_LIMIT_WINDOW") {
            config.admission.window = Duration::from_secs(seconds);
        }

        if let Some(count) = env_parse::<usize>("STREAMGATE_MAX_REQUESTS") {
            config.admission.max_requests = count;
        }

        if let Some(seconds) = env_parse::<u64>("STREAMGATE_CACHE_TTL") {
            config.cache.ttl = Duration::from_secs(seconds);
        }

        if let Some(entries) = env_parse::<usize>("STREAMGATE_MAX_CACHE_SIZE") {
            config.cache.max_entries = entries;
        }

        if let Ok(path) = std::env::var("STREAMGATE_YTDLP_PATH") {
            config.extraction.ytdlp_path = path;
        }

        if let Some(seconds) = env_parse::<u64>("STREAMGATE_YTDLP_TIMEOUT") {
            config.extraction.video_timeout = Duration::from_secs(seconds);
        }

        if let Ok(path) = std::env::var("STREAMGATE_COOKIES_FILE") {
            config.extraction.credential_path = Some(PathBuf::from(path));
        }

        if let Ok(proxy) = std::env::var("STREAMGATE_PROXY") {
            config.extraction.proxy = Some(proxy).filter(|p| !p.is_empty());
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Small windows and capacities, no credential file and no proxy.
    pub fn for_testing() -> Self {
        Self {
            admission: AdmissionConfig {
                window: Duration::from_secs(1),
                max_requests: 3,
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(60),
                max_entries: 8,
            },
            extraction: ExtractionConfig {
                video_timeout: Duration::from_secs(2),
                method_timeout: Duration::from_secs(1),
                credential_path: None,
                geo_bypass_country: None,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Rejects settings that would disable a component outright.
    ///
    /// # Errors
    /// - `StreamGateError::Configuration` - A window, capacity or timeout is zero
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.admission.window.is_zero(), "rate-limit window must be non-zero"),
            (self.admission.max_requests == 0, "max requests per window must be non-zero"),
            (self.cache.ttl.is_zero(), "cache TTL must be non-zero"),
            (self.cache.max_entries == 0, "cache capacity must be non-zero"),
            (self.extraction.video_timeout.is_zero(), "extractor timeout must be non-zero"),
            (self.extraction.method_timeout.is_zero(), "method timeout must be non-zero"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(StreamGateError::Configuration {
                reason: (*reason).to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}
