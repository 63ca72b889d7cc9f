//! External metadata extractor interface.
//!
//! The pipeline never talks to yt-dlp directly. Everything goes through
//! [`MediaProbe`], which has a process-backed production implementation and
//! a scripted implementation for tests.

pub mod document;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod ytdlp;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

pub use document::{MetadataDocument, SearchEntry};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::ScriptedProbe;
pub use ytdlp::YtDlpProbe;

/// Options bundle handed to the extractor for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Wall-clock bound for the whole invocation
    pub timeout: Duration,
    /// Extractor-side network retry count
    pub retry_count: u32,
    /// Netscape cookie file to authenticate with
    pub credential_path: Option<PathBuf>,
    pub proxy: Option<String>,
    /// Extractor format expression, e.g. `bestaudio/best`
    pub format_filter_hint: Option<String>,
    /// Skip site-specific extractors
    pub force_generic: bool,
    pub geo_bypass_country: Option<String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_count: 3,
            credential_path: None,
            proxy: None,
            format_filter_hint: None,
            force_generic: false,
            geo_bypass_country: None,
        }
    }
}

/// Failure of a single extractor invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Extractor timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    /// Extractor ran and reported an error. Displays its own diagnostic.
    #[error("{reason}")]
    Failed { code: Option<i32>, reason: String },

    #[error("Extractor returned no metadata")]
    NoMetadata,

    #[error("Invalid metadata document: {reason}")]
    InvalidDocument { reason: String },
}

impl ProbeError {
    pub(crate) fn timeout(timeout: Duration) -> Self {
        ProbeError::Timeout {
            seconds: timeout.as_secs(),
        }
    }
}

/// Metadata extractor for media sources.
#[async_trait]
pub trait MediaProbe: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Fetches the metadata document for `source_url`.
    ///
    /// Implementations must give up once `options.timeout` has elapsed and
    /// release any external resources when the returned future is dropped.
    ///
    /// # Errors
    /// - `ProbeError::Timeout` - Invocation exceeded `options.timeout`
    /// - `ProbeError::Failed` - Extractor reported an error
    /// - `ProbeError::InvalidDocument` - Output did not match the schema
    async fn probe(
        &self,
        source_url: &str,
        options: &ProbeOptions,
    ) -> Result<MetadataDocument, ProbeError>;

    /// Runs a keyword search returning at most `limit` entries.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        options: &ProbeOptions,
    ) -> Result<Vec<SearchEntry>, ProbeError>;

    /// Reports the extractor version.
    async fn version(&self) -> Result<String, ProbeError>;

    /// Checks whether the extractor can be invoked at all.
    async fn is_available(&self) -> bool {
        self.version().await.is_ok()
    }
}
