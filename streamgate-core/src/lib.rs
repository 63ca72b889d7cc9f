//! Streamgate Core - stream resolution pipeline
//!
//! Resolves a media source identifier to a direct, time-limited stream URL.
//! The pipeline is admission control, result caching and an ordered chain of
//! extraction methods run against an external metadata extractor.

pub mod admission;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod extractor;
pub mod format;
pub mod media;
pub mod resolver;
pub mod service;
pub mod source;
pub mod tracing_setup;

use std::time::Duration;

// Re-export main types for convenient access
pub use admission::{AdmissionController, AdmissionDecision};
pub use cache::{CacheKey, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StreamGateConfig;
pub use extractor::{MediaProbe, MetadataDocument, ProbeError, ProbeOptions, YtDlpProbe};
pub use format::{CandidateFormat, FormatSelector, SelectionProfile};
pub use media::{QualityTier, ResolutionRequest, ResolutionResult, ResolvedStream, TargetKind};
pub use resolver::{FallbackResolver, ResolutionFailure};
pub use service::StreamService;
pub use source::SourceId;

/// Errors that reach the request boundary.
///
/// Per-method extraction failures never appear here; the fallback resolver
/// absorbs them and only reports a [`ResolutionFailure`] once every method
/// has been exhausted.
#[derive(Debug, thiserror::Error)]
pub enum StreamGateError {
    #[error("Validation error: {reason}")]
    Validation { reason: String },

    #[error("Rate limit exceeded for {client}")]
    RateLimited {
        client: String,
        retry_after: Option<Duration>,
    },

    #[error("Resolution failed: {0}")]
    Resolution(ResolutionFailure),

    #[error("Extractor error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamGateError {
    /// Shorthand for building a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        StreamGateError::Validation {
            reason: reason.into(),
        }
    }

    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            StreamGateError::Validation { reason } => reason.clone(),
            StreamGateError::RateLimited { .. } => {
                "Please wait before making another request".to_string()
            }
            StreamGateError::Resolution(failure) => format!(
                "Extraction failed: {}. Video may be age-restricted or region-locked. \
                 Try adding a cookies.txt file.",
                failure.message()
            ),
            StreamGateError::Probe(e) => format!("Extractor error: {e}"),
            StreamGateError::Configuration { .. } => "Configuration error occurred".to_string(),
            StreamGateError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to the caller rather than the service.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StreamGateError::Validation { .. } | StreamGateError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StreamGateError>;
