//! Request and result types flowing through the resolution pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::CandidateFormat;
use crate::resolver::ResolutionFailure;
use crate::source::SourceId;
use crate::StreamGateError;

/// Kind of stream the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Audio,
    Video,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Audio => "audio",
            TargetKind::Video => "video",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = StreamGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(TargetKind::Audio),
            "video" => Ok(TargetKind::Video),
            _ => Err(StreamGateError::validation(format!(
                "Invalid target kind: {s}"
            ))),
        }
    }
}

/// Requested quality tier. Only meaningful for video targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
    #[default]
    Best,
}

impl QualityTier {
    /// Tallest video height the tier accepts before falling back.
    pub fn max_height(self) -> u32 {
        match self {
            QualityTier::Low => 360,
            QualityTier::Medium => 480,
            QualityTier::High => 720,
            QualityTier::Best => 1080,
        }
    }

    /// Extractor-side format expression matching the tier ceiling.
    pub fn format_hint(self) -> String {
        match self {
            QualityTier::Best => format!("best[height<={}]/best", self.max_height()),
            _ => format!("best[height<={}]", self.max_height()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Best => "best",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = StreamGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            "best" => Ok(QualityTier::Best),
            _ => Err(StreamGateError::validation("Invalid quality parameter")),
        }
    }
}

/// A single resolution request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub source_id: SourceId,
    pub target: TargetKind,
    pub quality: QualityTier,
    pub force_refresh: bool,
}

impl ResolutionRequest {
    pub fn audio(source_id: SourceId) -> Self {
        Self {
            source_id,
            target: TargetKind::Audio,
            quality: QualityTier::Best,
            force_refresh: false,
        }
    }

    pub fn video(source_id: SourceId, quality: QualityTier) -> Self {
        Self {
            source_id,
            target: TargetKind::Video,
            quality,
            force_refresh: false,
        }
    }

    /// Returns a copy that bypasses cache lookups.
    pub fn with_force_refresh(self, force_refresh: bool) -> Self {
        Self {
            force_refresh,
            ..self
        }
    }
}

/// A successfully resolved stream. This is the cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub source_id: SourceId,
    pub target: TargetKind,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub stream_url: String,
    pub selected_format: CandidateFormat,
    pub method_used: String,
    pub resolved_at: DateTime<Utc>,
}

/// Terminal status of a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Success,
    Failure,
}

/// Outcome of running the fallback chain once.
#[derive(Debug, Clone)]
pub enum ResolutionResult {
    Resolved(ResolvedStream),
    Failed(ResolutionFailure),
}

impl ResolutionResult {
    pub fn status(&self) -> ResolutionStatus {
        match self {
            ResolutionResult::Resolved(_) => ResolutionStatus::Success,
            ResolutionResult::Failed(_) => ResolutionStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == ResolutionStatus::Success
    }

    /// Name of the method that produced the stream, if any.
    pub fn method_used(&self) -> Option<&str> {
        match self {
            ResolutionResult::Resolved(stream) => Some(&stream.method_used),
            ResolutionResult::Failed(_) => None,
        }
    }

    /// Diagnostic from the last failed method, if the chain was exhausted.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            ResolutionResult::Resolved(_) => None,
            ResolutionResult::Failed(failure) => Some(failure.message()),
        }
    }

    pub fn into_stream(self) -> Result<ResolvedStream, ResolutionFailure> {
        match self {
            ResolutionResult::Resolved(stream) => Ok(stream),
            ResolutionResult::Failed(failure) => Err(failure),
        }
    }
}
