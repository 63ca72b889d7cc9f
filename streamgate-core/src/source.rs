//! Source identifier parsing and presentation helpers.
//!
//! Inbound requests name media by URL. Everything past the boundary works
//! with the canonical 11-character video id extracted here.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, StreamGateError};

const ALLOWED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
    "www.youtube-nocookie.com",
];

static URL_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("video id pattern is valid")
});

static BARE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("bare id pattern is valid"));

/// Canonical identifier of a media item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Extracts the video id from a watch, short-link, embed, shorts or live URL.
    ///
    /// A bare 11-character id is accepted as-is.
    ///
    /// # Errors
    /// - `StreamGateError::Validation` - Input is not a recognised video URL
    pub fn from_url(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if BARE_ID_PATTERN.is_match(trimmed) {
            return Ok(Self(trimmed.to_string()));
        }

        let normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let parsed =
            Url::parse(&normalized).map_err(|_| StreamGateError::validation("Invalid YouTube URL"))?;
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        if !ALLOWED_HOSTS.contains(&host.as_str()) {
            return Err(StreamGateError::validation("Invalid YouTube URL"));
        }

        URL_ID_PATTERN
            .captures(&normalized)
            .and_then(|captures| captures.get(1))
            .map(|id| Self(id.as_str().to_string()))
            .ok_or_else(|| StreamGateError::validation("Invalid YouTube URL"))
    }

    /// Wraps an id obtained elsewhere without validating its shape.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Checks whether `input` names a video without building the id.
    pub fn is_valid_url(input: &str) -> bool {
        Self::from_url(input).is_ok()
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL handed to the extractor.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduces a title to characters that are safe in headers and file names.
///
/// Non-ASCII characters are dropped, runs of whitespace collapse to a single
/// space, and the result is capped at 100 characters.
pub fn clean_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || " -_.,()[]'!&".contains(*c))
        .collect();

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(100)
        .collect()
}

/// Renders a duration in seconds as `H:MM:SS` or `M:SS`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = seconds.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Maps an audio container extension to its MIME type.
pub fn content_type_for_ext(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        _ => "audio/mpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_id_from_supported_urls() {
        let urls = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "www.youtube.com/live/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ];

        for url in urls {
            let id = SourceId::from_url(url).unwrap_or_else(|e| panic!("{url}: {e}"));
            assert_eq!(id.as_str(), "dQw4w9WgXcQ");
        }
    }

    #[test]
    fn test_rejects_foreign_and_malformed_urls() {
        for url in [
            "https://vimeo.com/123456789",
            "https://www.youtube.com/feed/subscriptions",
            "https://evil.example/watch?v=dQw4w9WgXcQ",
            "not a url at all",
            "",
        ] {
            assert!(!SourceId::is_valid_url(url), "accepted {url}");
        }
    }

    #[test]
    fn test_watch_url_is_canonical() {
        let id = SourceId::from_url("https://youtu.be/abc123DEF_-").unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=abc123DEF_-");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  Song   Title (Live)  "), "Song Title (Live)");
        assert_eq!(clean_title("Café: \"Remix\" / 2024"), "Caf Remix 2024");
        assert_eq!(clean_title(&"a".repeat(150)).len(), 100);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(59.0)), "0:59");
        assert_eq!(format_duration(Some(212.4)), "3:32");
        assert_eq!(format_duration(Some(3725.0)), "1:02:05");
        assert_eq!(format_duration(None), "0:00");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for_ext("M4A"), "audio/mp4");
        assert_eq!(content_type_for_ext("opus"), "audio/ogg");
        assert_eq!(content_type_for_ext("unknown"), "audio/mpeg");
    }
}
