//! Read-only views over extractor metadata: details, format listings and
//! search results.

use serde::Serialize;

use crate::extractor::{MetadataDocument, SearchEntry};
use crate::format::CandidateFormat;
use crate::source::{SourceId, format_duration};

const DESCRIPTION_EXCERPT_LEN: usize = 500;
const MAX_TAGS: usize = 10;
const MAX_SUMMARY_FORMATS: usize = 20;

/// Descriptive metadata for one media item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDetails {
    pub video_id: SourceId,
    pub title: Option<String>,
    /// First 500 characters, with `...` appended when truncated
    pub description: String,
    pub duration: Option<f64>,
    pub duration_formatted: String,
    pub thumbnail: Option<String>,
    pub channel: Option<String>,
    pub channel_id: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub upload_date: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub age_limit: u32,
    pub is_live: bool,
    pub formats_count: usize,
    pub webpage_url: Option<String>,
    pub formats: Vec<FormatSummary>,
}

impl MediaDetails {
    pub fn from_document(video_id: SourceId, document: &MetadataDocument) -> Self {
        Self {
            video_id,
            title: document.title.clone(),
            description: excerpt(document.description.as_deref().unwrap_or_default()),
            duration: document.duration,
            duration_formatted: format_duration(document.duration),
            thumbnail: document.thumbnail.clone(),
            channel: document.channel.clone(),
            channel_id: document.channel_id.clone(),
            view_count: document.view_count,
            like_count: document.like_count,
            upload_date: document.upload_date.clone(),
            categories: document.categories.clone(),
            tags: document.tags.iter().take(MAX_TAGS).cloned().collect(),
            age_limit: document.age_limit.unwrap_or(0),
            is_live: document.is_live,
            formats_count: document.formats.len(),
            webpage_url: document.webpage_url.clone(),
            formats: document
                .formats
                .iter()
                .filter_map(FormatSummary::from_candidate)
                .take(MAX_SUMMARY_FORMATS)
                .collect(),
        }
    }
}

/// One downloadable format with a known size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatSummary {
    pub format_id: String,
    pub ext: String,
    pub resolution: String,
    pub filesize: u64,
    pub filesize_mb: f64,
    pub vcodec: String,
    pub acodec: String,
    pub format_note: String,
    pub fps: Option<f64>,
    pub tbr: Option<f64>,
    pub protocol: String,
    #[serde(skip)]
    sort_key: (u32, u32),
}

impl FormatSummary {
    /// Summarises a candidate. Formats of unknown size are skipped.
    pub fn from_candidate(format: &CandidateFormat) -> Option<Self> {
        let filesize = format.filesize?;
        Some(Self {
            format_id: format.id.clone(),
            ext: format.container_ext.clone(),
            resolution: format.resolution_label(),
            filesize,
            filesize_mb: (filesize as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            vcodec: format.video_codec_label().to_string(),
            acodec: format.audio_codec_label().to_string(),
            format_note: format.format_note.clone().unwrap_or_default(),
            fps: format.frame_rate,
            tbr: format.total_bitrate,
            protocol: format.protocol.clone(),
            sort_key: (format.height.unwrap_or(0), format.width.unwrap_or(0)),
        })
    }
}

/// Every sized format of a media item, largest resolution first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatListing {
    pub video_id: SourceId,
    pub title: String,
    pub total_formats: usize,
    pub formats: Vec<FormatSummary>,
}

impl FormatListing {
    pub fn from_document(video_id: SourceId, document: &MetadataDocument) -> Self {
        let mut formats: Vec<FormatSummary> = document
            .formats
            .iter()
            .filter_map(FormatSummary::from_candidate)
            .collect();
        formats.sort_by(|a, b| {
            b.sort_key
                .cmp(&a.sort_key)
                .then_with(|| b.filesize.cmp(&a.filesize))
        });

        Self {
            video_id,
            title: document
                .title
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            total_formats: formats.len(),
            formats,
        }
    }
}

/// One search hit as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub video_id: String,
    pub title: String,
    pub duration: Option<f64>,
    pub duration_formatted: String,
    pub thumbnail: Option<String>,
    pub channel: Option<String>,
    pub view_count: Option<u64>,
    pub url: String,
}

impl From<SearchEntry> for SearchHit {
    fn from(entry: SearchEntry) -> Self {
        Self {
            duration_formatted: format_duration(entry.duration),
            title: entry.title.unwrap_or_else(|| "No Title".to_string()),
            video_id: entry.id,
            duration: entry.duration,
            thumbnail: entry.thumbnail,
            channel: entry.channel,
            view_count: entry.view_count,
            url: entry.url,
        }
    }
}

/// Search response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub success: bool,
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResults {
    pub fn new(query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        Self {
            success: true,
            query: query.into(),
            count: hits.len(),
            results: hits,
            error: None,
        }
    }

    /// Unsuccessful search carrying a reason instead of results.
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            query: query.into(),
            count: 0,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_EXCERPT_LEN {
        let mut cut: String = text.chars().take(DESCRIPTION_EXCERPT_LEN).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}
