//! Typed schema for extractor JSON output.
//!
//! yt-dlp emits loosely typed JSON where almost any field may be missing,
//! `null`, or an integer where a float is expected. The raw structs accept
//! all of that; the public types keep unknown values as `None`.

use serde::{Deserialize, Serialize};

use super::ProbeError;
use crate::format::CandidateFormat;

/// Metadata for one media item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataDocument {
    pub id: String,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub formats: Vec<CandidateFormat>,
    pub thumbnail: Option<String>,
    pub channel: Option<String>,
    pub channel_id: Option<String>,
    pub description: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    /// `YYYYMMDD` as reported by the extractor
    pub upload_date: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub age_limit: Option<u32>,
    pub is_live: bool,
    pub webpage_url: Option<String>,
}

impl MetadataDocument {
    /// Parses a `--dump-single-json` document.
    ///
    /// # Errors
    /// - `ProbeError::NoMetadata` - Output was empty
    /// - `ProbeError::InvalidDocument` - Output was not a metadata object
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProbeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ProbeError::NoMetadata);
        }

        let raw: RawDocument =
            serde_json::from_slice(bytes).map_err(|e| ProbeError::InvalidDocument {
                reason: e.to_string(),
            })?;
        Ok(raw.into())
    }
}

/// One hit from a keyword search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub channel: Option<String>,
    pub view_count: Option<u64>,
    pub thumbnail: Option<String>,
    pub url: String,
}

impl SearchEntry {
    /// Parses a `--flat-playlist --dump-single-json` search result.
    ///
    /// # Errors
    /// - `ProbeError::InvalidDocument` - Output was not a playlist object
    pub fn list_from_json(bytes: &[u8]) -> Result<Vec<Self>, ProbeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let raw: RawPlaylist =
            serde_json::from_slice(bytes).map_err(|e| ProbeError::InvalidDocument {
                reason: e.to_string(),
            })?;

        Ok(raw
            .entries
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let id = entry.id?;
                Some(SearchEntry {
                    url: format!("https://www.youtube.com/watch?v={id}"),
                    id,
                    title: entry.title,
                    duration: entry.duration,
                    channel: entry.channel.or(entry.uploader),
                    view_count: entry.view_count.and_then(to_u64),
                    thumbnail: entry
                        .thumbnails
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|thumb| thumb.url)
                        .next_back(),
                })
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct RawDocument {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    formats: Option<Vec<RawFormat>>,
    thumbnail: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    channel_id: Option<String>,
    description: Option<String>,
    view_count: Option<f64>,
    like_count: Option<f64>,
    upload_date: Option<String>,
    categories: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    age_limit: Option<f64>,
    is_live: Option<bool>,
    webpage_url: Option<String>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
    asr: Option<f64>,
    height: Option<f64>,
    width: Option<f64>,
    fps: Option<f64>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    protocol: Option<String>,
    url: Option<String>,
    format_note: Option<String>,
}

#[derive(Deserialize)]
struct RawPlaylist {
    entries: Option<Vec<Option<RawEntry>>>,
}

#[derive(Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    channel: Option<String>,
    uploader: Option<String>,
    view_count: Option<f64>,
    thumbnails: Option<Vec<RawThumbnail>>,
}

#[derive(Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

impl From<RawDocument> for MetadataDocument {
    fn from(raw: RawDocument) -> Self {
        MetadataDocument {
            id: raw.id.unwrap_or_default(),
            title: raw.title,
            duration: raw.duration,
            formats: raw
                .formats
                .unwrap_or_default()
                .into_iter()
                .filter_map(RawFormat::into_candidate)
                .collect(),
            thumbnail: raw.thumbnail,
            channel: raw.channel.or(raw.uploader),
            channel_id: raw.channel_id,
            description: raw.description,
            view_count: raw.view_count.and_then(to_u64),
            like_count: raw.like_count.and_then(to_u64),
            upload_date: raw.upload_date,
            categories: raw.categories.unwrap_or_default(),
            tags: raw.tags.unwrap_or_default(),
            age_limit: raw.age_limit.and_then(to_u64).map(|v| v as u32),
            is_live: raw.is_live.unwrap_or(false),
            webpage_url: raw.webpage_url,
        }
    }
}

impl RawFormat {
    /// Formats without a stream URL cannot be served and are dropped.
    fn into_candidate(self) -> Option<CandidateFormat> {
        let stream_url = self.url.filter(|url| !url.is_empty())?;
        Some(CandidateFormat {
            id: self.format_id.unwrap_or_default(),
            container_ext: self.ext.unwrap_or_default(),
            audio_codec: self.acodec,
            video_codec: self.vcodec,
            bitrate: self.abr,
            total_bitrate: self.tbr,
            sample_rate: self.asr.and_then(to_u64).map(|v| v as u32),
            height: self.height.and_then(to_u64).map(|v| v as u32),
            width: self.width.and_then(to_u64).map(|v| v as u32),
            frame_rate: self.fps,
            filesize: self
                .filesize
                .and_then(to_u64)
                .or_else(|| self.filesize_approx.and_then(to_u64)),
            protocol: self.protocol.unwrap_or_default(),
            stream_url,
            format_note: self.format_note,
        })
    }
}

fn to_u64(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}
