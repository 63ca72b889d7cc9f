//! HTTP handlers grouped by surface.

pub mod admin;
pub mod catalog;
pub mod download;
pub mod stream;

pub use admin::{clear_cache, health, root, stats};
pub use catalog::{formats, info, search};
pub use download::{download_audio, download_video};
pub use stream::{stream_audio, stream_video};

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use streamgate_core::{QualityTier, SourceId};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub url: String,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    pub url: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<usize>,
}

/// Validates the URL and quality parameters of a video request.
pub(crate) fn parse_video_query(
    query: &VideoQuery,
    path: &str,
) -> Result<(SourceId, QualityTier), ApiError> {
    let source_id = parse_source(&query.url, path)?;
    let quality = match query.quality.as_deref() {
        Some(raw) => raw
            .parse::<QualityTier>()
            .map_err(|e| ApiError::from(e).at(path))?,
        None => QualityTier::default(),
    };
    Ok((source_id, quality))
}

pub(crate) fn parse_source(url: &str, path: &str) -> Result<SourceId, ApiError> {
    SourceId::from_url(url).map_err(|e| ApiError::from(e).at(path))
}

/// Inserts a header, skipping values that are not valid header text.
pub(crate) fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
