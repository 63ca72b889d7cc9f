//! Download relay.
//!
//! The resolved stream is fetched with `reqwest` and forwarded chunk by
//! chunk as an attachment. Nothing is buffered beyond the chunk in flight.
//! Streams whose advertised length exceeds the configured ceiling are
//! refused up front; streams without a length are cut off once the ceiling
//! is crossed.

use axum::body::Body;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use streamgate_core::source::{clean_title, content_type_for_ext};
use streamgate_core::{ResolutionRequest, ResolvedStream};
use tracing::{info, warn};

use super::{UrlQuery, VideoQuery, insert_header, parse_source, parse_video_query};
use crate::error::ApiError;
use crate::server::AppState;

/// `GET /download/video?url&quality`
pub async fn download_video(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<VideoQuery>,
) -> Result<Response, ApiError> {
    let (source_id, quality) = parse_video_query(&query, uri.path())?;
    let stream = state
        .service
        .resolve_stream(&ResolutionRequest::video(source_id, quality))
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    relay(&state, &stream, "mp4", "video/mp4", "x-video-title")
        .await
        .map_err(|e| e.at(uri.path()))
}

/// `GET /download/audio?url`
pub async fn download_audio(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<UrlQuery>,
) -> Result<Response, ApiError> {
    let source_id = parse_source(&query.url, uri.path())?;
    let stream = state
        .service
        .resolve_stream(&ResolutionRequest::audio(source_id))
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    let ext = stream.selected_format.container_ext.clone();
    let content_type = content_type_for_ext(&ext);
    relay(&state, &stream, &ext, content_type, "x-audio-title")
        .await
        .map_err(|e| e.at(uri.path()))
}

async fn relay(
    state: &AppState,
    stream: &ResolvedStream,
    ext: &str,
    content_type: &str,
    title_header: &'static str,
) -> Result<Response, ApiError> {
    let limit = state.config.download.max_download_size;

    let upstream = state
        .http
        .get(&stream.stream_url)
        .send()
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to reach media host: {e}")))?;
    if !upstream.status().is_success() {
        return Err(ApiError::upstream(format!(
            "Media host answered {}",
            upstream.status()
        )));
    }

    let length = upstream.content_length();
    if let Some(size) = length.filter(|size| *size > limit) {
        warn!(video_id = %stream.source_id, size, limit, "Refusing oversized download");
        return Err(ApiError::too_large(size, limit));
    }

    let title = clean_title(stream.title.as_deref().unwrap_or("download"));
    let filename = format!("{title}_{}.{ext}", stream.source_id);

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, "content-type", content_type);
    insert_header(&mut headers, "content-disposition", &attachment(&filename));
    insert_header(&mut headers, "accept-ranges", "bytes");
    insert_header(&mut headers, "cache-control", "public, max-age=3600");
    insert_header(&mut headers, title_header, &title);
    insert_header(&mut headers, "x-video-id", stream.source_id.as_str());
    if let Some(size) = length {
        insert_header(&mut headers, "content-length", &size.to_string());
    }

    info!(video_id = %stream.source_id, %filename, "Relaying download");

    let mut forwarded = 0u64;
    let body = upstream.bytes_stream().map(move |chunk| {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Err(std::io::Error::other(e)),
        };
        forwarded += chunk.len() as u64;
        if forwarded > limit {
            return Err(std::io::Error::other("download exceeded the size limit"));
        }
        Ok(chunk)
    });

    Ok((StatusCode::OK, headers, Body::from_stream(body)).into_response())
}

fn attachment(filename: &str) -> String {
    format!(
        "attachment; filename=\"{filename}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
