//! Redirect endpoints that hand clients a direct stream URL.

use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sha1::{Digest, Sha1};
use streamgate_core::source::{clean_title, content_type_for_ext};
use streamgate_core::{ResolutionRequest, ResolvedStream};
use tracing::info;

use super::{AudioQuery, VideoQuery, insert_header, parse_source, parse_video_query};
use crate::error::ApiError;
use crate::server::AppState;

const STREAM_URL_PREVIEW_LEN: usize = 100;

/// `GET /stream/video?url&quality`
pub async fn stream_video(
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

    let mut headers = redirect_headers(&stream);
    insert_header(&mut headers, "content-type", "video/mp4");
    insert_header(&mut headers, "cache-control", "public, max-age=7200");
    insert_header(&mut headers, "x-video-title", &display_title(&stream));
    insert_header(&mut headers, "x-stream-url", &stream_url_preview(&stream.stream_url));

    info!(video_id = %stream.source_id, %quality, "Redirecting to video stream");
    Ok((StatusCode::FOUND, headers).into_response())
}

/// `GET /stream/audio?url&force_refresh`
pub async fn stream_audio(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<AudioQuery>,
) -> Result<Response, ApiError> {
    let source_id = parse_source(&query.url, uri.path())?;
    let stream = state
        .service
        .resolve_audio(&source_id, query.force_refresh)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    let format = &stream.selected_format;
    let bitrate = format
        .bitrate
        .or(format.total_bitrate)
        .map(|kbps| format!("{kbps}"))
        .unwrap_or_else(|| "unknown".to_string());

    let mut headers = redirect_headers(&stream);
    insert_header(
        &mut headers,
        "content-type",
        content_type_for_ext(&format.container_ext),
    );
    insert_header(&mut headers, "cache-control", "public, max-age=86400");
    insert_header(&mut headers, "x-audio-title", &display_title(&stream));
    insert_header(&mut headers, "x-audio-bitrate", &bitrate);
    insert_header(&mut headers, "x-audio-codec", format.audio_codec_label());
    insert_header(&mut headers, "x-video-codec", format.video_codec_label());
    insert_header(&mut headers, "x-extraction-method", &stream.method_used);
    insert_header(&mut headers, "x-stream-url-hash", &url_hash(&stream.stream_url));

    info!(
        video_id = %stream.source_id,
        method = %stream.method_used,
        "Redirecting to audio stream"
    );
    Ok((StatusCode::FOUND, headers).into_response())
}

fn redirect_headers(stream: &ResolvedStream) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, "location", &stream.stream_url);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    insert_header(&mut headers, "x-video-id", stream.source_id.as_str());
    headers
}

fn display_title(stream: &ResolvedStream) -> String {
    clean_title(stream.title.as_deref().unwrap_or("Unknown"))
}

fn stream_url_preview(url: &str) -> String {
    if url.chars().count() > STREAM_URL_PREVIEW_LEN {
        let head: String = url.chars().take(STREAM_URL_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        url.to_string()
    }
}

/// First eight hex characters of the SHA-1 of the stream URL.
fn url_hash(url: &str) -> String {
    let digest = Sha1::digest(url.as_bytes());
    hex::encode(digest)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_preview_truncates_long_urls() {
        let long = format!("https://cdn.example/{}", "a".repeat(200));
        let preview = stream_url_preview(&long);
        assert_eq!(preview.len(), 103);
        assert!(preview.ends_with("..."));
        assert_eq!(stream_url_preview("https://short"), "https://short");
    }

    #[test]
    fn test_url_hash_is_eight_hex_chars() {
        let hash = url_hash("https://cdn.example/audio");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, url_hash("https://cdn.example/audio"));
    }
}
