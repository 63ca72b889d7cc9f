//! Metadata lookups: details, format listings and search.

use axum::Json;
use axum::extract::{OriginalUri, Query, State};
use streamgate_core::catalog::{FormatListing, MediaDetails, SearchResults};

use super::{SearchQuery, UrlQuery, parse_source};
use crate::error::ApiError;
use crate::server::AppState;

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// `GET /info?url`
pub async fn info(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<UrlQuery>,
) -> Result<Json<MediaDetails>, ApiError> {
    let source_id = parse_source(&query.url, uri.path())?;
    let details = state
        .service
        .describe(&source_id)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;
    Ok(Json(details))
}

/// `GET /formats?url`
pub async fn formats(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<UrlQuery>,
) -> Result<Json<FormatListing>, ApiError> {
    let source_id = parse_source(&query.url, uri.path())?;
    let listing = state
        .service
        .list_formats(&source_id)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;
    Ok(Json(listing))
}

/// `GET /search?q&limit`
pub async fn search(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = state
        .service
        .search(&query.q, limit)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;
    Ok(Json(results))
}
