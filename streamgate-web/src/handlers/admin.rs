//! Service banner, health, statistics and cache control.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::server::AppState;

const SERVICE_NAME: &str = "Streamgate";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": VERSION,
        "status": "running",
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "stream_video": "/stream/video?url=YOUTUBE_URL&quality=best",
            "stream_audio": "/stream/audio?url=YOUTUBE_URL",
            "download_video": "/download/video?url=YOUTUBE_URL&quality=best",
            "download_audio": "/download/audio?url=YOUTUBE_URL",
            "info": "/info?url=YOUTUBE_URL",
            "formats": "/formats?url=YOUTUBE_URL",
            "search": "/search?q=QUERY&limit=10",
            "health": "/health",
            "stats": "/stats",
            "clear_cache": "/clear-cache",
            "websocket": "/ws",
        },
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let cache = state.service.stats();
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": VERSION,
        "timestamp": Utc::now().to_rfc3339(),
        "cache_size": cache.total_entries(),
        "rate_limits": state.admission.tracked_clients(),
    }))
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let cache = state.service.stats();
    let by_endpoint: serde_json::Map<String, Value> = state
        .request_counts
        .iter()
        .map(|entry| (entry.key().clone(), json!(*entry.value())))
        .collect();

    Json(json!({
        "total_requests": state.total_requests(),
        "requests_by_endpoint": by_endpoint,
        "cache_hits": cache.streams.hits + cache.details.hits + cache.searches.hits,
        "cache_misses": cache.streams.misses + cache.details.misses + cache.searches.misses,
        "cache_size": cache.total_entries(),
        "caches": cache,
        "uptime_seconds": state.server_started_at.elapsed().as_secs(),
        "rate_limited_ips": state.admission.tracked_clients(),
    }))
}

/// `GET /clear-cache`
pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.service.clear_caches();
    info!("All caches cleared");
    Json(json!({
        "status": "success",
        "message": "Cache cleared",
    }))
}
