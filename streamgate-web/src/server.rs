//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::get;
use dashmap::DashMap;
use streamgate_core::{AdmissionController, MediaProbe, StreamGateConfig, StreamService, YtDlpProbe};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::handlers::{
    clear_cache, download_audio, download_video, formats, health, info, root, search, stats,
    stream_audio, stream_video,
};
use crate::middleware::admission_middleware;
use crate::ws::ws_handler;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StreamService>,
    pub admission: Arc<AdmissionController>,
    pub config: Arc<StreamGateConfig>,
    pub http: reqwest::Client,
    pub request_counts: Arc<DashMap<String, u64>>,
    pub server_started_at: Instant,
}

impl AppState {
    pub fn new(config: StreamGateConfig, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            service: Arc::new(StreamService::new(&config, probe)),
            admission: Arc::new(AdmissionController::new(&config.admission)),
            config: Arc::new(config),
            http: reqwest::Client::new(),
            request_counts: Arc::new(DashMap::new()),
            server_started_at: Instant::now(),
        }
    }

    /// Total requests admitted since start.
    pub fn total_requests(&self) -> u64 {
        self.request_counts.iter().map(|entry| *entry.value()).sum()
    }
}

/// Builds the application router with every route and layer attached.
pub fn build_router(state: AppState) -> Router {
    let static_dir = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/", get(root))
        // Redirect endpoints
        .route("/stream/video", get(stream_video))
        .route("/stream/audio", get(stream_audio))
        // Relay endpoints
        .route("/download/video", get(download_video))
        .route("/download/audio", get(download_audio))
        // Catalog
        .route("/info", get(info))
        .route("/formats", get(formats))
        .route("/search", get(search))
        // Administrative
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/clear-cache", get(clear_cache))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_dir)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodically drops expired cache entries and idle admission windows.
pub fn spawn_maintenance(state: AppState) -> JoinHandle<()> {
    let period = state
        .config
        .server
        .maintenance_interval
        .max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = state.service.purge_expired();
            let pruned = state.admission.prune_idle();
            debug!(purged, pruned, "Maintenance pass complete");
        }
    })
}

pub async fn run_server(config: StreamGateConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let probe = Arc::new(YtDlpProbe::from_config(&config.extraction));
    if !probe.is_available().await {
        warn!(
            program = %config.extraction.ytdlp_path,
            "yt-dlp is not available; resolution requests will fail"
        );
    }
    match config.extraction.credential_file() {
        Some(path) => info!(path = %path.display(), "Credential file detected"),
        None => info!("No credential file; restricted media may fail to resolve"),
    }

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, probe);
    let maintenance = spawn_maintenance(state.clone());
    let app = build_router(state);

    info!("Streamgate running on http://{address}");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    maintenance.abort();
    served?;
    info!("Streamgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
