//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Subcommand;
use streamgate_core::{
    MediaProbe, QualityTier, ResolutionRequest, SourceId, StreamGateConfig, StreamService,
    TargetKind, YtDlpProbe,
};
use tracing::info;

/// Directories the service writes into.
const WORKING_DIRS: [&str; 3] = ["downloads", "static", "logs"];

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Resolve one source and print the result as JSON
    Resolve {
        /// Video URL or bare id
        url: String,
        /// Stream kind
        #[arg(short, long, default_value = "audio")]
        kind: String,
        /// Quality tier for video streams
        #[arg(short, long, default_value = "best")]
        quality: String,
    },
    /// Verify the extractor, credential file and working directories
    Check,
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of whichever command ran
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = StreamGateConfig::from_env();
    match command {
        Commands::Server { host, port } => start_server(config, host, port).await,
        Commands::Resolve { url, kind, quality } => resolve(config, &url, &kind, &quality).await,
        Commands::Check => check(&config).await,
    }
}

/// Start the HTTP server with CLI overrides applied
///
/// # Errors
/// - Configuration is invalid or the listener cannot bind
pub async fn start_server(
    mut config: StreamGateConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    streamgate_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {e}"))
}

/// Resolve a single source through the full pipeline
///
/// # Errors
/// - `StreamGateError::Validation` - URL, kind or quality is not recognised
/// - `StreamGateError::Resolution` - Every extraction method failed
pub async fn resolve(
    config: StreamGateConfig,
    url: &str,
    kind: &str,
    quality: &str,
) -> anyhow::Result<()> {
    let source_id = SourceId::from_url(url)?;
    let target: TargetKind = kind.parse()?;
    let quality: QualityTier = quality.parse()?;

    let probe = Arc::new(YtDlpProbe::from_config(&config.extraction));
    let service = StreamService::new(&config, probe);

    let stream = match target {
        TargetKind::Audio => service.resolve_audio(&source_id, true).await,
        TargetKind::Video => {
            let request = ResolutionRequest::video(source_id, quality).with_force_refresh(true);
            service.resolve_stream(&request).await
        }
    }
    .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("{}", serde_json::to_string_pretty(&stream)?);
    Ok(())
}

/// Check that the service can run on this machine
///
/// # Errors
/// - yt-dlp cannot be launched
/// - A working directory cannot be created
pub async fn check(config: &StreamGateConfig) -> anyhow::Result<()> {
    let probe = YtDlpProbe::from_config(&config.extraction);
    match probe.version().await {
        Ok(version) => println!("yt-dlp {version}"),
        Err(e) => bail!("yt-dlp is not usable ({}): {e}", probe.program()),
    }

    match config.extraction.credential_file() {
        Some(path) => println!("Credential file: {}", path.display()),
        None => println!("Credential file: none (restricted media may fail to resolve)"),
    }

    ensure_working_dirs(Path::new("."))?;
    println!("Working directories ready: {}", WORKING_DIRS.join(", "));
    info!("Setup check passed");
    Ok(())
}

fn ensure_working_dirs(root: &Path) -> anyhow::Result<()> {
    for dir in WORKING_DIRS {
        let path = root.join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}
