//! yt-dlp process backend.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{MediaProbe, MetadataDocument, ProbeError, ProbeOptions, SearchEntry};
use crate::config::ExtractionConfig;

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_DIAGNOSTIC_LEN: usize = 300;

/// Runs the yt-dlp binary once per probe.
///
/// The child is spawned with `kill_on_drop`, so a timed-out or abandoned
/// probe never leaves a process behind.
#[derive(Debug, Clone)]
pub struct YtDlpProbe {
    program: String,
}

impl YtDlpProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.ytdlp_path.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command-line arguments for a metadata probe.
    pub fn build_args(source_url: &str, options: &ProbeOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--no-playlist",
            "--no-warnings",
            "--skip-download",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        push_common_args(&mut args, options);

        if let Some(hint) = &options.format_filter_hint {
            args.push("--format".to_string());
            args.push(hint.clone());
        }

        if options.force_generic {
            args.push("--force-generic-extractor".to_string());
        }

        args.push(source_url.to_string());
        args
    }

    /// Command-line arguments for a flat keyword search.
    pub fn build_search_args(query: &str, limit: usize, options: &ProbeOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            "--flat-playlist",
            "--dump-single-json",
            "--no-warnings",
            "--skip-download",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        push_common_args(&mut args, options);
        args.push(format!("ytsearch{limit}:{query}"));
        args
    }

    async fn run(&self, args: Vec<String>, timeout: Duration) -> Result<Output, ProbeError> {
        debug!(program = %self.program, args = ?args, "Running extractor");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Launch {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(program = %self.program, ?timeout, "Extractor timed out");
                ProbeError::timeout(timeout)
            })?
            .map_err(|e| ProbeError::Launch {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(ProbeError::Failed {
                code: output.status.code(),
                reason: summarize_stderr(&output.stderr),
            })
        }
    }
}

#[async_trait]
impl MediaProbe for YtDlpProbe {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(
        &self,
        source_url: &str,
        options: &ProbeOptions,
    ) -> Result<MetadataDocument, ProbeError> {
        let output = self
            .run(Self::build_args(source_url, options), options.timeout)
            .await?;
        MetadataDocument::from_json(&output.stdout)
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        options: &ProbeOptions,
    ) -> Result<Vec<SearchEntry>, ProbeError> {
        let output = self
            .run(
                Self::build_search_args(query, limit, options),
                options.timeout,
            )
            .await?;
        let mut entries = SearchEntry::list_from_json(&output.stdout)?;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn version(&self) -> Result<String, ProbeError> {
        let output = self
            .run(vec!["--version".to_string()], VERSION_TIMEOUT)
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn push_common_args(args: &mut Vec<String>, options: &ProbeOptions) {
    args.push("--socket-timeout".to_string());
    args.push(options.timeout.as_secs().max(1).to_string());
    args.push("--retries".to_string());
    args.push(options.retry_count.to_string());

    if let Some(path) = &options.credential_path {
        args.push("--cookies".to_string());
        args.push(path.display().to_string());
    }

    if let Some(proxy) = &options.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    if let Some(country) = &options.geo_bypass_country {
        args.push("--geo-bypass-country".to_string());
        args.push(country.clone());
    }
}

/// Picks the most useful line of extractor stderr.
///
/// yt-dlp prefixes fatal diagnostics with `ERROR:`; the last such line wins.
/// Otherwise the last non-empty line is used.
fn summarize_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let line = lines
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .copied()
        .unwrap_or("extractor exited without a diagnostic");

    line.chars().take(MAX_DIAGNOSTIC_LEN).collect()
}
