//! Resolution pipeline service.
//!
//! Owns the result caches and the fallback resolver. Callers hand it a
//! validated request; it answers from cache when it can and runs the
//! extraction chain otherwise. Only successful results are cached, and only
//! once a resolution has actually completed, so an abandoned request never
//! leaves an entry behind.
//!
//! Concurrent misses for the same key each run the chain; no in-flight
//! deduplication is attempted.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::catalog::{FormatListing, MediaDetails, SearchHit, SearchResults};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, ExtractionConfig, StreamGateConfig};
use crate::extractor::{MediaProbe, MetadataDocument, ProbeError};
use crate::media::{ResolutionRequest, ResolutionResult, ResolvedStream, TargetKind};
use crate::resolver::{CredentialPolicy, FallbackResolver, methods};
use crate::source::SourceId;
use crate::{Result, StreamGateError};

const MIN_QUERY_LEN: usize = 2;
const MAX_SEARCH_LIMIT: usize = 50;

/// Cache statistics per keyspace family.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub streams: CacheStats,
    pub details: CacheStats,
    pub searches: CacheStats,
}

impl ServiceStats {
    /// Entries held across every cache.
    pub fn total_entries(&self) -> usize {
        self.streams.entries + self.details.entries + self.searches.entries
    }
}

/// Cache-fronted resolution pipeline.
#[derive(Debug)]
pub struct StreamService {
    resolver: FallbackResolver,
    probe: Arc<dyn MediaProbe>,
    extraction: ExtractionConfig,
    streams: ResultCache<ResolvedStream>,
    details: ResultCache<MediaDetails>,
    searches: ResultCache<SearchResults>,
}

impl StreamService {
    pub fn new(config: &StreamGateConfig, probe: Arc<dyn MediaProbe>) -> Self {
        Self::with_clock(config, probe, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &StreamGateConfig,
        probe: Arc<dyn MediaProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver: FallbackResolver::new(Arc::clone(&probe), config.extraction.clone()),
            probe,
            extraction: config.extraction.clone(),
            streams: new_cache(&config.cache, &clock),
            details: new_cache(&config.cache, &clock),
            searches: new_cache(&config.cache, &clock),
        }
    }

    /// Resolves a request through the generic keyspace.
    ///
    /// # Errors
    /// - `StreamGateError::Resolution` - Every extraction method failed
    pub async fn resolve_stream(&self, request: &ResolutionRequest) -> Result<ResolvedStream> {
        let key = CacheKey::for_request(request).to_string();
        self.cached_resolution(&key, request, false).await
    }

    /// Resolves an audio stream through the audio keyspace.
    ///
    /// When the credential-authenticated attempt or the final attempt points
    /// at the credential file, the chain is run once more without the
    /// credential method.
    ///
    /// # Errors
    /// - `StreamGateError::Resolution` - Every extraction method failed
    pub async fn resolve_audio(
        &self,
        source_id: &SourceId,
        force_refresh: bool,
    ) -> Result<ResolvedStream> {
        let request = ResolutionRequest::audio(source_id.clone()).with_force_refresh(force_refresh);
        let key = CacheKey::Audio {
            source_id: source_id.clone(),
        }
        .to_string();
        self.cached_resolution(&key, &request, true).await
    }

    async fn cached_resolution(
        &self,
        key: &str,
        request: &ResolutionRequest,
        retry_without_credentials: bool,
    ) -> Result<ResolvedStream> {
        if !request.force_refresh {
            if let Some(stream) = self.streams.get(key) {
                info!(key, method = %stream.method_used, "Serving cached stream");
                return Ok(stream);
            }
        } else {
            debug!(key, "Cache bypassed by force refresh");
        }

        let mut result = self.resolver.resolve(request).await;

        if retry_without_credentials && request.target == TargetKind::Audio {
            if let ResolutionResult::Failed(failure) = &result {
                if self.extraction.credential_file().is_some()
                    && failure.suggests_credential_problem()
                {
                    info!(source_id = %request.source_id, "Retrying without credentials");
                    result = self
                        .resolver
                        .resolve_with(request, CredentialPolicy::Omit)
                        .await;
                }
            }
        }

        match result {
            ResolutionResult::Resolved(stream) => {
                self.streams.set(key, stream.clone());
                Ok(stream)
            }
            ResolutionResult::Failed(failure) => Err(StreamGateError::Resolution(failure)),
        }
    }

    /// Returns descriptive metadata, cached under `info:{id}`.
    ///
    /// # Errors
    /// - `StreamGateError::Probe` - Extractor failed or timed out
    pub async fn describe(&self, source_id: &SourceId) -> Result<MediaDetails> {
        let key = CacheKey::Details {
            source_id: source_id.clone(),
        }
        .to_string();

        if let Some(details) = self.details.get(&key) {
            return Ok(details);
        }

        let document = self.fetch_document(source_id).await?;
        let details = MediaDetails::from_document(source_id.clone(), &document);
        self.details.set(key, details.clone());
        Ok(details)
    }

    /// Lists every format of known size. Not cached.
    ///
    /// # Errors
    /// - `StreamGateError::Probe` - Extractor failed or timed out
    pub async fn list_formats(&self, source_id: &SourceId) -> Result<FormatListing> {
        let document = self.fetch_document(source_id).await?;
        Ok(FormatListing::from_document(source_id.clone(), &document))
    }

    /// Keyword search, cached under `search:{query}:{limit}`.
    ///
    /// Short queries and extractor failures produce an unsuccessful result
    /// rather than an error.
    ///
    /// # Errors
    /// - `StreamGateError::Validation` - `limit` outside `1..=50`
    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(StreamGateError::validation(format!(
                "limit must be between 1 and {MAX_SEARCH_LIMIT}"
            )));
        }

        if query.trim().chars().count() < MIN_QUERY_LEN {
            return Ok(SearchResults::failed(query, "Search query too short"));
        }

        let key = CacheKey::Search {
            query: query.to_string(),
            limit,
        }
        .to_string();

        if let Some(results) = self.searches.get(&key) {
            return Ok(results);
        }

        let options = methods::metadata_options(&self.extraction);
        let outcome = tokio::time::timeout(options.timeout, self.probe.search(query, limit, &options))
            .await
            .unwrap_or_else(|_| Err(ProbeError::timeout(options.timeout)));

        match outcome {
            Ok(entries) => {
                let hits: Vec<SearchHit> = entries.into_iter().take(limit).map(SearchHit::from).collect();
                let results = SearchResults::new(query, hits);
                self.searches.set(key, results.clone());
                Ok(results)
            }
            Err(e) => {
                warn!(query, error = %e, "Search failed");
                Ok(SearchResults::failed(query, e.to_string()))
            }
        }
    }

    /// Drops every cached entry.
    pub fn clear_caches(&self) {
        self.streams.clear();
        self.details.clear();
        self.searches.clear();
        info!("Caches cleared");
    }

    /// Removes expired entries from every cache.
    pub fn purge_expired(&self) -> usize {
        self.streams.purge_expired() + self.details.purge_expired() + self.searches.purge_expired()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            streams: self.streams.stats(),
            details: self.details.stats(),
            searches: self.searches.stats(),
        }
    }

    pub fn probe(&self) -> &Arc<dyn MediaProbe> {
        &self.probe
    }

    async fn fetch_document(&self, source_id: &SourceId) -> Result<MetadataDocument> {
        let options = methods::metadata_options(&self.extraction);
        let document = tokio::time::timeout(
            options.timeout,
            self.probe.probe(&source_id.watch_url(), &options),
        )
        .await
        .unwrap_or_else(|_| Err(ProbeError::timeout(options.timeout)))?;
        Ok(document)
    }
}

fn new_cache<V: Clone>(config: &CacheConfig, clock: &Arc<dyn Clock>) -> ResultCache<V> {
    ResultCache::with_clock(config.max_entries, config.ttl, Arc::clone(clock))
}
