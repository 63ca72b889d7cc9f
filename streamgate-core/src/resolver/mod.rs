//! Fallback resolution over an ordered chain of extraction methods.
//!
//! Each method invokes the extractor once and runs the format selector over
//! whatever candidates come back. The first method that yields a selection
//! wins. Extractor failures, empty candidate sets and selections that come
//! up empty are recorded per method and never escape as errors on their own.

pub mod methods;

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

pub use methods::{CredentialPolicy, ExtractionMethod};

use crate::config::ExtractionConfig;
use crate::extractor::{MediaProbe, ProbeError};
use crate::format::FormatSelector;
use crate::media::{ResolutionRequest, ResolutionResult, ResolvedStream, TargetKind};
use crate::source::SourceId;

/// Why a single method did not produce a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MethodFailureReason {
    /// Extractor failed, timed out or returned no usable document
    #[error("{0}")]
    Upstream(ProbeError),

    #[error("No candidate formats returned")]
    NoCandidates,

    /// Candidates existed but none passed the method's eligibility filter
    #[error("No suitable formats among {candidates} candidates")]
    NoSuitableFormat { candidates: usize },
}

/// Failure record for one method attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFailure {
    pub method: &'static str,
    pub reason: MethodFailureReason,
}

impl fmt::Display for MethodFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.reason)
    }
}

/// Every method was exhausted without producing a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub source_id: SourceId,
    pub target: TargetKind,
    /// Failures in the order the methods were attempted
    pub attempts: Vec<MethodFailure>,
}

impl ResolutionFailure {
    /// Diagnostic from the last method attempted.
    pub fn message(&self) -> String {
        self.attempts
            .last()
            .map(ToString::to_string)
            .unwrap_or_else(|| "No extraction methods attempted".to_string())
    }

    /// Name of the last method attempted.
    pub fn last_method(&self) -> Option<&'static str> {
        self.attempts.last().map(|attempt| attempt.method)
    }

    /// True when the credential-authenticated attempt, or the final one,
    /// points at credential material.
    ///
    /// Diagnostics from the other methods are ignored; they never carry
    /// credentials.
    pub fn suggests_credential_problem(&self) -> bool {
        let mentions_credentials = |attempt: &MethodFailure| {
            let text = attempt.to_string().to_ascii_lowercase();
            text.contains("cookie") || text.contains("sign in")
        };

        self.attempts
            .iter()
            .filter(|attempt| attempt.method == methods::COOKIE_AUTHENTICATED)
            .chain(self.attempts.last())
            .any(mentions_credentials)
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ResolutionFailure {}

/// Runs the extraction chain for a request.
///
/// Stateless between calls: every `resolve` tries each method at most once,
/// in declared order, and stops at the first success.
#[derive(Debug, Clone)]
pub struct FallbackResolver {
    probe: Arc<dyn MediaProbe>,
    config: ExtractionConfig,
}

impl FallbackResolver {
    pub fn new(probe: Arc<dyn MediaProbe>, config: ExtractionConfig) -> Self {
        Self { probe, config }
    }

    /// Resolves with credentials attached where the method allows it.
    pub async fn resolve(&self, request: &ResolutionRequest) -> ResolutionResult {
        self.resolve_with(request, CredentialPolicy::Include).await
    }

    /// Resolves under an explicit credential policy.
    pub async fn resolve_with(
        &self,
        request: &ResolutionRequest,
        policy: CredentialPolicy,
    ) -> ResolutionResult {
        let methods = self.methods_for(request, policy);
        let source_url = request.source_id.watch_url();
        let mut attempts = Vec::with_capacity(methods.len());

        info!(
            source_id = %request.source_id,
            target = %request.target,
            quality = %request.quality,
            methods = methods.len(),
            "Resolving stream"
        );

        for method in &methods {
            debug!(source_id = %request.source_id, method = method.name, "Trying extraction method");

            match self.attempt(method, &source_url, request, policy).await {
                Ok(stream) => {
                    info!(
                        source_id = %request.source_id,
                        method = method.name,
                        format = %stream.selected_format.id,
                        "Resolved stream"
                    );
                    return ResolutionResult::Resolved(stream);
                }
                Err(failure) => {
                    warn!(source_id = %request.source_id, "{failure}");
                    attempts.push(failure);
                }
            }
        }

        let failure = ResolutionFailure {
            source_id: request.source_id.clone(),
            target: request.target,
            attempts,
        };
        warn!(source_id = %request.source_id, last = %failure, "All extraction methods failed");
        ResolutionResult::Failed(failure)
    }

    /// Methods attempted for a request, in order.
    ///
    /// Under [`CredentialPolicy::Omit`] the audio chain drops the methods
    /// that exist only to carry credentials.
    pub fn methods_for(
        &self,
        request: &ResolutionRequest,
        policy: CredentialPolicy,
    ) -> Vec<ExtractionMethod> {
        match request.target {
            TargetKind::Audio => methods::audio_chain(&self.config)
                .into_iter()
                .filter(|method| policy == CredentialPolicy::Include || !method.uses_credentials)
                .collect(),
            TargetKind::Video => vec![methods::video_method(request.quality, &self.config)],
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    async fn attempt(
        &self,
        method: &ExtractionMethod,
        source_url: &str,
        request: &ResolutionRequest,
        policy: CredentialPolicy,
    ) -> Result<ResolvedStream, MethodFailure> {
        let fail = |reason| MethodFailure {
            method: method.name,
            reason,
        };

        let options = method.probe_options(&self.config, policy);
        let document = tokio::time::timeout(options.timeout, self.probe.probe(source_url, &options))
            .await
            .unwrap_or_else(|_| Err(ProbeError::timeout(options.timeout)))
            .map_err(|e| fail(MethodFailureReason::Upstream(e)))?;

        if document.formats.is_empty() {
            return Err(fail(MethodFailureReason::NoCandidates));
        }

        let selected = FormatSelector::select(&document.formats, &method.profile).ok_or_else(|| {
            fail(MethodFailureReason::NoSuitableFormat {
                candidates: document.formats.len(),
            })
        })?;

        Ok(ResolvedStream {
            source_id: request.source_id.clone(),
            target: request.target,
            title: document.title.clone(),
            duration_seconds: document.duration,
            stream_url: selected.stream_url.clone(),
            selected_format: selected.clone(),
            method_used: method.name.to_string(),
            resolved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::extractor::{MetadataDocument, ScriptedProbe};
    use crate::format::{CandidateFormat, NO_CODEC};
    use crate::media::QualityTier;
    use super::methods::{COOKIE_AUTHENTICATED, DIRECT, GENERIC_FALLBACK, MIXED_FORMAT};

    fn format(id: &str, acodec: &str, vcodec: &str, abr: f64, height: Option<u32>) -> CandidateFormat {
        CandidateFormat {
            id: id.to_string(),
            container_ext: "webm".to_string(),
            audio_codec: Some(acodec.to_string()),
            video_codec: Some(vcodec.to_string()),
            bitrate: Some(abr),
            height,
            protocol: "https".to_string(),
            stream_url: format!("https://cdn.example/{id}"),
            ..Default::default()
        }
    }

    fn document(formats: Vec<CandidateFormat>) -> MetadataDocument {
        MetadataDocument {
            id: "abc123DEF_-".to_string(),
            title: Some("Title".to_string()),
            duration: Some(180.0),
            formats,
            ..Default::default()
        }
    }

    fn resolver(probe: &ScriptedProbe) -> FallbackResolver {
        let config = ExtractionConfig {
            credential_path: None,
            method_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        FallbackResolver::new(Arc::new(probe.clone()), config)
    }

    fn audio_request() -> ResolutionRequest {
        ResolutionRequest::audio(SourceId::from_url("abc123DEF_-").unwrap())
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let probe = ScriptedProbe::new();
        probe.push_document(document(vec![format("251", "opus", NO_CODEC, 160.0, None)]));

        let result = resolver(&probe).resolve(&audio_request()).await;

        assert!(result.is_success());
        assert_eq!(result.method_used(), Some(COOKIE_AUTHENTICATED));
        assert_eq!(probe.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_method_success_reports_mixed_format() {
        let probe = ScriptedProbe::new();
        probe
            .push_failure_message("ERROR: Sign in to confirm you're not a bot")
            .push_document(document(vec![format("18", "mp4a.40.2", "avc1", 96.0, Some(360))]));

        let result = resolver(&probe).resolve(&audio_request()).await;

        assert_eq!(result.method_used(), Some(MIXED_FORMAT));
        assert_eq!(probe.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_suitable_format_advances() {
        let probe = ScriptedProbe::new();
        // Audio-only method sees only muxed formats
        probe
            .push_document(document(vec![format("18", "mp4a.40.2", "avc1", 96.0, Some(360))]))
            .push_document(document(vec![format("18", "mp4a.40.2", "avc1", 96.0, Some(360))]));

        let result = resolver(&probe).resolve(&audio_request()).await;

        assert_eq!(result.method_used(), Some(MIXED_FORMAT));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_diagnostic() {
        let probe = ScriptedProbe::new();
        for reason in ["first", "second", "third", "ERROR: generic extractor gave up"] {
            probe.push_failure_message(reason);
        }

        let result = resolver(&probe).resolve(&audio_request()).await;
        let failure = result.clone().into_stream().unwrap_err();

        assert!(!result.is_success());
        assert_eq!(failure.attempts.len(), 4);
        assert_eq!(failure.last_method(), Some(GENERIC_FALLBACK));
        assert_eq!(
            failure.message(),
            "generic-fallback: ERROR: generic extractor gave up"
        );
        assert_eq!(probe.call_count(), 4);
    }

    #[tokio::test]
    async fn test_methods_are_tried_in_declared_order() {
        let probe = ScriptedProbe::new();
        let result = resolver(&probe).resolve(&audio_request()).await;
        let failure = result.into_stream().unwrap_err();

        let order: Vec<_> = failure.attempts.iter().map(|a| a.method).collect();
        assert_eq!(
            order,
            vec![
                COOKIE_AUTHENTICATED,
                MIXED_FORMAT,
                methods::SEGMENTED_STREAM_AUDIO,
                GENERIC_FALLBACK
            ]
        );

        let hints: Vec<_> = probe
            .calls()
            .into_iter()
            .map(|call| call.options.format_filter_hint.unwrap_or_default())
            .collect();
        assert_eq!(hints[0], "bestaudio/best");
        assert_eq!(hints[3], "best");
    }

    #[tokio::test]
    async fn test_slow_extractor_counts_as_method_failure() {
        let probe = ScriptedProbe::new().with_delay(Duration::from_secs(5));
        probe.push_document(document(vec![format("251", "opus", NO_CODEC, 160.0, None)]));

        let failure = resolver(&probe)
            .resolve(&audio_request())
            .await
            .into_stream()
            .unwrap_err();

        assert!(matches!(
            failure.attempts[0].reason,
            MethodFailureReason::Upstream(ProbeError::Timeout { .. })
        ));
        assert_eq!(failure.attempts.len(), 4);
    }

    #[tokio::test]
    async fn test_video_uses_single_direct_method() {
        let probe = ScriptedProbe::new();
        probe.push_document(document(vec![
            format("137", NO_CODEC, "avc1", 0.0, Some(1080)),
            format("135", NO_CODEC, "avc1", 0.0, Some(480)),
            format("140", "mp4a.40.2", NO_CODEC, 128.0, None),
        ]));

        let request = ResolutionRequest::video(
            SourceId::from_url("abc123DEF_-").unwrap(),
            QualityTier::Medium,
        );
        let stream = resolver(&probe)
            .resolve(&request)
            .await
            .into_stream()
            .unwrap();

        assert_eq!(stream.method_used, DIRECT);
        assert_eq!(stream.selected_format.id, "135");
        assert_eq!(stream.stream_url, "https://cdn.example/135");
    }

    #[tokio::test]
    async fn test_video_failure_is_not_retried() {
        let probe = ScriptedProbe::new();
        let request =
            ResolutionRequest::video(SourceId::from_url("abc123DEF_-").unwrap(), QualityTier::Best);

        let result = resolver(&probe).resolve(&request).await;

        assert!(!result.is_success());
        assert_eq!(probe.call_count(), 1);
    }

    #[test]
    fn test_credential_problem_detection() {
        let failure = ResolutionFailure {
            source_id: SourceId::from_url("abc123DEF_-").unwrap(),
            target: TargetKind::Audio,
            attempts: vec![MethodFailure {
                method: COOKIE_AUTHENTICATED,
                reason: MethodFailureReason::Upstream(ProbeError::Failed {
                    code: Some(1),
                    reason: "ERROR: The provided YouTube account cookies are no longer valid"
                        .to_string(),
                }),
            }],
        };

        assert!(failure.suggests_credential_problem());
    }

    #[test]
    fn test_credential_hint_from_middle_method_is_ignored() {
        let failed = |method, reason: &str| MethodFailure {
            method,
            reason: MethodFailureReason::Upstream(ProbeError::Failed {
                code: Some(1),
                reason: reason.to_string(),
            }),
        };
        let failure = ResolutionFailure {
            source_id: SourceId::from_url("abc123DEF_-").unwrap(),
            target: TargetKind::Audio,
            attempts: vec![
                failed(COOKIE_AUTHENTICATED, "ERROR: HTTP Error 403"),
                failed(MIXED_FORMAT, "ERROR: Sign in to confirm you're not a bot"),
                failed(methods::SEGMENTED_STREAM_AUDIO, "ERROR: no dash formats"),
                failed(GENERIC_FALLBACK, "ERROR: Unsupported URL"),
            ],
        };
        assert!(!failure.suggests_credential_problem());

        let mut last_mentions_cookies = failure.clone();
        last_mentions_cookies.attempts[3] =
            failed(GENERIC_FALLBACK, "ERROR: pass cookies to authenticate");
        assert!(last_mentions_cookies.suggests_credential_problem());
    }

    #[tokio::test]
    async fn test_omitted_credentials_skip_the_credential_method() {
        let probe = ScriptedProbe::new();
        let result = resolver(&probe)
            .resolve_with(&audio_request(), CredentialPolicy::Omit)
            .await;
        let failure = result.into_stream().unwrap_err();

        let order: Vec<_> = failure.attempts.iter().map(|a| a.method).collect();
        assert_eq!(
            order,
            vec![MIXED_FORMAT, methods::SEGMENTED_STREAM_AUDIO, GENERIC_FALLBACK]
        );
        assert_eq!(probe.call_count(), 3);
    }

    #[tokio::test]
    async fn test_generic_fallback_accepts_codecless_format() {
        let probe = ScriptedProbe::new();
        probe
            .push_failure_message("ERROR: first")
            .push_failure_message("ERROR: second")
            .push_failure_message("ERROR: third")
            .push_document(document(vec![CandidateFormat {
                id: "0".to_string(),
                container_ext: "mp4".to_string(),
                stream_url: "https://cdn.example/0".to_string(),
                ..Default::default()
            }]));

        let stream = resolver(&probe)
            .resolve(&audio_request())
            .await
            .into_stream()
            .unwrap();

        assert_eq!(stream.method_used, GENERIC_FALLBACK);
        assert_eq!(stream.stream_url, "https://cdn.example/0");
    }
}
