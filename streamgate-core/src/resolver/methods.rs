//! Extraction method descriptors.
//!
//! A method is plain configuration: how to invoke the extractor and which
//! candidates it accepts afterwards. The resolver iterates these in order.

use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::extractor::ProbeOptions;
use crate::format::{AudioPolicy, SelectionProfile};
use crate::media::QualityTier;

pub const COOKIE_AUTHENTICATED: &str = "cookie-authenticated";
pub const MIXED_FORMAT: &str = "mixed-format";
pub const SEGMENTED_STREAM_AUDIO: &str = "segmented-stream-audio";
pub const GENERIC_FALLBACK: &str = "generic-fallback";
pub const DIRECT: &str = "direct";

/// Streaming protocol variant targeted by the segmented-stream method.
const SEGMENTED_PROTOCOL: &str = "dash";

/// Whether credential material may be handed to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPolicy {
    /// Attach the credential file to methods that use it, when present
    #[default]
    Include,
    /// Never attach credentials
    Omit,
}

/// One named strategy for invoking the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMethod {
    pub name: &'static str,
    pub uses_credentials: bool,
    pub format_hint: String,
    pub force_generic: bool,
    pub geo_bypass: bool,
    pub profile: SelectionProfile,
    pub timeout: Duration,
    pub retries: u32,
}

impl ExtractionMethod {
    /// Builds the options bundle for one invocation of this method.
    pub fn probe_options(
        &self,
        config: &ExtractionConfig,
        policy: CredentialPolicy,
    ) -> ProbeOptions {
        let credential_path = match policy {
            CredentialPolicy::Include if self.uses_credentials => {
                config.credential_file().map(|path| path.to_path_buf())
            }
            _ => None,
        };

        ProbeOptions {
            timeout: self.timeout,
            retry_count: self.retries,
            credential_path,
            proxy: config.proxy.clone(),
            format_filter_hint: Some(self.format_hint.clone()),
            force_generic: self.force_generic,
            geo_bypass_country: if self.geo_bypass {
                config.geo_bypass_country.clone()
            } else {
                None
            },
        }
    }
}

/// Ordered audio fallback chain.
pub fn audio_chain(config: &ExtractionConfig) -> Vec<ExtractionMethod> {
    let method = |name: &'static str,
                  uses_credentials: bool,
                  hint: &str,
                  force_generic: bool,
                  policy: AudioPolicy| ExtractionMethod {
        name,
        uses_credentials,
        format_hint: hint.to_string(),
        force_generic,
        geo_bypass: false,
        profile: SelectionProfile::audio(policy),
        timeout: config.method_timeout,
        retries: config.method_retries,
    };

    vec![
        method(
            COOKIE_AUTHENTICATED,
            true,
            "bestaudio/best",
            false,
            AudioPolicy::AudioOnly,
        ),
        method(
            MIXED_FORMAT,
            false,
            "best[acodec!=none]",
            false,
            AudioPolicy::Mixed,
        ),
        method(
            SEGMENTED_STREAM_AUDIO,
            false,
            "bestaudio[protocol=dash]/bestaudio",
            false,
            AudioPolicy::Protocol(SEGMENTED_PROTOCOL.to_string()),
        ),
        method(GENERIC_FALLBACK, false, "best", true, AudioPolicy::Any),
    ]
}

/// Single best-effort video method for a quality tier.
pub fn video_method(quality: QualityTier, config: &ExtractionConfig) -> ExtractionMethod {
    ExtractionMethod {
        name: DIRECT,
        uses_credentials: true,
        format_hint: quality.format_hint(),
        force_generic: false,
        geo_bypass: true,
        profile: SelectionProfile::video(quality),
        timeout: config.video_timeout,
        retries: config.video_retries,
    }
}

/// Options for plain metadata lookups (details, format listings, search).
pub fn metadata_options(config: &ExtractionConfig) -> ProbeOptions {
    ProbeOptions {
        timeout: config.video_timeout,
        retry_count: config.method_retries,
        credential_path: config.credential_file().map(|path| path.to_path_buf()),
        proxy: config.proxy.clone(),
        format_filter_hint: None,
        force_generic: false,
        geo_bypass_country: config.geo_bypass_country.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TargetKind;

    #[test]
    fn test_audio_chain_order() {
        let names: Vec<_> = audio_chain(&ExtractionConfig::default())
            .iter()
            .map(|m| m.name)
            .collect();

        assert_eq!(
            names,
            vec![
                COOKIE_AUTHENTICATED,
                MIXED_FORMAT,
                SEGMENTED_STREAM_AUDIO,
                GENERIC_FALLBACK
            ]
        );
    }

    #[test]
    fn test_only_first_method_carries_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = dir.path().join("cookies.txt");
        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();

        let config = ExtractionConfig {
            credential_path: Some(cookies.clone()),
            ..Default::default()
        };
        let chain = audio_chain(&config);

        let first = chain[0].probe_options(&config, CredentialPolicy::Include);
        assert_eq!(first.credential_path.as_deref(), Some(cookies.as_path()));

        let omitted = chain[0].probe_options(&config, CredentialPolicy::Omit);
        assert!(omitted.credential_path.is_none());

        for method in &chain[1..] {
            let options = method.probe_options(&config, CredentialPolicy::Include);
            assert!(options.credential_path.is_none(), "{}", method.name);
        }
    }

    #[test]
    fn test_missing_credential_file_is_not_attached() {
        let config = ExtractionConfig {
            credential_path: Some("/nonexistent/cookies.txt".into()),
            ..Default::default()
        };
        let options = audio_chain(&config)[0].probe_options(&config, CredentialPolicy::Include);
        assert!(options.credential_path.is_none());
    }

    #[test]
    fn test_generic_fallback_forces_generic_extractor() {
        let chain = audio_chain(&ExtractionConfig::default());
        let generic = &chain[3];

        assert!(generic.force_generic);
        assert_eq!(generic.format_hint, "best");
        assert_eq!(generic.profile.audio_policy, AudioPolicy::Any);
        assert!(chain[..3].iter().all(|m| !m.force_generic));
    }

    #[test]
    fn test_video_method_uses_tier_hint_and_video_budget() {
        let config = ExtractionConfig::default();
        let method = video_method(QualityTier::Medium, &config);

        assert_eq!(method.format_hint, "best[height<=480]");
        assert_eq!(method.profile.target, TargetKind::Video);
        assert_eq!(method.timeout, config.video_timeout);
        assert_eq!(method.retries, 10);

        let options = method.probe_options(&config, CredentialPolicy::Include);
        assert_eq!(options.geo_bypass_country.as_deref(), Some("IN"));
    }
}
