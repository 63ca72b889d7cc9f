//! Format selection over extractor candidates.
//!
//! Selection is a pure function of the candidate slice and the profile:
//! eligibility filtering first, then a stable descending sort on the
//! profile's ranking key. Ties keep extractor order, so the same input
//! always yields the same pick.

use std::cmp::Ordering;

use super::CandidateFormat;
use crate::media::{QualityTier, TargetKind};

/// Which formats an audio extraction method is willing to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPolicy {
    /// Audio present, video codec explicitly `none`
    AudioOnly,
    /// Any format not explicitly lacking audio, combined audio+video included
    Mixed,
    /// Audio-only formats whose protocol or note names the given variant
    Protocol(String),
    /// Every candidate, ranked on the audio key
    Any,
}

/// Target profile a candidate set is scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionProfile {
    pub target: TargetKind,
    pub quality: QualityTier,
    pub audio_policy: AudioPolicy,
}

impl SelectionProfile {
    pub fn audio(audio_policy: AudioPolicy) -> Self {
        Self {
            target: TargetKind::Audio,
            quality: QualityTier::Best,
            audio_policy,
        }
    }

    pub fn video(quality: QualityTier) -> Self {
        Self {
            target: TargetKind::Video,
            quality,
            audio_policy: AudioPolicy::Mixed,
        }
    }
}

/// Scores and ranks candidate formats for a target profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatSelector;

impl FormatSelector {
    /// Returns the best eligible candidate, or `None` if nothing survives filtering.
    pub fn select<'a>(
        candidates: &'a [CandidateFormat],
        profile: &SelectionProfile,
    ) -> Option<&'a CandidateFormat> {
        Self::rank(candidates, profile).into_iter().next()
    }

    /// Checks a single candidate against the profile's eligibility filter.
    pub fn is_eligible(format: &CandidateFormat, profile: &SelectionProfile) -> bool {
        match profile.target {
            TargetKind::Video => format.has_video(),
            TargetKind::Audio => match &profile.audio_policy {
                AudioPolicy::AudioOnly => format.is_audio_only(),
                AudioPolicy::Mixed => format.may_have_audio(),
                AudioPolicy::Protocol(variant) => {
                    format.is_audio_only() && names_variant(format, variant)
                }
                AudioPolicy::Any => true,
            },
        }
    }

    /// Returns eligible candidates, best first.
    ///
    /// For video targets only candidates at or under the tier's height
    /// ceiling are ranked; when none fit, every video candidate is ranked.
    pub fn rank<'a>(
        candidates: &'a [CandidateFormat],
        profile: &SelectionProfile,
    ) -> Vec<&'a CandidateFormat> {
        let eligible: Vec<&CandidateFormat> = candidates
            .iter()
            .filter(|format| Self::is_eligible(format, profile))
            .collect();

        let mut pool = match profile.target {
            TargetKind::Audio => eligible,
            TargetKind::Video => {
                let ceiling = profile.quality.max_height();
                let within: Vec<&CandidateFormat> = eligible
                    .iter()
                    .copied()
                    .filter(|format| format.height.unwrap_or(0) <= ceiling)
                    .collect();
                if within.is_empty() { eligible } else { within }
            }
        };

        // sort_by is stable: equal keys keep extractor order
        let target = profile.target;
        pool.sort_by(|a, b| compare_keys(&ranking_key(b, target), &ranking_key(a, target)));
        pool
    }
}

fn names_variant(format: &CandidateFormat, variant: &str) -> bool {
    let variant = variant.to_ascii_lowercase();
    format.protocol.to_ascii_lowercase().contains(&variant)
        || format
            .format_note
            .as_deref()
            .is_some_and(|note| note.to_ascii_lowercase().contains(&variant))
}

/// Missing values rank as zero; they are never written back into the format.
fn ranking_key(format: &CandidateFormat, target: TargetKind) -> [f64; 3] {
    match target {
        TargetKind::Audio => [
            format.ranking_bitrate(),
            format.sample_rate.unwrap_or(0) as f64,
            format.filesize.unwrap_or(0) as f64,
        ],
        TargetKind::Video => [
            format.height.unwrap_or(0) as f64,
            format.width.unwrap_or(0) as f64,
            format.frame_rate.unwrap_or(0.0),
        ],
    }
}

fn compare_keys(a: &[f64; 3], b: &[f64; 3]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::format::NO_CODEC;

    fn audio(id: &str, abr: Option<f64>, asr: Option<u32>, video: &str) -> CandidateFormat {
        CandidateFormat {
            id: id.to_string(),
            container_ext: "m4a".to_string(),
            audio_codec: Some("mp4a.40.2".to_string()),
            video_codec: Some(video.to_string()),
            bitrate: abr,
            sample_rate: asr,
            protocol: "https".to_string(),
            stream_url: format!("https://cdn.example/{id}"),
            ..Default::default()
        }
    }

    fn video(id: &str, height: Option<u32>, width: Option<u32>, fps: Option<f64>) -> CandidateFormat {
        CandidateFormat {
            id: id.to_string(),
            container_ext: "mp4".to_string(),
            audio_codec: Some(NO_CODEC.to_string()),
            video_codec: Some("avc1.64001F".to_string()),
            height,
            width,
            frame_rate: fps,
            protocol: "https".to_string(),
            stream_url: format!("https://cdn.example/{id}"),
            ..Default::default()
        }
    }

    #[test]
    fn test_audio_prefers_highest_bitrate() {
        let candidates = vec![
            audio("140", Some(128.0), Some(44100), NO_CODEC),
            audio("251", Some(160.0), Some(48000), NO_CODEC),
            audio("139", Some(48.0), Some(22050), NO_CODEC),
        ];

        let selected =
            FormatSelector::select(&candidates, &SelectionProfile::audio(AudioPolicy::AudioOnly));
        assert_eq!(selected.map(|f| f.id.as_str()), Some("251"));
    }

    #[test]
    fn test_audio_tie_breaks_on_sample_rate_then_size() {
        let mut low_size = audio("a", Some(128.0), Some(48000), NO_CODEC);
        low_size.filesize = Some(1_000);
        let mut high_size = audio("b", Some(128.0), Some(48000), NO_CODEC);
        high_size.filesize = Some(2_000);
        let low_rate = audio("c", Some(128.0), Some(44100), NO_CODEC);

        let candidates = vec![low_rate, low_size, high_size];
        let ranked = FormatSelector::rank(&candidates, &SelectionProfile::audio(AudioPolicy::AudioOnly));
        let ids: Vec<&str> = ranked.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_audio_only_policy_rejects_muxed_formats() {
        let candidates = vec![audio("18", Some(96.0), Some(44100), "avc1.42001E")];

        assert!(
            FormatSelector::select(&candidates, &SelectionProfile::audio(AudioPolicy::AudioOnly))
                .is_none()
        );
        assert_eq!(
            FormatSelector::select(&candidates, &SelectionProfile::audio(AudioPolicy::Mixed))
                .map(|f| f.id.as_str()),
            Some("18")
        );
    }

    #[test]
    fn test_unreported_codecs_are_eligible_for_mixed_only() {
        let unknown = |id: &str, abr: f64, asr: u32| CandidateFormat {
            id: id.to_string(),
            bitrate: Some(abr),
            sample_rate: Some(asr),
            stream_url: format!("https://cdn.example/{id}"),
            ..Default::default()
        };
        let candidates = vec![unknown("low", 128.0, 44_100), unknown("high", 192.0, 48_000)];

        let mixed = FormatSelector::select(&candidates, &SelectionProfile::audio(AudioPolicy::Mixed));
        assert_eq!(mixed.map(|f| f.id.as_str()), Some("high"));
        assert!(
            FormatSelector::select(&candidates, &SelectionProfile::audio(AudioPolicy::AudioOnly))
                .is_none()
        );
    }

    #[test]
    fn test_mixed_rejects_explicitly_silent_formats() {
        let silent = video("137", Some(1080), Some(1920), None);
        assert!(
            FormatSelector::select(&[silent], &SelectionProfile::audio(AudioPolicy::Mixed)).is_none()
        );
    }

    #[test]
    fn test_any_policy_accepts_every_candidate() {
        let bare = CandidateFormat {
            id: "0".to_string(),
            stream_url: "https://cdn.example/0".to_string(),
            ..Default::default()
        };
        let silent = video("137", Some(1080), Some(1920), None);
        let candidates = vec![bare, silent, audio("140", Some(128.0), Some(44100), NO_CODEC)];

        let profile = SelectionProfile::audio(AudioPolicy::Any);
        let ranked = FormatSelector::rank(&candidates, &profile);
        let ids: Vec<&str> = ranked.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["140", "0", "137"]);
    }

    #[test]
    fn test_protocol_policy_matches_protocol_or_note() {
        let mut dash_note = audio("140", Some(128.0), Some(44100), NO_CODEC);
        dash_note.format_note = Some("medium, DASH audio".to_string());
        let mut dash_protocol = audio("599", Some(31.0), Some(22050), NO_CODEC);
        dash_protocol.protocol = "http_dash_segments".to_string();
        let plain = audio("251", Some(160.0), Some(48000), NO_CODEC);

        let candidates = vec![plain, dash_protocol, dash_note];
        let profile = SelectionProfile::audio(AudioPolicy::Protocol("dash".to_string()));
        let ranked = FormatSelector::rank(&candidates, &profile);
        let ids: Vec<&str> = ranked.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["140", "599"]);
    }

    #[test]
    fn test_video_respects_tier_ceiling() {
        let candidates = vec![
            video("137", Some(1080), Some(1920), Some(30.0)),
            video("136", Some(720), Some(1280), Some(30.0)),
            video("298", Some(720), Some(1280), Some(60.0)),
            video("135", Some(480), Some(854), Some(30.0)),
        ];

        let pick = |tier| {
            FormatSelector::select(&candidates, &SelectionProfile::video(tier)).map(|f| f.id.clone())
        };
        assert_eq!(pick(QualityTier::Best).as_deref(), Some("137"));
        assert_eq!(pick(QualityTier::High).as_deref(), Some("298"));
        assert_eq!(pick(QualityTier::Medium).as_deref(), Some("135"));
    }

    #[test]
    fn test_video_falls_back_to_overall_best_above_ceiling() {
        let candidates = vec![
            video("hd", Some(720), Some(1280), None),
            video("fhd", Some(1080), Some(1920), None),
        ];

        let selected = FormatSelector::select(&candidates, &SelectionProfile::video(QualityTier::Low));
        assert_eq!(selected.map(|f| f.id.as_str()), Some("fhd"));
    }

    #[test]
    fn test_video_never_returns_audio_only() {
        let candidates = vec![audio("140", Some(128.0), Some(44100), NO_CODEC)];
        assert!(
            FormatSelector::select(&candidates, &SelectionProfile::video(QualityTier::Best))
                .is_none()
        );
    }

    #[test]
    fn test_empty_candidates_select_nothing() {
        assert!(
            FormatSelector::select(&[], &SelectionProfile::audio(AudioPolicy::Mixed)).is_none()
        );
    }

    fn arb_codec() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(NO_CODEC.to_string())),
            Just(Some("opus".to_string())),
            Just(Some("avc1".to_string())),
        ]
    }

    fn arb_format() -> impl Strategy<Value = CandidateFormat> {
        (
            arb_codec(),
            arb_codec(),
            proptest::option::of(0.0f64..512.0),
            proptest::option::of(0u32..2160),
            proptest::option::of(0u32..96_000),
            "[a-z0-9]{1,4}",
        )
            .prop_map(|(audio_codec, video_codec, bitrate, height, sample_rate, id)| {
                CandidateFormat {
                    id,
                    audio_codec,
                    video_codec,
                    bitrate,
                    height,
                    sample_rate,
                    ..Default::default()
                }
            })
    }

    fn arb_profile() -> impl Strategy<Value = SelectionProfile> {
        prop_oneof![
            Just(SelectionProfile::audio(AudioPolicy::AudioOnly)),
            Just(SelectionProfile::audio(AudioPolicy::Mixed)),
            Just(SelectionProfile::audio(AudioPolicy::Any)),
            Just(SelectionProfile::video(QualityTier::Low)),
            Just(SelectionProfile::video(QualityTier::Best)),
        ]
    }

    proptest! {
        #[test]
        fn prop_selection_is_deterministic(
            candidates in proptest::collection::vec(arb_format(), 0..12),
            profile in arb_profile(),
        ) {
            let first = FormatSelector::select(&candidates, &profile).cloned();
            let second = FormatSelector::select(&candidates, &profile).cloned();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_selection_is_always_eligible(
            candidates in proptest::collection::vec(arb_format(), 0..12),
            profile in arb_profile(),
        ) {
            if let Some(selected) = FormatSelector::select(&candidates, &profile) {
                prop_assert!(FormatSelector::is_eligible(selected, &profile));
                if profile.target == TargetKind::Video {
                    prop_assert!(selected.has_video());
                }
            } else {
                prop_assert!(!candidates.iter().any(|f| FormatSelector::is_eligible(f, &profile)));
            }
        }
    }
}
