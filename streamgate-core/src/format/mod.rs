//! Candidate format descriptors and the format selector.

pub mod selector;

use serde::{Deserialize, Serialize};

pub use selector::{AudioPolicy, FormatSelector, SelectionProfile};

/// Codec value the extractor uses to mark an absent stream.
pub const NO_CODEC: &str = "none";

/// One concrete encoding of a media item as offered by the extractor.
///
/// Produced only by the extractor and never mutated afterwards. Numeric
/// fields stay `None` when the extractor does not report them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFormat {
    pub id: String,
    pub container_ext: String,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    /// Audio bitrate in kbps
    pub bitrate: Option<f64>,
    /// Total (audio + video) bitrate in kbps
    pub total_bitrate: Option<f64>,
    pub sample_rate: Option<u32>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub frame_rate: Option<f64>,
    pub filesize: Option<u64>,
    pub protocol: String,
    pub stream_url: String,
    pub format_note: Option<String>,
}

impl CandidateFormat {
    /// True when the format carries an audio stream.
    pub fn has_audio(&self) -> bool {
        is_present(self.audio_codec.as_deref())
    }

    /// True when the format carries a video stream.
    pub fn has_video(&self) -> bool {
        is_present(self.video_codec.as_deref())
    }

    /// False only when the extractor explicitly reports no audio stream.
    ///
    /// An unreported codec is unknown, so the format may still carry audio.
    pub fn may_have_audio(&self) -> bool {
        self.audio_codec.as_deref() != Some(NO_CODEC)
    }

    /// Audio present and video explicitly absent.
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && self.video_codec.as_deref() == Some(NO_CODEC)
    }

    /// Audio bitrate, falling back to total bitrate. Zero when neither is known.
    pub fn ranking_bitrate(&self) -> f64 {
        self.bitrate
            .filter(|abr| *abr > 0.0)
            .or(self.total_bitrate)
            .unwrap_or(0.0)
    }

    /// `WIDTHxHEIGHT`, `audio only`, or `N/A`.
    pub fn resolution_label(&self) -> String {
        match (self.width, self.height) {
            (Some(width), Some(height)) => format!("{width}x{height}"),
            (None, Some(height)) => format!("{height}p"),
            _ if self.is_audio_only() => "audio only".to_string(),
            _ => "N/A".to_string(),
        }
    }

    /// Audio codec with the `none` sentinel made explicit.
    pub fn audio_codec_label(&self) -> &str {
        self.audio_codec.as_deref().unwrap_or(NO_CODEC)
    }

    /// Video codec with the `none` sentinel made explicit.
    pub fn video_codec_label(&self) -> &str {
        self.video_codec.as_deref().unwrap_or(NO_CODEC)
    }
}

// Unknown codecs do not count as present
fn is_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(value) if !value.is_empty() && value != NO_CODEC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_presence() {
        let audio_only = CandidateFormat {
            audio_codec: Some("opus".to_string()),
            video_codec: Some(NO_CODEC.to_string()),
            ..Default::default()
        };
        assert!(audio_only.has_audio());
        assert!(!audio_only.has_video());
        assert!(audio_only.is_audio_only());

        let unknown = CandidateFormat::default();
        assert!(!unknown.has_audio());
        assert!(!unknown.has_video());
        assert!(!unknown.is_audio_only());
        assert!(unknown.may_have_audio());

        let silent = CandidateFormat {
            audio_codec: Some(NO_CODEC.to_string()),
            ..Default::default()
        };
        assert!(!silent.may_have_audio());
    }

    #[test]
    fn test_ranking_bitrate_falls_back_to_total() {
        let format = CandidateFormat {
            bitrate: Some(0.0),
            total_bitrate: Some(320.5),
            ..Default::default()
        };
        assert_eq!(format.ranking_bitrate(), 320.5);
        assert_eq!(CandidateFormat::default().ranking_bitrate(), 0.0);
    }

    #[test]
    fn test_resolution_label() {
        let video = CandidateFormat {
            width: Some(1280),
            height: Some(720),
            ..Default::default()
        };
        assert_eq!(video.resolution_label(), "1280x720");
        assert_eq!(CandidateFormat::default().resolution_label(), "N/A");
    }
}
