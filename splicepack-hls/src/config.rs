//! Per-job playlist parameters and stream media info.

use serde::{Deserialize, Serialize};

use crate::error::{HlsError, Result};

/// Playlist kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HlsPlaylistType {
    /// Complete, immutable playlist; gets EXT-X-ENDLIST.
    #[default]
    Vod,
    /// Growing playlist that never removes segments.
    Event,
    /// Live playlist with a sliding window.
    Live,
}

/// Per-job HLS parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsParams {
    /// Playlist kind.
    pub playlist_type: HlsPlaylistType,
    /// Live-window retention in seconds; 0 disables the sliding window.
    pub time_shift_buffer_depth: f64,
    /// How many segment files to keep on disk after they leave the live
    /// window; 0 disables segment deletion entirely.
    pub preserved_segments_outside_live_window: usize,
    /// Target segment duration in seconds, used to size the bandwidth
    /// estimator window.
    pub target_segment_duration: f64,
    /// Language to assume for streams that do not declare one.
    pub default_language: Option<String>,
    /// Project URL for the generated-with comment line.
    pub project_url: Option<String>,
    /// Version string for the generated-with comment line.
    pub version: Option<String>,
}

impl Default for HlsParams {
    fn default() -> Self {
        Self {
            playlist_type: HlsPlaylistType::Vod,
            time_shift_buffer_depth: 0.0,
            preserved_segments_outside_live_window: 0,
            target_segment_duration: 6.0,
            default_language: None,
            project_url: None,
            version: None,
        }
    }
}

impl HlsParams {
    /// Create default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the playlist kind.
    pub fn with_playlist_type(mut self, playlist_type: HlsPlaylistType) -> Self {
        self.playlist_type = playlist_type;
        self
    }

    /// Set the live-window retention.
    pub fn with_time_shift_buffer_depth(mut self, depth: f64) -> Self {
        self.time_shift_buffer_depth = depth;
        self
    }

    /// Set how many expired segment files to preserve.
    pub fn with_preserved_segments(mut self, count: usize) -> Self {
        self.preserved_segments_outside_live_window = count;
        self
    }

    /// Set the target segment duration.
    pub fn with_target_segment_duration(mut self, duration: f64) -> Self {
        self.target_segment_duration = duration;
        self
    }

    /// Set the generated-with comment.
    pub fn with_version(mut self, project_url: impl Into<String>, version: impl Into<String>) -> Self {
        self.project_url = Some(project_url.into());
        self.version = Some(version.into());
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        if self.target_segment_duration <= 0.0 {
            return Err(HlsError::InvalidConfig(
                "target segment duration must be positive".into(),
            ));
        }
        if self.time_shift_buffer_depth < 0.0 {
            return Err(HlsError::InvalidConfig(
                "time shift buffer depth cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Video stream properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Clock rate of video timestamps.
    pub time_scale: u32,
    /// Codec string.
    pub codec: String,
    /// Frame duration in time-scale units; 0 when unknown.
    pub frame_duration: u64,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Pixel aspect numerator.
    pub pixel_width: u32,
    /// Pixel aspect denominator.
    pub pixel_height: u32,
    /// Transfer characteristics per ISO 23001-8; 0 when unknown.
    pub transfer_characteristics: u8,
}

/// Audio stream properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Clock rate of audio timestamps.
    pub time_scale: u32,
    /// Codec string.
    pub codec: String,
    /// Language tag.
    pub language: Option<String>,
    /// Channel count.
    pub channels: u32,
}

/// Text stream properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextInfo {
    /// Codec string.
    pub codec: String,
    /// Language tag.
    pub language: Option<String>,
}

/// Everything a playlist needs to know about its stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Overrides the per-kind time scales when set.
    pub reference_time_scale: Option<u32>,
    /// Video properties; presence marks the stream as video.
    pub video: Option<VideoInfo>,
    /// Audio properties; presence marks the stream as audio.
    pub audio: Option<AudioInfo>,
    /// Text properties; a stream with neither video nor audio is a subtitle
    /// stream.
    pub text: Option<TextInfo>,
    /// Declared bandwidth; overrides the estimator when set.
    pub bandwidth: Option<u64>,
    /// Init segment URL for EXT-X-MAP.
    pub init_segment_url: Option<String>,
    /// Single-file media URL, used with `init_range` for EXT-X-MAP.
    pub media_file_url: Option<String>,
    /// Inclusive byte range of the init data inside `media_file_url`.
    pub init_range: Option<(u64, u64)>,
    /// Segment naming template; absence puts the playlist in byte-range
    /// mode.
    pub segment_template: Option<String>,
    /// HLS CHARACTERISTICS values.
    pub characteristics: Vec<String>,
}

impl MediaInfo {
    /// Resolve the stream's time scale: reference, then video, then audio.
    pub fn time_scale(&self) -> Option<u32> {
        if let Some(scale) = self.reference_time_scale {
            return Some(scale).filter(|&s| s != 0);
        }
        if let Some(video) = &self.video {
            return Some(video.time_scale).filter(|&s| s != 0);
        }
        if let Some(audio) = &self.audio {
            return Some(audio.time_scale).filter(|&s| s != 0);
        }
        None
    }

    /// The stream's language, if declared.
    pub fn language(&self) -> Option<&str> {
        if let Some(audio) = &self.audio {
            return audio.language.as_deref();
        }
        if let Some(text) = &self.text {
            return text.language.as_deref();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_scale_resolution_order() {
        let mut info = MediaInfo {
            video: Some(VideoInfo {
                time_scale: 90_000,
                ..VideoInfo::default()
            }),
            audio: Some(AudioInfo {
                time_scale: 48_000,
                ..AudioInfo::default()
            }),
            ..MediaInfo::default()
        };
        assert_eq!(info.time_scale(), Some(90_000));

        info.reference_time_scale = Some(1_000);
        assert_eq!(info.time_scale(), Some(1_000));

        let text_only = MediaInfo {
            text: Some(TextInfo::default()),
            ..MediaInfo::default()
        };
        assert_eq!(text_only.time_scale(), None);
    }

    #[test]
    fn test_params_validation() {
        assert!(HlsParams::default().validate().is_ok());

        let bad = HlsParams::default().with_target_segment_duration(0.0);
        assert!(bad.validate().is_err());
    }
}
