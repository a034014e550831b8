//! Stream descriptors and sample records.
//!
//! These are the packager-side views of elementary streams: enough metadata
//! to classify a stream and enough per-sample timing to align cues and build
//! playlist entries, without carrying payload bytes around.

use crate::time::TimeScale;

/// The kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Audio stream.
    Audio,
    /// Video stream.
    Video,
    /// Text (subtitle or caption) stream.
    Text,
}

/// Immutable description of one input stream.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream kind.
    pub stream_type: StreamType,
    /// Clock rate for this stream's timestamps.
    pub time_scale: TimeScale,
    /// Codec string (e.g. "avc1.64001f", "mp4a.40.2").
    pub codec: String,
    /// Language tag, if known.
    pub language: Option<String>,
}

impl StreamInfo {
    /// Create a stream descriptor.
    pub fn new(stream_type: StreamType, time_scale: TimeScale, codec: impl Into<String>) -> Self {
        Self {
            stream_type,
            time_scale,
            codec: codec.into(),
            language: None,
        }
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// One audio or video sample as seen by the packager.
#[derive(Debug, Clone, Copy)]
pub struct MediaSample {
    /// Presentation timestamp in stream clock units.
    pub pts: i64,
    /// Duration in stream clock units.
    pub duration: i64,
    /// Whether this sample starts a GOP.
    pub is_key_frame: bool,
    /// Byte offset of the sample within its media file.
    pub byte_offset: u64,
    /// Size in bytes.
    pub size: u64,
}

impl MediaSample {
    /// Create a sample.
    pub fn new(pts: i64, duration: i64) -> Self {
        Self {
            pts,
            duration,
            is_key_frame: false,
            byte_offset: 0,
            size: 0,
        }
    }

    /// Mark as a key frame.
    pub fn key_frame(mut self) -> Self {
        self.is_key_frame = true;
        self
    }
}

/// One text sample (cue) with explicit start and end times.
#[derive(Debug, Clone, Copy)]
pub struct TextSample {
    /// Start time in stream clock units.
    pub start_time: i64,
    /// End time in stream clock units.
    pub end_time: i64,
}

impl TextSample {
    /// Create a text sample.
    pub fn new(start_time: i64, end_time: i64) -> Self {
        debug_assert!(end_time >= start_time);
        Self {
            start_time,
            end_time,
        }
    }

    /// Duration in stream clock units.
    pub fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_info_builder() {
        let info = StreamInfo::new(StreamType::Audio, TimeScale::new(48_000).unwrap(), "mp4a.40.2")
            .with_language("en");
        assert_eq!(info.stream_type, StreamType::Audio);
        assert_eq!(info.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_text_sample_duration() {
        let sample = TextSample::new(1000, 3500);
        assert_eq!(sample.duration(), 2500);
    }
}
