//! Per-stream media playlist state.
//!
//! A playlist accumulates entries as segments, key frames, encryption
//! changes and ad signals arrive, applies the live sliding window, and
//! renders the HLS document on demand.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::Path;

use splicepack_core::TimeScale;
use tracing::{debug, error, warn};

use crate::bandwidth::BandwidthEstimator;
use crate::config::{HlsParams, HlsPlaylistType, MediaInfo};
use crate::entry::{
    EncryptionInfoEntry, EncryptionMethod, HlsEntry, SegmentInfoEntry, SignalExitEntry,
    SignalReturnEntry, SignalSpanEntry, SpliceType,
};
use crate::error::{HlsError, Result};
use crate::io::write_atomically;
use crate::tag::Tag;

/// What kind of rendition a playlist describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPlaylistStreamType {
    /// Not yet determined.
    Unknown,
    /// Audio rendition.
    Audio,
    /// Video rendition.
    Video,
    /// Subtitle rendition.
    Subtitle,
    /// Trick-play rendition holding only key frames.
    VideoIFramesOnly,
}

#[derive(Debug, Clone, Copy)]
struct KeyFrameInfo {
    timestamp: i64,
    start_byte_offset: u64,
    size: u64,
}

/// Stateful generator for one HLS media playlist.
#[derive(Debug)]
pub struct MediaPlaylist {
    hls_params: HlsParams,
    file_name: String,
    name: String,
    group_id: String,

    media_info: MediaInfo,
    stream_type: MediaPlaylistStreamType,
    codec: String,
    language: Option<String>,
    characteristics: Vec<String>,
    use_byte_range: bool,
    time_scale: Option<TimeScale>,

    entries: VecDeque<HlsEntry>,
    media_sequence_number: u64,
    discontinuity_sequence_number: u64,
    inserted_discontinuity_tag: bool,

    target_duration: u32,
    target_duration_set: bool,
    longest_segment_duration: f64,

    key_frames: Vec<KeyFrameInfo>,
    previous_segment_end_offset: u64,
    bandwidth_estimator: BandwidthEstimator,

    in_ad: bool,
    ad_position: f64,
    ad_duration: Option<f64>,
    ad_segments: u64,

    segments_to_be_removed: VecDeque<String>,
}

impl MediaPlaylist {
    /// Create a playlist.
    ///
    /// `file_name` is the playlist's own file name, `name` and `group_id`
    /// identify the rendition towards the master playlist writer.
    pub fn new(
        hls_params: HlsParams,
        file_name: impl Into<String>,
        name: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        let bandwidth_estimator = BandwidthEstimator::new(hls_params.target_segment_duration);
        Self {
            hls_params,
            file_name: file_name.into(),
            name: name.into(),
            group_id: group_id.into(),
            media_info: MediaInfo::default(),
            stream_type: MediaPlaylistStreamType::Unknown,
            codec: String::new(),
            language: None,
            characteristics: Vec::new(),
            use_byte_range: false,
            time_scale: None,
            entries: VecDeque::new(),
            media_sequence_number: 0,
            discontinuity_sequence_number: 0,
            inserted_discontinuity_tag: false,
            target_duration: 0,
            target_duration_set: false,
            longest_segment_duration: 0.0,
            key_frames: Vec::new(),
            previous_segment_end_offset: 0,
            bandwidth_estimator,
            in_ad: false,
            ad_position: 0.0,
            ad_duration: None,
            ad_segments: 0,
            segments_to_be_removed: VecDeque::new(),
        }
    }

    /// Establish the stream's media info. Fails when no time scale can be
    /// derived.
    pub fn set_media_info(&mut self, media_info: MediaInfo) -> Result<()> {
        let Some(time_scale) = media_info.time_scale().and_then(TimeScale::new) else {
            error!("media info does not contain a valid timescale");
            return Err(HlsError::BadMediaInfo);
        };

        if let Some(video) = &media_info.video {
            self.stream_type = MediaPlaylistStreamType::Video;
            self.codec = video.codec.clone();
        } else if let Some(audio) = &media_info.audio {
            self.stream_type = MediaPlaylistStreamType::Audio;
            self.codec = audio.codec.clone();
        } else {
            self.stream_type = MediaPlaylistStreamType::Subtitle;
            self.codec = media_info
                .text
                .as_ref()
                .map(|t| t.codec.clone())
                .unwrap_or_default();
        }

        self.time_scale = Some(time_scale);
        self.language = media_info
            .language()
            .map(str::to_string)
            .or_else(|| self.hls_params.default_language.clone());
        self.use_byte_range = media_info.segment_template.is_none();
        self.characteristics = media_info.characteristics.clone();
        self.media_info = media_info;
        Ok(())
    }

    /// Append a segment.
    ///
    /// `start_time` and `duration` are in time-scale units. In I-frames-only
    /// mode, emits one entry per buffered key frame instead, with durations
    /// spanning to the next key frame.
    pub fn add_segment(
        &mut self,
        file_name: &str,
        start_time: i64,
        duration: i64,
        start_byte_offset: u64,
        size: u64,
    ) {
        if self.stream_type == MediaPlaylistStreamType::VideoIFramesOnly {
            if self.key_frames.is_empty() {
                return;
            }

            if let Some(scale) = self.time_scale {
                if scale.to_seconds(duration) < 1.0 {
                    warn!("segment duration is less than 1 second; segments are not merged");
                }
            }

            self.adjust_last_segment_info_entry_duration(self.key_frames[0].timestamp);

            let key_frames = std::mem::take(&mut self.key_frames);
            for (index, key_frame) in key_frames.iter().enumerate() {
                // The last entry's duration is adjusted again once the next
                // segment's first key frame is known.
                let next_timestamp = key_frames
                    .get(index + 1)
                    .map(|kf| kf.timestamp)
                    .unwrap_or(start_time + duration);
                self.add_segment_info_entry(
                    file_name,
                    key_frame.timestamp,
                    next_timestamp - key_frame.timestamp,
                    key_frame.start_byte_offset,
                    key_frame.size,
                );
            }
            return;
        }

        self.add_segment_info_entry(file_name, start_time, duration, start_byte_offset, size);
    }

    /// Buffer a key frame, switching the playlist to I-frames-only mode on
    /// first use. Video renditions only.
    pub fn add_key_frame(&mut self, timestamp: i64, start_byte_offset: u64, size: u64) {
        if self.stream_type != MediaPlaylistStreamType::VideoIFramesOnly {
            if self.stream_type != MediaPlaylistStreamType::Video {
                warn!("I-frames-only playlists apply to video renditions only");
                return;
            }
            self.stream_type = MediaPlaylistStreamType::VideoIFramesOnly;
            self.use_byte_range = true;
        }
        self.key_frames.push(KeyFrameInfo {
            timestamp,
            start_byte_offset,
            size,
        });
    }

    /// Append an encryption change. The first key after unencrypted entries
    /// is preceded by a discontinuity.
    pub fn add_encryption_info(
        &mut self,
        method: EncryptionMethod,
        url: &str,
        key_id: &str,
        iv: &str,
        key_format: &str,
        key_format_versions: &str,
    ) {
        if !self.inserted_discontinuity_tag {
            if !self.entries.is_empty() {
                self.entries.push_back(HlsEntry::Discontinuity);
            }
            self.inserted_discontinuity_tag = true;
        }
        self.entries
            .push_back(HlsEntry::EncryptionInfo(EncryptionInfoEntry {
                method,
                url: url.to_string(),
                key_id: key_id.to_string(),
                iv: iv.to_string(),
                key_format: key_format.to_string(),
                key_format_versions: key_format_versions.to_string(),
            }));
    }

    /// Append a placement-opportunity marker.
    pub fn add_placement_opportunity(&mut self) {
        self.entries.push_back(HlsEntry::PlacementOpportunity);
    }

    /// Append a signal exit and enter the ad state.
    pub fn add_signal_exit(&mut self, entry: SignalExitEntry) {
        self.in_ad = true;
        self.ad_duration = entry.duration;
        self.ad_position = 0.0;
        self.ad_segments = 0;
        self.entries.push_back(HlsEntry::SignalExit(entry));
    }

    /// Append a signal span marker.
    pub fn add_signal_span(&mut self, splice_type: SpliceType, position: f64, duration: Option<f64>) {
        self.entries
            .push_back(HlsEntry::SignalSpan(SignalSpanEntry::new(
                splice_type,
                position,
                duration,
            )));
    }

    /// Append a signal return and leave the ad state.
    pub fn add_signal_return(&mut self, entry: SignalReturnEntry) {
        self.in_ad = false;
        self.entries.push_back(HlsEntry::SignalReturn(entry));
    }

    /// Render the playlist and write it atomically.
    pub fn write_to_file(&mut self, file_path: &Path) -> Result<()> {
        if !self.target_duration_set {
            self.set_target_duration(self.longest_segment_duration.ceil() as u32);
        }

        let mut content = self.create_playlist_header();
        for entry in &self.entries {
            let _ = writeln!(content, "{}", entry.render());
        }
        if self.hls_params.playlist_type == HlsPlaylistType::Vod {
            content.push_str("#EXT-X-ENDLIST\n");
        }

        write_atomically(file_path, content.as_bytes()).map_err(|err| {
            error!(path = %file_path.display(), %err, "failed to write playlist");
            HlsError::Io(err)
        })
    }

    /// Render the playlist document without writing it.
    pub fn render(&mut self) -> String {
        if !self.target_duration_set {
            self.set_target_duration(self.longest_segment_duration.ceil() as u32);
        }

        let mut content = self.create_playlist_header();
        for entry in &self.entries {
            let _ = writeln!(content, "{}", entry.render());
        }
        if self.hls_params.playlist_type == HlsPlaylistType::Vod {
            content.push_str("#EXT-X-ENDLIST\n");
        }
        content
    }

    /// Peak bitrate in bits per second; the declared bandwidth wins when
    /// present.
    pub fn max_bitrate(&self) -> u64 {
        if let Some(bandwidth) = self.media_info.bandwidth {
            return bandwidth;
        }
        self.bandwidth_estimator.max()
    }

    /// Average bitrate in bits per second over recent history.
    pub fn avg_bitrate(&self) -> u64 {
        self.bandwidth_estimator.estimate()
    }

    /// The longest segment duration seen, in seconds.
    pub fn longest_segment_duration(&self) -> f64 {
        self.longest_segment_duration
    }

    /// Pin the advertised target duration.
    pub fn set_target_duration(&mut self, target_duration: u32) {
        if self.target_duration_set {
            if self.target_duration == target_duration {
                return;
            }
            debug!(
                from = self.target_duration,
                to = target_duration,
                "updating target duration"
            );
        }
        self.target_duration = target_duration;
        self.target_duration_set = true;
    }

    /// Audio channel count, 0 for non-audio streams.
    pub fn num_channels(&self) -> u32 {
        self.media_info.audio.as_ref().map(|a| a.channels).unwrap_or(0)
    }

    /// Display resolution honoring the pixel aspect ratio.
    pub fn display_resolution(&self) -> Option<(u32, u32)> {
        let video = self.media_info.video.as_ref()?;
        let pixel_aspect_ratio = if video.pixel_height > 0 {
            video.pixel_width as f64 / video.pixel_height as f64
        } else {
            1.0
        };
        Some((
            (video.width as f64 * pixel_aspect_ratio) as u32,
            video.height,
        ))
    }

    /// VIDEO-RANGE attribute value, empty when unknown.
    pub fn video_range(&self) -> &'static str {
        // Dolby Vision is always HDR.
        if self.codec.starts_with("dvh") {
            return "PQ";
        }
        match self
            .media_info
            .video
            .as_ref()
            .map(|v| v.transfer_characteristics)
        {
            Some(1) => "SDR",
            Some(16) | Some(18) => "PQ",
            _ => "",
        }
    }

    /// Frames per second, 0 when unknown.
    pub fn frame_rate(&self) -> f64 {
        let Some(video) = self.media_info.video.as_ref() else {
            return 0.0;
        };
        let Some(scale) = self.time_scale else {
            return 0.0;
        };
        if video.frame_duration == 0 {
            return 0.0;
        }
        scale.ticks_per_second() as f64 / video.frame_duration as f64
    }

    /// The playlist's own file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Rendition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendition group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Current rendition kind.
    pub fn stream_type(&self) -> MediaPlaylistStreamType {
        self.stream_type
    }

    /// Stream codec string.
    pub fn codec(&self) -> &str {
        &self.codec
    }

    /// Stream language, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Accessibility characteristics.
    pub fn characteristics(&self) -> &[String] {
        &self.characteristics
    }

    /// Current media sequence number.
    pub fn media_sequence_number(&self) -> u64 {
        self.media_sequence_number
    }

    /// Current discontinuity sequence number.
    pub fn discontinuity_sequence_number(&self) -> u64 {
        self.discontinuity_sequence_number
    }

    /// Number of entries currently in the playlist.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Whether the playlist is inside an ad break.
    pub fn in_ad(&self) -> bool {
        self.in_ad
    }

    fn create_playlist_header(&self) -> String {
        let mut header = String::from("#EXTM3U\n#EXT-X-VERSION:6\n");

        if let (Some(url), Some(version)) =
            (&self.hls_params.project_url, &self.hls_params.version)
        {
            let _ = writeln!(header, "## Generated with {url} version {version}");
        }

        let _ = writeln!(header, "#EXT-X-TARGETDURATION:{}", self.target_duration);

        match self.hls_params.playlist_type {
            HlsPlaylistType::Vod => header.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n"),
            HlsPlaylistType::Event => header.push_str("#EXT-X-PLAYLIST-TYPE:EVENT\n"),
            HlsPlaylistType::Live => {
                if self.media_sequence_number > 0 {
                    let _ = writeln!(
                        header,
                        "#EXT-X-MEDIA-SEQUENCE:{}",
                        self.media_sequence_number
                    );
                }
                if self.discontinuity_sequence_number > 0 {
                    let _ = writeln!(
                        header,
                        "#EXT-X-DISCONTINUITY-SEQUENCE:{}",
                        self.discontinuity_sequence_number
                    );
                }
            }
        }

        if self.stream_type == MediaPlaylistStreamType::VideoIFramesOnly {
            header.push_str("#EXT-X-I-FRAMES-ONLY\n");
        }

        // EXT-X-MAP goes last; the rest of the playlist is segment and key
        // info.
        if let Some(init_url) = &self.media_info.init_segment_url {
            let mut tag = Tag::new("#EXT-X-MAP");
            tag.add_quoted_string("URI", init_url);
            let _ = writeln!(header, "{}", tag.finish());
        } else if let (Some(media_url), Some((begin, end))) =
            (&self.media_info.media_file_url, self.media_info.init_range)
        {
            // Single-file media only carries EXT-X-MAP when an init range
            // exists.
            let mut tag = Tag::new("#EXT-X-MAP");
            tag.add_quoted_string("URI", media_url);
            tag.add_quoted_number_pair("BYTERANGE", end - begin + 1, '@', begin);
            let _ = writeln!(header, "{}", tag.finish());
        }

        header
    }

    fn add_segment_info_entry(
        &mut self,
        file_name: &str,
        start_time: i64,
        duration: i64,
        start_byte_offset: u64,
        size: u64,
    ) {
        let Some(scale) = self.time_scale else {
            warn!(
                duration,
                "timescale is not set; segment durations will be wrong"
            );
            self.entries.push_back(HlsEntry::SegmentInfo(SegmentInfoEntry {
                file_name: file_name.to_string(),
                start_time: 0.0,
                duration: 0.0,
                use_byte_range: self.use_byte_range,
                start_byte_offset,
                segment_file_size: size,
                previous_segment_end_offset: self.previous_segment_end_offset,
            }));
            return;
        };

        let segment_duration_seconds = scale.to_seconds(duration);

        // Inside an ad break every segment after the first gets a span
        // marker carrying the position within the break.
        if self.in_ad {
            if self.ad_segments > 0 {
                self.add_signal_span(SpliceType::LiveDai, self.ad_position, self.ad_duration);
            }
            self.ad_position += segment_duration_seconds;
        }

        let start_time_seconds = scale.to_seconds(start_time);
        self.longest_segment_duration = self
            .longest_segment_duration
            .max(segment_duration_seconds);
        self.bandwidth_estimator.add_block(size, segment_duration_seconds);

        self.entries.push_back(HlsEntry::SegmentInfo(SegmentInfoEntry {
            file_name: file_name.to_string(),
            start_time: start_time_seconds,
            duration: segment_duration_seconds,
            use_byte_range: self.use_byte_range,
            start_byte_offset,
            segment_file_size: size,
            previous_segment_end_offset: self.previous_segment_end_offset,
        }));
        self.previous_segment_end_offset = start_byte_offset + size.saturating_sub(1);
        self.ad_segments += 1;
        self.slide_window();
    }

    fn adjust_last_segment_info_entry_duration(&mut self, next_timestamp: i64) {
        let Some(scale) = self.time_scale else {
            return;
        };

        let next_timestamp_seconds = scale.to_seconds(next_timestamp);
        for entry in self.entries.iter_mut().rev() {
            if let HlsEntry::SegmentInfo(segment_info) = entry {
                segment_info.duration = next_timestamp_seconds - segment_info.start_time;
                self.longest_segment_duration =
                    self.longest_segment_duration.max(segment_info.duration);
                break;
            }
        }
    }

    /// Start time of the most recent segment entry.
    fn latest_segment_start_time(&self) -> f64 {
        self.entries
            .iter()
            .rev()
            .find_map(|entry| match entry {
                HlsEntry::SegmentInfo(segment_info) => Some(segment_info.start_time),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    fn slide_window(&mut self) {
        debug_assert!(!self.entries.is_empty());
        if self.hls_params.time_shift_buffer_depth <= 0.0
            || self.hls_params.playlist_type != HlsPlaylistType::Live
        {
            return;
        }
        debug_assert!(self.time_scale.is_some());

        // The latest segment's start time is the current play time, which
        // guarantees the latest segment stays in the list.
        let current_play_time = self.latest_segment_start_time();
        if current_play_time <= self.hls_params.time_shift_buffer_depth {
            return;
        }
        let timeshift_limit = current_play_time - self.hls_params.time_shift_buffer_depth;

        // EXT-X-KEYs ahead of the first surviving segment are carried over;
        // consecutive keys are kept or removed together.
        let mut ext_x_keys: Vec<HlsEntry> = Vec::new();
        let mut prev_entry_was_key = false;
        let mut remove_count = 0;
        let mut removed_discontinuities = 0u64;
        let mut removed_segments: Vec<String> = Vec::new();

        for entry in &self.entries {
            match entry {
                HlsEntry::EncryptionInfo(_) => {
                    if !prev_entry_was_key {
                        ext_x_keys.clear();
                    }
                    ext_x_keys.push(entry.clone());
                    prev_entry_was_key = true;
                    remove_count += 1;
                    continue;
                }
                HlsEntry::Discontinuity => {
                    removed_discontinuities += 1;
                }
                HlsEntry::PlacementOpportunity
                | HlsEntry::SignalExit(_)
                | HlsEntry::SignalSpan(_)
                | HlsEntry::SignalReturn(_) => {
                    // Removed together with the surrounding segments.
                }
                HlsEntry::SegmentInfo(segment_info) => {
                    let segment_end_time = segment_info.start_time + segment_info.duration;
                    if timeshift_limit < segment_end_time {
                        break;
                    }
                    removed_segments.push(segment_info.file_name.clone());
                }
            }
            prev_entry_was_key = false;
            remove_count += 1;
        }

        self.discontinuity_sequence_number += removed_discontinuities;
        self.media_sequence_number += removed_segments.len() as u64;
        self.entries.drain(..remove_count);
        for key in ext_x_keys.into_iter().rev() {
            self.entries.push_front(key);
        }
        for file_name in removed_segments {
            self.schedule_segment_removal(file_name);
        }
    }

    fn schedule_segment_removal(&mut self, file_name: String) {
        if self.hls_params.preserved_segments_outside_live_window == 0 {
            return;
        }
        // Trick-play renditions share media files with the main video
        // rendition; deleting here would pull segments out from under it.
        if self.stream_type == MediaPlaylistStreamType::VideoIFramesOnly {
            return;
        }

        self.segments_to_be_removed.push_back(file_name);
        while self.segments_to_be_removed.len()
            > self.hls_params.preserved_segments_outside_live_window
        {
            let stale = self.segments_to_be_removed.pop_front().unwrap();
            debug!(file = %stale, "deleting segment outside the live window");
            if let Err(err) = std::fs::remove_file(&stale) {
                warn!(file = %stale, %err, "failed to delete expired segment");
            }
        }
    }
}
