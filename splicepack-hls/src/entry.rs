//! Media playlist entries.
//!
//! A playlist is an ordered log of entries: segments, encryption changes,
//! discontinuities, and the ad-signal tags. Entries are a closed set of
//! variants with one rendering dispatch, which also keeps the sliding
//! window's entry classification exhaustive.

use std::fmt::Write;

use splicepack_scte35::DeliveryRestrictions;

use crate::tag::Tag;

/// Splice signalling dialect carried by the signal tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpliceType {
    /// Live dynamic ad insertion.
    #[default]
    LiveDai,
    /// Alternate content replacement.
    Altcon,
}

impl SpliceType {
    /// Attribute value for SpliceType=.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpliceType::LiveDai => "LiveDAI",
            SpliceType::Altcon => "ALTCON",
        }
    }
}

/// Encryption method for EXT-X-KEY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    /// No encryption.
    None,
    /// AES-128 full-segment encryption.
    Aes128,
    /// SAMPLE-AES (cbcs).
    SampleAes,
    /// SAMPLE-AES-CTR (cenc).
    SampleAesCenc,
}

impl EncryptionMethod {
    /// Attribute value for METHOD=.
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionMethod::None => "NONE",
            EncryptionMethod::Aes128 => "AES-128",
            EncryptionMethod::SampleAes => "SAMPLE-AES",
            EncryptionMethod::SampleAesCenc => "SAMPLE-AES-CTR",
        }
    }
}

/// One EXTINF segment entry.
#[derive(Debug, Clone)]
pub struct SegmentInfoEntry {
    /// Segment file name as referenced from the playlist.
    pub file_name: String,
    /// Segment start time in seconds.
    pub start_time: f64,
    /// Segment duration in seconds. Adjusted retroactively in I-frames-only
    /// playlists once the next key frame is known.
    pub duration: f64,
    /// Whether to emit EXT-X-BYTERANGE.
    pub use_byte_range: bool,
    /// Byte offset of the (sub)segment.
    pub start_byte_offset: u64,
    /// Size of the (sub)segment in bytes.
    pub segment_file_size: u64,
    /// End offset of the previous subsegment; lets the renderer drop the
    /// `@offset` part when ranges are contiguous.
    pub previous_segment_end_offset: u64,
}

impl SegmentInfoEntry {
    fn render(&self) -> String {
        let mut result = format!("#EXTINF:{:.3},", self.duration);

        if self.use_byte_range {
            let _ = write!(result, "\n#EXT-X-BYTERANGE:{}", self.segment_file_size);
            if self.previous_segment_end_offset + 1 != self.start_byte_offset {
                let _ = write!(result, "@{}", self.start_byte_offset);
            }
        }

        let _ = write!(result, "\n{}", self.file_name);
        result
    }
}

/// One EXT-X-KEY entry.
#[derive(Debug, Clone)]
pub struct EncryptionInfoEntry {
    /// Encryption method.
    pub method: EncryptionMethod,
    /// Key acquisition URL.
    pub url: String,
    /// Key identifier, hex-prefixed; empty when not signalled.
    pub key_id: String,
    /// Initialization vector, hex-prefixed; empty when not signalled.
    pub iv: String,
    /// KEYFORMAT attribute; empty when not signalled.
    pub key_format: String,
    /// KEYFORMATVERSIONS attribute; empty when not signalled.
    pub key_format_versions: String,
}

impl EncryptionInfoEntry {
    fn render(&self) -> String {
        let mut tag = Tag::new("#EXT-X-KEY");
        tag.add_string("METHOD", self.method.as_str());
        tag.add_quoted_string("URI", &self.url);

        if !self.key_id.is_empty() {
            tag.add_string("KEYID", &self.key_id);
        }
        if !self.iv.is_empty() {
            tag.add_string("IV", &self.iv);
        }
        if !self.key_format_versions.is_empty() {
            tag.add_quoted_string("KEYFORMATVERSIONS", &self.key_format_versions);
        }
        if !self.key_format.is_empty() {
            tag.add_quoted_string("KEYFORMAT", &self.key_format);
        }

        tag.finish()
    }
}

/// One EXT-X-SIGNAL-EXIT entry: the stream leaves the program for an ad
/// break.
#[derive(Debug, Clone, Default)]
pub struct SignalExitEntry {
    /// Signalling dialect.
    pub splice_type: SpliceType,
    /// Break duration in seconds.
    pub duration: Option<f64>,
    /// Segmentation event id from the originating SCTE-35 descriptor.
    pub event_id: Option<u32>,
    /// Rendered UPID (base64 for binary payloads).
    pub upid: Option<String>,
    /// Segmentation type id from the originating descriptor.
    pub segmentation_type_id: Option<u8>,
    /// Delivery restriction flags; each named flag renders as its single
    /// bit, device restrictions as the 2-bit value.
    pub restrictions: Option<DeliveryRestrictions>,
    /// Distributor signal id.
    pub signal_id: Option<String>,
    /// Provider/asset paid identifier.
    pub paid: Option<String>,
    /// Maximum break duration constraint.
    pub max_duration: Option<u64>,
    /// Minimum break duration constraint.
    pub min_duration: Option<u64>,
    /// Maximum number of ads constraint.
    pub max_ads: Option<u64>,
    /// Minimum number of ads constraint.
    pub min_ads: Option<u64>,
}

impl SignalExitEntry {
    /// Start building an exit entry.
    pub fn new(splice_type: SpliceType) -> Self {
        Self {
            splice_type,
            ..Self::default()
        }
    }

    /// Set the break duration.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set the segmentation event id.
    pub fn with_event_id(mut self, event_id: u32) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Set the rendered UPID.
    pub fn with_upid(mut self, upid: impl Into<String>) -> Self {
        self.upid = Some(upid.into());
        self
    }

    /// Set the segmentation type id.
    pub fn with_segmentation_type_id(mut self, type_id: u8) -> Self {
        self.segmentation_type_id = Some(type_id);
        self
    }

    /// Set the delivery restriction flags.
    pub fn with_restrictions(mut self, restrictions: DeliveryRestrictions) -> Self {
        self.restrictions = Some(restrictions);
        self
    }

    fn render(&self) -> String {
        let mut tag = Tag::new("#EXT-X-SIGNAL-EXIT");

        if let Some(duration) = self.duration {
            tag.add_value(duration);
        }
        tag.add_string("SpliceType", self.splice_type.as_str());

        if let Some(signal_id) = &self.signal_id {
            tag.add_string("SignalId", signal_id);
        }
        if let Some(paid) = &self.paid {
            tag.add_string("Paid", paid);
        }
        if let Some(event_id) = self.event_id {
            tag.add_number("segmentationEventId", event_id as u64);
        }
        if let Some(upid) = &self.upid {
            tag.add_string("segmentationUpid", upid);
        }
        if let Some(type_id) = self.segmentation_type_id {
            tag.add_number("segmentationTypeId", type_id as u64);
        }
        if let Some(flags) = &self.restrictions {
            tag.add_number("webDeliveryAllowedFlag", flags.web_delivery_allowed as u64);
            tag.add_number("noRegionalBlackoutFlag", flags.no_regional_blackout as u64);
            tag.add_number("archiveAllowedFlag", flags.archive_allowed as u64);
            tag.add_number("deviceRestrictions", flags.device_restrictions as u64);
        }
        if let Some(maxd) = self.max_duration {
            tag.add_number("MaxD", maxd);
        }
        if let Some(mind) = self.min_duration {
            tag.add_number("MinD", mind);
        }
        if let Some(maxads) = self.max_ads {
            tag.add_number("MaxAds", maxads);
        }
        if let Some(minads) = self.min_ads {
            tag.add_number("MinAds", minads);
        }

        tag.finish()
    }
}

/// One EXT-X-SIGNAL-SPAN entry: position marker inside a running ad break.
#[derive(Debug, Clone, Default)]
pub struct SignalSpanEntry {
    /// Signalling dialect.
    pub splice_type: SpliceType,
    /// Seconds elapsed since the signal exit.
    pub position: f64,
    /// Total break duration in seconds.
    pub duration: Option<f64>,
    /// Distributor signal id.
    pub signal_id: Option<String>,
    /// Provider/asset paid identifier.
    pub paid: Option<String>,
}

impl SignalSpanEntry {
    /// Build a span entry at `position` seconds into the break.
    pub fn new(splice_type: SpliceType, position: f64, duration: Option<f64>) -> Self {
        Self {
            splice_type,
            position,
            duration,
            ..Self::default()
        }
    }

    fn render(&self) -> String {
        let mut tag = Tag::new("#EXT-X-SIGNAL-SPAN");

        tag.add_value(self.position);
        if let Some(duration) = self.duration {
            tag.add_of_value(duration);
        }
        tag.add_string("SpliceType", self.splice_type.as_str());

        if let Some(signal_id) = &self.signal_id {
            tag.add_string("SignalId", signal_id);
        }
        if let Some(paid) = &self.paid {
            tag.add_string("Paid", paid);
        }

        tag.finish()
    }
}

/// One EXT-X-SIGNAL-RETURN entry: the stream returns to the program.
#[derive(Debug, Clone, Default)]
pub struct SignalReturnEntry {
    /// Signalling dialect.
    pub splice_type: SpliceType,
    /// Realized break duration in seconds.
    pub duration: Option<f64>,
}

impl SignalReturnEntry {
    /// Build a return entry.
    pub fn new(splice_type: SpliceType, duration: Option<f64>) -> Self {
        Self {
            splice_type,
            duration,
        }
    }

    fn render(&self) -> String {
        let mut tag = Tag::new("#EXT-X-SIGNAL-RETURN");
        if let Some(duration) = self.duration {
            tag.add_value(duration);
        }
        tag.add_string("SpliceType", self.splice_type.as_str());
        tag.finish()
    }
}

/// A tagged record in a media playlist.
#[derive(Debug, Clone)]
pub enum HlsEntry {
    /// `#EXTINF` segment entry.
    SegmentInfo(SegmentInfoEntry),
    /// `#EXT-X-KEY` encryption change.
    EncryptionInfo(EncryptionInfoEntry),
    /// `#EXT-X-DISCONTINUITY`.
    Discontinuity,
    /// `#EXT-X-PLACEMENT-OPPORTUNITY`.
    PlacementOpportunity,
    /// `#EXT-X-SIGNAL-EXIT`.
    SignalExit(SignalExitEntry),
    /// `#EXT-X-SIGNAL-SPAN`.
    SignalSpan(SignalSpanEntry),
    /// `#EXT-X-SIGNAL-RETURN`.
    SignalReturn(SignalReturnEntry),
}

impl HlsEntry {
    /// Render the entry as playlist text, without a trailing newline.
    pub fn render(&self) -> String {
        match self {
            HlsEntry::SegmentInfo(entry) => entry.render(),
            HlsEntry::EncryptionInfo(entry) => entry.render(),
            HlsEntry::Discontinuity => "#EXT-X-DISCONTINUITY".to_string(),
            HlsEntry::PlacementOpportunity => "#EXT-X-PLACEMENT-OPPORTUNITY".to_string(),
            HlsEntry::SignalExit(entry) => entry.render(),
            HlsEntry::SignalSpan(entry) => entry.render(),
            HlsEntry::SignalReturn(entry) => entry.render(),
        }
    }
}
