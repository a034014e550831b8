//! Cue events and the per-stream data envelope.

use splicepack_core::{MediaSample, StreamInfo, TextSample, MPEG_TIMESCALE};
use splicepack_scte35::Scte35Event;

/// What kind of cue an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueEventType {
    /// A pre-configured ad placement opportunity.
    PlacementOpportunity,
    /// A cue derived from an inbound SCTE-35 signal.
    Scte35,
}

/// An aligned ad-break cue, broadcast to every output stream.
///
/// Cue events are immutable values: each stream's queue holds its own clone,
/// so consumption order on one stream never affects another.
#[derive(Debug, Clone, PartialEq)]
pub struct CueEvent {
    /// Cue time in seconds. For video streams this is the PTS of a key
    /// frame once the cue has been promoted.
    pub time_in_seconds: f64,
    /// Break duration in seconds, 0 when not signalled.
    pub duration: f64,
    /// Cue kind.
    pub cue_type: CueEventType,
    /// The SCTE-35 event behind this cue, when there is one.
    pub signal: Option<Scte35Event>,
}

impl CueEvent {
    /// A placement-opportunity cue at the given time.
    pub fn placement_opportunity(time_in_seconds: f64, duration: f64) -> Self {
        Self {
            time_in_seconds,
            duration,
            cue_type: CueEventType::PlacementOpportunity,
            signal: None,
        }
    }

    /// Wrap an SCTE-35 event, converting its PTS times to seconds.
    pub fn from_scte35(event: Scte35Event) -> Self {
        Self {
            time_in_seconds: event.start_time_pts as f64 / MPEG_TIMESCALE as f64,
            duration: event.duration as f64 / MPEG_TIMESCALE as f64,
            cue_type: CueEventType::Scte35,
            signal: Some(event),
        }
    }
}

/// The payload variants flowing through a stream.
#[derive(Debug, Clone)]
pub enum StreamPayload {
    /// Stream metadata; the first item on every stream.
    Info(StreamInfo),
    /// An audio or video sample.
    Media(MediaSample),
    /// A text sample.
    Text(TextSample),
    /// An inbound SCTE-35 splice event.
    Scte35(Scte35Event),
    /// An aligned cue, emitted by the alignment handler.
    Cue(CueEvent),
}

/// One item on one stream.
#[derive(Debug, Clone)]
pub struct StreamData {
    /// Which input/output stream this item belongs to.
    pub stream_index: usize,
    /// The item itself.
    pub payload: StreamPayload,
}

impl StreamData {
    /// Stream info envelope.
    pub fn from_info(stream_index: usize, info: StreamInfo) -> Self {
        Self {
            stream_index,
            payload: StreamPayload::Info(info),
        }
    }

    /// Media sample envelope.
    pub fn from_media(stream_index: usize, sample: MediaSample) -> Self {
        Self {
            stream_index,
            payload: StreamPayload::Media(sample),
        }
    }

    /// Text sample envelope.
    pub fn from_text(stream_index: usize, sample: TextSample) -> Self {
        Self {
            stream_index,
            payload: StreamPayload::Text(sample),
        }
    }

    /// SCTE-35 event envelope.
    pub fn from_scte35(stream_index: usize, event: Scte35Event) -> Self {
        Self {
            stream_index,
            payload: StreamPayload::Scte35(event),
        }
    }

    /// Cue event envelope.
    pub fn from_cue(stream_index: usize, cue: CueEvent) -> Self {
        Self {
            stream_index,
            payload: StreamPayload::Cue(cue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splicepack_scte35::{
        DeliveryRestrictions, SegmentationDescriptor, SegmentationUpid,
        SPLICE_DESCRIPTOR_IDENTIFIER,
    };

    fn descriptor(type_id: u8) -> SegmentationDescriptor {
        SegmentationDescriptor {
            identifier: SPLICE_DESCRIPTOR_IDENTIFIER,
            event_id: 1,
            cancel: false,
            restrictions: Some(DeliveryRestrictions {
                web_delivery_allowed: true,
                no_regional_blackout: true,
                archive_allowed: true,
                device_restrictions: 0,
            }),
            components: None,
            duration: None,
            upid: SegmentationUpid::default(),
            segmentation_type_id: type_id,
            segment_num: 0,
            segments_expected: 0,
            sub_segment_num: None,
            sub_segments_expected: None,
        }
    }

    #[test]
    fn test_cue_from_scte35_converts_clock() {
        let event = Scte35Event {
            start_time_pts: 918_000,
            duration: 2_700_000,
            descriptor: descriptor(0x30),
        };
        let cue = CueEvent::from_scte35(event);
        assert_eq!(cue.time_in_seconds, 10.2);
        assert_eq!(cue.duration, 30.0);
        assert_eq!(cue.cue_type, CueEventType::Scte35);
        assert!(cue.signal.is_some());
    }
}
