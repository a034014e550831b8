//! Multi-stream cue alignment.
//!
//! Receives samples from N parallel streams plus inbound SCTE-35 signals,
//! pins ad-break boundaries to video key frames, and re-emits samples and
//! aligned cues downstream so every playlist can cut at the same instant.

use std::collections::VecDeque;
use std::sync::Arc;

use splicepack_core::{StreamInfo, StreamType};
use tracing::{debug, error, warn};

use crate::cue::{CueEvent, StreamData, StreamPayload};
use crate::error::{ChunkingError, Result};
use crate::sync_queue::SyncPointQueue;

/// Max samples buffered per stream before the pipeline is declared broken.
/// About 20 seconds of 48 kHz audio.
const MAX_BUFFER_SIZE: usize = 1000;

/// Downstream receiver for aligned stream data.
///
/// One sink serves all streams; items carry their stream index.
pub trait StreamSink {
    /// Deliver one item downstream.
    fn send(&mut self, data: StreamData) -> Result<()>;

    /// Flush a downstream stream.
    fn flush_stream(&mut self, stream_index: usize) -> Result<()>;
}

/// Ad-state of one stream, driven by dispatched SCTE-35 cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CueState {
    InProgram,
    InAd,
}

#[derive(Debug)]
struct StreamState {
    info: Option<StreamInfo>,
    /// Samples held back because they are at or past the hint.
    samples: VecDeque<StreamPayload>,
    /// Cues awaiting dispatch on this stream.
    cues: VecDeque<CueEvent>,
    state: CueState,
    /// Latest text end time; lets trailing cues through on text streams.
    max_text_sample_end_time_seconds: f64,
    to_be_flushed: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            info: None,
            samples: VecDeque::new(),
            cues: VecDeque::new(),
            state: CueState::InProgram,
            max_text_sample_end_time_seconds: 0.0,
            to_be_flushed: false,
        }
    }
}

/// Scaled media time of a payload, in stream clock units.
///
/// Audio uses the sample midpoint: the sample belongs with whichever side of
/// the cut contains its larger portion. Text uses its start time, video its
/// PTS.
fn scaled_time(info: &StreamInfo, payload: &StreamPayload) -> i64 {
    match payload {
        StreamPayload::Text(sample) => sample.start_time,
        StreamPayload::Media(sample) => match info.stream_type {
            StreamType::Audio => sample.pts + sample.duration / 2,
            _ => sample.pts,
        },
        _ => {
            debug_assert!(false, "only samples carry a media time");
            0
        }
    }
}

fn time_in_seconds(info: &StreamInfo, payload: &StreamPayload) -> f64 {
    info.time_scale.to_seconds(scaled_time(info, payload))
}

/// The pipeline stage that aligns cues across streams.
pub struct CueAlignmentHandler {
    sync_points: Arc<SyncPointQueue>,
    stream_states: Vec<StreamState>,
    /// Earliest time at which samples must be held back until the next sync
    /// point resolves.
    hint: f64,
}

impl CueAlignmentHandler {
    /// Create a handler for `num_streams` input streams.
    ///
    /// When `sync_points` is `None` the handler owns a queue of its own;
    /// this is the live ad-break case where no queue is shared with a
    /// VOD cue generator.
    pub fn new(num_streams: usize, sync_points: Option<Arc<SyncPointQueue>>) -> Self {
        let sync_points = sync_points.unwrap_or_default();
        sync_points.add_thread();
        let hint = sync_points.get_hint(-1.0);
        Self {
            sync_points,
            stream_states: (0..num_streams).map(|_| StreamState::new()).collect(),
            hint,
        }
    }

    /// The sync-point queue this handler feeds from.
    pub fn sync_points(&self) -> &Arc<SyncPointQueue> {
        &self.sync_points
    }

    /// Process one input item.
    pub fn process<S: StreamSink>(&mut self, data: StreamData, sink: &mut S) -> Result<()> {
        match &data.payload {
            StreamPayload::Info(_) => self.on_stream_info(data, sink),
            StreamPayload::Media(_) | StreamPayload::Text(_) => self.on_sample(data, sink),
            StreamPayload::Scte35(_) => self.on_signal(data),
            StreamPayload::Cue(_) => {
                warn!(
                    stream_index = data.stream_index,
                    "dropping unexpected cue on handler input"
                );
                Ok(())
            }
        }
    }

    /// Mark one stream flushed. Once every stream is flushed, remaining cues
    /// drain and all downstreams are flushed.
    pub fn on_flush_request<S: StreamSink>(
        &mut self,
        stream_index: usize,
        sink: &mut S,
    ) -> Result<()> {
        self.stream_state_mut(stream_index)?.to_be_flushed = true;

        // Every stream must flush before any can: buffered samples need the
        // remaining cues synchronized onto all streams first.
        if self.stream_states.iter().any(|s| !s.to_be_flushed) {
            return Ok(());
        }

        for stream in &self.stream_states {
            if stream.info.as_ref().map(|i| i.stream_type) == Some(StreamType::Video) {
                debug_assert!(stream.samples.is_empty(), "video streams do not buffer samples");
                debug_assert!(stream.cues.is_empty(), "video streams do not buffer cues");
            }
        }

        // Cues we never promoted still need to go out.
        while self.sync_points.has_more(self.hint) {
            let next_cue = self
                .sync_points
                .get_next(self.hint)
                .ok_or(ChunkingError::Cancelled)?;
            self.use_new_sync_point(next_cue, sink)?;
        }

        for stream_index in 0..self.stream_states.len() {
            self.run_through_samples(stream_index, sink)?;
            debug_assert!(self.stream_states[stream_index].samples.is_empty());

            // Trailing cues would create empty output periods; drop them
            // except on text streams, where a cue inside the last sample's
            // extent still splits it.
            let max_end = self.stream_states[stream_index].max_text_sample_end_time_seconds;
            while let Some(cue) = self.stream_states[stream_index].cues.pop_front() {
                if cue.time_in_seconds < max_end {
                    self.dispatch_cue(stream_index, cue, sink)?;
                } else {
                    debug!(
                        stream_index,
                        time = cue.time_in_seconds,
                        "ignoring trailing cue at end of stream"
                    );
                }
            }
        }

        for stream_index in 0..self.stream_states.len() {
            sink.flush_stream(stream_index)?;
        }
        Ok(())
    }

    fn on_stream_info<S: StreamSink>(&mut self, data: StreamData, sink: &mut S) -> Result<()> {
        let StreamPayload::Info(info) = &data.payload else {
            unreachable!()
        };
        self.stream_state_mut(data.stream_index)?.info = Some(info.clone());
        sink.send(data)
    }

    fn on_signal(&mut self, data: StreamData) -> Result<()> {
        let stream_index = data.stream_index;
        let StreamPayload::Scte35(event) = data.payload else {
            unreachable!()
        };

        debug!(
            stream_index,
            start_time = event.start_time_pts,
            duration = event.duration,
            segmentation_type_id = event.descriptor.segmentation_type_id,
            "received splice signal"
        );

        let state = self.stream_state(stream_index)?.state;
        let admissible = (event.is_start() && state == CueState::InProgram)
            || (event.is_end() && state == CueState::InAd);
        if !admissible {
            debug!(
                stream_index,
                segmentation_type_id = event.descriptor.segmentation_type_id,
                "dropping splice signal out of program/ad order"
            );
            return Ok(());
        }

        self.sync_points.add(CueEvent::from_scte35(event));
        self.hint = self.sync_points.get_hint(-1.0);
        Ok(())
    }

    fn on_sample<S: StreamSink>(&mut self, data: StreamData, sink: &mut S) -> Result<()> {
        let stream_index = data.stream_index;

        if let StreamPayload::Text(sample) = &data.payload {
            let stream = self.stream_state_mut(stream_index)?;
            let info = stream
                .info
                .as_ref()
                .ok_or_else(|| ChunkingError::InvalidStream("sample before stream info".into()))?;
            let end = info.time_scale.to_seconds(sample.end_time);
            stream.max_text_sample_end_time_seconds =
                stream.max_text_sample_end_time_seconds.max(end);
        }

        let stream_type = self
            .stream_state(stream_index)?
            .info
            .as_ref()
            .ok_or_else(|| ChunkingError::InvalidStream("sample before stream info".into()))?
            .stream_type;

        if stream_type == StreamType::Video {
            self.on_video_sample(data, sink)
        } else {
            self.on_non_video_sample(data, sink)
        }
    }

    /// Video drives alignment: a key frame at or past the hint promotes the
    /// pending sync point to the key-frame instant.
    fn on_video_sample<S: StreamSink>(&mut self, data: StreamData, sink: &mut S) -> Result<()> {
        let stream_index = data.stream_index;
        let StreamPayload::Media(sample) = &data.payload else {
            return Err(ChunkingError::InvalidStream(
                "video streams carry media samples".into(),
            ));
        };
        let info = self.stream_states[stream_index].info.as_ref().unwrap();
        let sample_time = time_in_seconds(info, &data.payload);

        if sample.is_key_frame && sample_time >= self.hint {
            let Some(next_sync) = self.sync_points.promote_at(sample_time) else {
                error!(
                    time = sample_time,
                    "failed to promote sync point; video streams are not GOP-aligned"
                );
                return Err(ChunkingError::NotGopAligned { time: sample_time });
            };

            self.use_new_sync_point(next_sync, sink)?;
            debug_assert_eq!(self.stream_states[stream_index].cues.len(), 1);

            if let Some(cue) = self.stream_states[stream_index].cues.pop_front() {
                self.dispatch_cue(stream_index, cue, sink)?;
            }
        }

        sink.send(data)
    }

    fn on_non_video_sample<S: StreamSink>(&mut self, data: StreamData, sink: &mut S) -> Result<()> {
        self.accept_sample(data, sink)?;

        // All streams waiting at the hint means no video will resolve the
        // next sync point; block on the queue instead.
        if self.everyone_waiting_at_hint() {
            let next_sync = self
                .sync_points
                .get_next(self.hint)
                .ok_or(ChunkingError::Cancelled)?;
            self.use_new_sync_point(next_sync, sink)?;
        }

        Ok(())
    }

    fn accept_sample<S: StreamSink>(&mut self, data: StreamData, sink: &mut S) -> Result<()> {
        let stream_index = data.stream_index;
        let stream = &mut self.stream_states[stream_index];
        stream.samples.push_back(data.payload);

        if stream.samples.len() > MAX_BUFFER_SIZE {
            let buffered = stream.samples.len();
            error!(
                stream_index,
                buffered, "stream buffered more samples than the pipeline allows"
            );
            return Err(ChunkingError::Backpressure {
                stream_index,
                buffered,
            });
        }

        self.run_through_samples(stream_index, sink)
    }

    /// Hand the new sync point to every stream and let each drain what it
    /// can.
    fn use_new_sync_point<S: StreamSink>(&mut self, new_sync: CueEvent, sink: &mut S) -> Result<()> {
        self.hint = self.sync_points.get_hint(new_sync.time_in_seconds);
        debug_assert!(self.hint > new_sync.time_in_seconds);

        for stream_index in 0..self.stream_states.len() {
            self.stream_states[stream_index]
                .cues
                .push_back(new_sync.clone());
            self.run_through_samples(stream_index, sink)?;
        }
        Ok(())
    }

    fn everyone_waiting_at_hint(&self) -> bool {
        self.stream_states.iter().all(|s| !s.samples.is_empty())
    }

    /// Merge-sort step between a stream's pending cues and buffered samples.
    fn run_through_samples<S: StreamSink>(
        &mut self,
        stream_index: usize,
        sink: &mut S,
    ) -> Result<()> {
        loop {
            let stream = &self.stream_states[stream_index];
            let (Some(cue), Some(sample)) = (stream.cues.front(), stream.samples.front()) else {
                break;
            };
            let info = stream.info.as_ref().unwrap();
            let cue_time = cue.time_in_seconds;
            let sample_time = time_in_seconds(info, sample);

            if sample_time < cue_time {
                let payload = self.stream_states[stream_index].samples.pop_front().unwrap();
                sink.send(StreamData {
                    stream_index,
                    payload,
                })?;
            } else {
                let cue = self.stream_states[stream_index].cues.pop_front().unwrap();
                self.dispatch_cue(stream_index, cue, sink)?;
            }
        }

        // With the cues out of the way, everything before the hint is safe
        // to release.
        loop {
            let stream = &self.stream_states[stream_index];
            if stream.cues.front().is_some() {
                break;
            }
            let Some(sample) = stream.samples.front() else {
                break;
            };
            let info = stream.info.as_ref().unwrap();
            if time_in_seconds(info, sample) >= self.hint {
                break;
            }
            let payload = self.stream_states[stream_index].samples.pop_front().unwrap();
            sink.send(StreamData {
                stream_index,
                payload,
            })?;
        }

        Ok(())
    }

    /// Send a cue downstream and advance the stream's program/ad state.
    fn dispatch_cue<S: StreamSink>(
        &mut self,
        stream_index: usize,
        cue: CueEvent,
        sink: &mut S,
    ) -> Result<()> {
        if let Some(signal) = &cue.signal {
            let state = if signal.is_start() {
                CueState::InAd
            } else {
                CueState::InProgram
            };
            self.stream_states[stream_index].state = state;
            debug!(stream_index, ?state, "stream cue state updated");
        }
        sink.send(StreamData::from_cue(stream_index, cue))
    }

    fn stream_state(&self, stream_index: usize) -> Result<&StreamState> {
        self.stream_states
            .get(stream_index)
            .ok_or_else(|| ChunkingError::InvalidStream(format!("no stream {stream_index}")))
    }

    fn stream_state_mut(&mut self, stream_index: usize) -> Result<&mut StreamState> {
        self.stream_states
            .get_mut(stream_index)
            .ok_or_else(|| ChunkingError::InvalidStream(format!("no stream {stream_index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splicepack_core::{MediaSample, TextSample, TimeScale};
    use splicepack_scte35::{
        DeliveryRestrictions, Scte35Event, SegmentationDescriptor, SegmentationUpid,
        SPLICE_DESCRIPTOR_IDENTIFIER,
    };

    #[derive(Default)]
    struct VecSink {
        items: Vec<StreamData>,
        flushed: Vec<usize>,
    }

    impl StreamSink for VecSink {
        fn send(&mut self, data: StreamData) -> Result<()> {
            self.items.push(data);
            Ok(())
        }

        fn flush_stream(&mut self, stream_index: usize) -> Result<()> {
            self.flushed.push(stream_index);
            Ok(())
        }
    }

    fn descriptor(type_id: u8) -> SegmentationDescriptor {
        SegmentationDescriptor {
            identifier: SPLICE_DESCRIPTOR_IDENTIFIER,
            event_id: 99,
            cancel: false,
            restrictions: Some(DeliveryRestrictions {
                web_delivery_allowed: true,
                no_regional_blackout: true,
                archive_allowed: true,
                device_restrictions: 0,
            }),
            components: None,
            duration: None,
            upid: SegmentationUpid {
                upid_type: 0x09,
                data: b"break".to_vec(),
            },
            segmentation_type_id: type_id,
            segment_num: 0,
            segments_expected: 0,
            sub_segment_num: None,
            sub_segments_expected: None,
        }
    }

    fn start_event(start_pts: i64, duration_pts: i64) -> Scte35Event {
        Scte35Event {
            start_time_pts: start_pts,
            duration: duration_pts,
            descriptor: descriptor(0x30),
        }
    }

    fn end_event(start_pts: i64) -> Scte35Event {
        Scte35Event {
            start_time_pts: start_pts,
            duration: 0,
            descriptor: descriptor(0x31),
        }
    }

    fn video_info() -> StreamInfo {
        StreamInfo::new(StreamType::Video, TimeScale::MPEG, "avc1.64001f")
    }

    fn audio_info() -> StreamInfo {
        StreamInfo::new(
            StreamType::Audio,
            TimeScale::new(48_000).unwrap(),
            "mp4a.40.2",
        )
    }

    fn cue_times(sink: &VecSink, stream_index: usize) -> Vec<f64> {
        sink.items
            .iter()
            .filter(|d| d.stream_index == stream_index)
            .filter_map(|d| match &d.payload {
                StreamPayload::Cue(cue) => Some(cue.time_in_seconds),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_video_key_frame_promotes_cue() {
        let mut handler = CueAlignmentHandler::new(2, None);
        let mut sink = VecSink::default();

        handler
            .process(StreamData::from_info(0, audio_info()), &mut sink)
            .unwrap();
        handler
            .process(StreamData::from_info(1, video_info()), &mut sink)
            .unwrap();

        // Signal at 10.0 s; next key frame lands at 10.2 s.
        handler
            .process(
                StreamData::from_scte35(1, start_event(900_000, 30 * 90_000)),
                &mut sink,
            )
            .unwrap();

        // Audio samples straddling the cue: midpoints at 10.19 and 10.21 s.
        let audio_a = MediaSample::new((10.18 * 48_000.0) as i64, (0.02 * 48_000.0) as i64);
        let audio_b = MediaSample::new((10.20 * 48_000.0) as i64, (0.02 * 48_000.0) as i64);
        handler
            .process(StreamData::from_media(0, audio_a), &mut sink)
            .unwrap();
        handler
            .process(StreamData::from_media(0, audio_b), &mut sink)
            .unwrap();

        // Non-key video frame passes straight through, then the key frame.
        handler
            .process(
                StreamData::from_media(1, MediaSample::new(909_000, 9_000)),
                &mut sink,
            )
            .unwrap();
        handler
            .process(
                StreamData::from_media(1, MediaSample::new(918_000, 9_000).key_frame()),
                &mut sink,
            )
            .unwrap();

        assert_eq!(cue_times(&sink, 1), vec![10.2]);

        // Audio stream gets the same cue; the 10.19 midpoint precedes it,
        // the 10.21 midpoint follows once the hint clears.
        let audio_items: Vec<_> = sink
            .items
            .iter()
            .filter(|d| d.stream_index == 0)
            .map(|d| match &d.payload {
                StreamPayload::Info(_) => "info",
                StreamPayload::Media(_) => "media",
                StreamPayload::Cue(_) => "cue",
                _ => "other",
            })
            .collect();
        assert_eq!(audio_items, vec!["info", "media", "cue", "media"]);
        assert_eq!(cue_times(&sink, 0), vec![10.2]);

        handler.on_flush_request(0, &mut sink).unwrap();
        handler.on_flush_request(1, &mut sink).unwrap();
        assert_eq!(sink.flushed, vec![0, 1]);
    }

    #[test]
    fn test_gop_misalignment_is_fatal() {
        let mut handler = CueAlignmentHandler::new(1, None);
        let mut sink = VecSink::default();

        handler
            .process(StreamData::from_info(0, video_info()), &mut sink)
            .unwrap();
        handler
            .process(
                StreamData::from_scte35(0, start_event(900_000, 0)),
                &mut sink,
            )
            .unwrap();
        // A second sync point 0.1 s after the first, as a VOD cue generator
        // sharing the queue would produce.
        handler
            .sync_points()
            .add(CueEvent::placement_opportunity(10.1, 0.0));

        // The next key frame lands past both sync points: the GOP crosses
        // the second one and the cut cannot be clean.
        let err = handler
            .process(
                StreamData::from_media(0, MediaSample::new(945_000, 9_000).key_frame()),
                &mut sink,
            )
            .unwrap_err();
        assert!(matches!(err, ChunkingError::NotGopAligned { .. }));
    }

    #[test]
    fn test_signal_state_machine_filters_duplicates() {
        let mut handler = CueAlignmentHandler::new(1, None);
        let mut sink = VecSink::default();

        handler
            .process(StreamData::from_info(0, video_info()), &mut sink)
            .unwrap();

        // An END before any START is dropped.
        handler
            .process(StreamData::from_scte35(0, end_event(100)), &mut sink)
            .unwrap();
        assert!(!handler.sync_points().has_more(-1.0));

        // START admitted.
        handler
            .process(
                StreamData::from_scte35(0, start_event(900_000, 0)),
                &mut sink,
            )
            .unwrap();
        assert!(handler.sync_points().has_more(-1.0));

        // Key frame dispatches the cue; stream is now in the ad.
        handler
            .process(
                StreamData::from_media(0, MediaSample::new(900_000, 9_000).key_frame()),
                &mut sink,
            )
            .unwrap();
        assert_eq!(cue_times(&sink, 0), vec![10.0]);
        assert!(!handler.sync_points().has_more(-1.0));

        // A second START while in the ad is dropped.
        handler
            .process(
                StreamData::from_scte35(0, start_event(1_000_000, 0)),
                &mut sink,
            )
            .unwrap();
        assert!(!handler.sync_points().has_more(-1.0));

        // An END while in the ad is admitted.
        handler
            .process(StreamData::from_scte35(0, end_event(1_800_000)), &mut sink)
            .unwrap();
        assert_eq!(handler.sync_points().get_hint(-1.0), 20.0);
    }

    #[test]
    fn test_no_video_mode_broadcasts_at_hint() {
        let mut handler = CueAlignmentHandler::new(2, None);
        let mut sink = VecSink::default();

        handler
            .process(StreamData::from_info(0, audio_info()), &mut sink)
            .unwrap();
        let text_info = StreamInfo::new(StreamType::Text, TimeScale::new(1000).unwrap(), "wvtt");
        handler
            .process(StreamData::from_info(1, text_info), &mut sink)
            .unwrap();

        handler
            .process(
                StreamData::from_scte35(0, start_event(900_000, 0)),
                &mut sink,
            )
            .unwrap();

        // Samples past the cue time on both streams; once everyone is
        // waiting, the cue self-promotes at its requested time.
        handler
            .process(
                StreamData::from_media(0, MediaSample::new(490_000, 1_000)),
                &mut sink,
            )
            .unwrap();
        handler
            .process(
                StreamData::from_text(1, TextSample::new(10_500, 11_000)),
                &mut sink,
            )
            .unwrap();

        assert_eq!(cue_times(&sink, 0), vec![10.0]);
        assert_eq!(cue_times(&sink, 1), vec![10.0]);
    }

    #[test]
    fn test_backpressure_bound() {
        let mut handler = CueAlignmentHandler::new(2, None);
        let mut sink = VecSink::default();

        handler
            .process(StreamData::from_info(0, audio_info()), &mut sink)
            .unwrap();
        handler
            .process(StreamData::from_info(1, video_info()), &mut sink)
            .unwrap();

        // A pending cue far in the future holds audio back; stream 1 never
        // feeds, so the audio buffer grows until the bound trips.
        handler
            .process(
                StreamData::from_scte35(1, start_event(0, 0)),
                &mut sink,
            )
            .unwrap();

        let mut result = Ok(());
        for i in 0..=MAX_BUFFER_SIZE as i64 {
            let sample = MediaSample::new(i * 10, 10);
            result = handler.process(StreamData::from_media(0, sample), &mut sink);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(
            result,
            Err(ChunkingError::Backpressure { stream_index: 0, .. })
        ));
    }

    #[test]
    fn test_flush_drops_trailing_cues_except_text() {
        let mut handler = CueAlignmentHandler::new(2, None);
        let mut sink = VecSink::default();

        handler
            .process(StreamData::from_info(0, audio_info()), &mut sink)
            .unwrap();
        let text_info = StreamInfo::new(StreamType::Text, TimeScale::new(1000).unwrap(), "wvtt");
        handler
            .process(StreamData::from_info(1, text_info), &mut sink)
            .unwrap();

        // Cue at 5 s, but audio ends at 2 s and text runs to 6 s.
        handler
            .process(
                StreamData::from_scte35(0, start_event(450_000, 0)),
                &mut sink,
            )
            .unwrap();
        handler
            .process(
                StreamData::from_media(0, MediaSample::new(48_000, 48_000)),
                &mut sink,
            )
            .unwrap();
        handler
            .process(
                StreamData::from_text(1, TextSample::new(1_000, 6_000)),
                &mut sink,
            )
            .unwrap();

        handler.on_flush_request(0, &mut sink).unwrap();
        handler.on_flush_request(1, &mut sink).unwrap();

        // Audio stream: trailing cue dropped. Text stream: cue at 5 s is
        // inside the last sample's extent, so it goes out.
        assert_eq!(cue_times(&sink, 0), Vec::<f64>::new());
        assert_eq!(cue_times(&sink, 1), vec![5.0]);
        assert_eq!(sink.flushed, vec![0, 1]);
    }
}
