//! Convenience re-exports for common usage.

pub use crate::notifier::PlaylistNotifier;

pub use splicepack_chunking::{
    CueAlignmentHandler, CueEvent, CueEventType, StreamData, StreamPayload, StreamSink,
    SyncPointQueue,
};
pub use splicepack_core::{
    MediaSample, StreamInfo, StreamType, TextSample, TimeScale, MPEG_TIMESCALE,
};
pub use splicepack_hls::{
    AudioInfo, EncryptionMethod, HlsParams, HlsPlaylistType, MediaInfo, MediaPlaylist,
    SignalExitEntry, SignalReturnEntry, SpliceType, TextInfo, VideoInfo,
};
pub use splicepack_scte35::{Scte35Event, SectionDecoder, SpliceInfoSection};
