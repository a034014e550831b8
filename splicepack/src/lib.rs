//! # Splicepack
//!
//! An HLS packaging core: converts a time-ordered stream of media segments,
//! key frames, encryption changes and SCTE-35 ad-insertion signals into HLS
//! media playlists, with ad-break cues aligned at GOP boundaries across all
//! renditions.
//!
//! # Architecture
//!
//! ```text
//! [TS section payload] → SCTE-35 parser → Scte35Event
//!          │
//!          ▼
//! [Cue-alignment handler] ──(aligned CueEvent)──►┬── audio MediaPlaylist
//!          ▲                                      ├── video MediaPlaylist
//!          │                                      ├── subtitle MediaPlaylist
//! [Per-stream samples]                            └── iframe MediaPlaylist
//!                                                      │
//!                                                      ▼
//!                                             atomic playlist writes
//! ```
//!
//! # Crates
//!
//! - [`splicepack_core`] - bitstream access, time scales, stream model
//! - [`splicepack_scte35`] - splice information section parsing
//! - [`splicepack_chunking`] - sync points and multi-stream cue alignment
//! - [`splicepack_hls`] - media playlist generation and rendering
//!
//! This facade re-exports the public surface and adds the
//! [`PlaylistNotifier`], which routes aligned pipeline events onto
//! per-stream playlists.
//!
//! # Example
//!
//! ```no_run
//! use splicepack::prelude::*;
//!
//! let params = HlsParams::default().with_playlist_type(HlsPlaylistType::Live)
//!     .with_time_shift_buffer_depth(30.0);
//! let mut notifier = PlaylistNotifier::new(params, "out")?;
//!
//! let media_info = MediaInfo {
//!     video: Some(VideoInfo { time_scale: 90_000, codec: "avc1.64001f".into(),
//!         ..VideoInfo::default() }),
//!     segment_template: Some("video-$Number$.m4s".into()),
//!     ..MediaInfo::default()
//! };
//! let video = notifier.register_stream(media_info, "video.m3u8", "video", "v")?;
//! notifier.on_new_segment(video, "video-1.m4s", 0, 180_000, 0, 512_000)?;
//! # Ok::<(), splicepack::HlsError>(())
//! ```

pub mod notifier;
pub mod prelude;

pub use notifier::PlaylistNotifier;

pub use splicepack_chunking::{
    ChunkingError, CueAlignmentHandler, CueEvent, CueEventType, StreamData, StreamPayload,
    StreamSink, SyncPointQueue,
};
pub use splicepack_core::{
    BitReader, BitWriter, MediaSample, StreamInfo, StreamType, TextSample, TimeScale,
    MPEG_TIMESCALE,
};
pub use splicepack_hls::{
    AudioInfo, BandwidthEstimator, EncryptionMethod, HlsEntry, HlsError, HlsParams,
    HlsPlaylistType, MediaInfo, MediaPlaylist, MediaPlaylistStreamType, SegmentInfoEntry,
    SignalExitEntry, SignalReturnEntry, SignalSpanEntry, SpliceType, TextInfo, VideoInfo,
};
pub use splicepack_scte35::{
    Scte35Error, Scte35Event, SectionDecoder, SegmentationDescriptor, SpliceCommand,
    SpliceInfoSection, SpliceInsert, SpliceTime,
};
