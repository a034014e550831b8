//! # Splicepack HLS
//!
//! HLS media playlist generation with SCTE-35 ad signal tags.
//!
//! Each output stream owns one [`MediaPlaylist`]: a stateful entry log fed
//! with segments, key frames, encryption changes and ad signals, which
//! renders a spec-compliant playlist document and writes it atomically.
//!
//! Live playlists apply a sliding window bounded by the time-shift buffer
//! depth, maintain the media and discontinuity sequence numbers, and can
//! delete segment files that age out of the window. Ad breaks render as
//! `EXT-X-SIGNAL-EXIT` / `EXT-X-SIGNAL-SPAN` / `EXT-X-SIGNAL-RETURN` tags
//! spanning the segments of the break, plus `EXT-X-PLACEMENT-OPPORTUNITY`
//! markers for pre-configured slots.

pub mod bandwidth;
pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod media_playlist;
pub mod tag;

pub use bandwidth::BandwidthEstimator;
pub use config::{AudioInfo, HlsParams, HlsPlaylistType, MediaInfo, TextInfo, VideoInfo};
pub use entry::{
    EncryptionInfoEntry, EncryptionMethod, HlsEntry, SegmentInfoEntry, SignalExitEntry,
    SignalReturnEntry, SignalSpanEntry, SpliceType,
};
pub use error::{HlsError, Result};
pub use io::write_atomically;
pub use media_playlist::{MediaPlaylist, MediaPlaylistStreamType};
pub use tag::Tag;
