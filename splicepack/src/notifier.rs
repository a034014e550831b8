//! Fan-in from the alignment pipeline to per-stream playlists.
//!
//! The notifier owns one [`MediaPlaylist`] per registered stream and
//! translates pipeline events (new segments, key frames, aligned cues,
//! encryption updates) into playlist operations, republishing the playlist
//! file as it grows.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, warn};

use splicepack_chunking::{CueEvent, CueEventType};
use splicepack_hls::{
    EncryptionMethod, HlsError, HlsParams, MediaInfo, MediaPlaylist, Result, SignalExitEntry,
    SignalReturnEntry, SpliceType,
};

fn hex_prefixed(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

struct RegisteredStream {
    playlist: MediaPlaylist,
    playlist_path: PathBuf,
}

/// Routes pipeline events onto per-stream media playlists.
pub struct PlaylistNotifier {
    hls_params: HlsParams,
    output_dir: PathBuf,
    streams: HashMap<u32, RegisteredStream>,
    next_stream_id: u32,
}

impl PlaylistNotifier {
    /// Create a notifier writing playlists under `output_dir`.
    pub fn new(hls_params: HlsParams, output_dir: impl Into<PathBuf>) -> Result<Self> {
        hls_params.validate()?;
        Ok(Self {
            hls_params,
            output_dir: output_dir.into(),
            streams: HashMap::new(),
            next_stream_id: 0,
        })
    }

    /// Register a stream and its playlist file. Returns the stream id used
    /// by the other operations.
    pub fn register_stream(
        &mut self,
        media_info: MediaInfo,
        playlist_name: &str,
        name: &str,
        group_id: &str,
    ) -> Result<u32> {
        let mut playlist =
            MediaPlaylist::new(self.hls_params.clone(), playlist_name, name, group_id);
        playlist.set_media_info(media_info)?;

        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;
        let playlist_path = self.output_dir.join(playlist_name);
        self.streams.insert(
            stream_id,
            RegisteredStream {
                playlist,
                playlist_path,
            },
        );
        debug!(stream_id, playlist_name, "registered stream");
        Ok(stream_id)
    }

    /// Append a segment and republish the playlist.
    pub fn on_new_segment(
        &mut self,
        stream_id: u32,
        segment_name: &str,
        start_time: i64,
        duration: i64,
        start_byte_offset: u64,
        size: u64,
    ) -> Result<()> {
        let stream = self.stream_mut(stream_id)?;
        stream
            .playlist
            .add_segment(segment_name, start_time, duration, start_byte_offset, size);
        stream.playlist.write_to_file(&stream.playlist_path)
    }

    /// Record a video key frame for the stream's trick-play playlist.
    pub fn on_key_frame(
        &mut self,
        stream_id: u32,
        timestamp: i64,
        start_byte_offset: u64,
        size: u64,
    ) -> Result<()> {
        let stream = self.stream_mut(stream_id)?;
        stream
            .playlist
            .add_key_frame(timestamp, start_byte_offset, size);
        Ok(())
    }

    /// Apply an aligned cue event to the stream's playlist.
    ///
    /// The playlist file is not republished here; the entry becomes visible
    /// with the next segment write or flush.
    pub fn on_cue_event(&mut self, stream_id: u32, cue: &CueEvent) -> Result<()> {
        let stream = self.stream_mut(stream_id)?;

        match (cue.cue_type, &cue.signal) {
            (CueEventType::PlacementOpportunity, _) => {
                stream.playlist.add_placement_opportunity();
            }
            (CueEventType::Scte35, Some(signal)) if signal.is_start() => {
                let descriptor = &signal.descriptor;
                let mut entry = SignalExitEntry::new(SpliceType::LiveDai)
                    .with_event_id(descriptor.event_id)
                    .with_segmentation_type_id(descriptor.segmentation_type_id);
                if cue.duration > 0.0 {
                    entry = entry.with_duration(cue.duration);
                }
                if !descriptor.upid.data.is_empty() {
                    entry = entry.with_upid(BASE64.encode(&descriptor.upid.data));
                }
                if let Some(restrictions) = descriptor.restrictions {
                    entry = entry.with_restrictions(restrictions);
                }
                stream.playlist.add_signal_exit(entry);
            }
            (CueEventType::Scte35, Some(signal)) if signal.is_end() => {
                let duration = (cue.duration > 0.0).then_some(cue.duration);
                stream
                    .playlist
                    .add_signal_return(SignalReturnEntry::new(SpliceType::LiveDai, duration));
            }
            (CueEventType::Scte35, _) => {
                warn!(stream_id, "cue event carries no classifiable signal");
            }
        }

        Ok(())
    }

    /// Apply an encryption update. Key id and IV arrive as raw bytes and
    /// render hex-prefixed.
    #[allow(clippy::too_many_arguments)]
    pub fn on_encryption_update(
        &mut self,
        stream_id: u32,
        method: EncryptionMethod,
        key_uri: &str,
        key_id: &[u8],
        iv: &[u8],
        key_format: &str,
        key_format_versions: &str,
    ) -> Result<()> {
        let stream = self.stream_mut(stream_id)?;
        let key_id_hex = if key_id.is_empty() {
            String::new()
        } else {
            hex_prefixed(key_id)
        };
        let iv_hex = if iv.is_empty() {
            String::new()
        } else {
            hex_prefixed(iv)
        };
        stream.playlist.add_encryption_info(
            method,
            key_uri,
            &key_id_hex,
            &iv_hex,
            key_format,
            key_format_versions,
        );
        Ok(())
    }

    /// Write out every registered playlist.
    pub fn flush(&mut self) -> Result<()> {
        for stream in self.streams.values_mut() {
            stream.playlist.write_to_file(&stream.playlist_path)?;
        }
        Ok(())
    }

    /// Read access to a stream's playlist.
    pub fn playlist(&self, stream_id: u32) -> Option<&MediaPlaylist> {
        self.streams.get(&stream_id).map(|s| &s.playlist)
    }

    fn stream_mut(&mut self, stream_id: u32) -> Result<&mut RegisteredStream> {
        self.streams
            .get_mut(&stream_id)
            .ok_or(HlsError::UnknownStream(stream_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splicepack_scte35::{
        DeliveryRestrictions, Scte35Event, SegmentationDescriptor, SegmentationUpid,
        SPLICE_DESCRIPTOR_IDENTIFIER,
    };
    use tempfile::tempdir;

    fn audio_media_info() -> MediaInfo {
        MediaInfo {
            audio: Some(splicepack_hls::AudioInfo {
                time_scale: 90_000,
                codec: "mp4a.40.2".into(),
                language: Some("en".into()),
                channels: 2,
            }),
            segment_template: Some("a-$Number$.m4s".into()),
            ..MediaInfo::default()
        }
    }

    fn start_signal() -> Scte35Event {
        Scte35Event {
            start_time_pts: 900_000,
            duration: 30 * 90_000,
            descriptor: SegmentationDescriptor {
                identifier: SPLICE_DESCRIPTOR_IDENTIFIER,
                event_id: 0x1234,
                cancel: false,
                restrictions: Some(DeliveryRestrictions {
                    web_delivery_allowed: false,
                    no_regional_blackout: true,
                    archive_allowed: false,
                    device_restrictions: 0,
                }),
                components: None,
                duration: Some(30 * 90_000),
                upid: SegmentationUpid {
                    upid_type: 0x09,
                    data: vec![0x08, 0x08, 0x01, 0x02],
                },
                segmentation_type_id: 0x30,
                segment_num: 0,
                segments_expected: 0,
                sub_segment_num: None,
                sub_segments_expected: None,
            },
        }
    }

    #[test]
    fn test_unknown_stream_rejected() {
        let dir = tempdir().unwrap();
        let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
        let err = notifier
            .on_new_segment(42, "s.m4s", 0, 90_000, 0, 1000)
            .unwrap_err();
        assert!(matches!(err, HlsError::UnknownStream(42)));
    }

    #[test]
    fn test_cue_event_renders_signal_exit_with_base64_upid() {
        let dir = tempdir().unwrap();
        let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
        let id = notifier
            .register_stream(audio_media_info(), "audio.m3u8", "audio", "a")
            .unwrap();

        let cue = splicepack_chunking::CueEvent::from_scte35(start_signal());
        notifier.on_cue_event(id, &cue).unwrap();
        notifier
            .on_new_segment(id, "a-1.m4s", 900_000, 180_000, 0, 64_000)
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("audio.m3u8")).unwrap();
        assert!(content.contains("#EXT-X-SIGNAL-EXIT:30.000,SpliceType=LiveDAI"));
        assert!(content.contains("segmentationUpid=CAgBAg=="));
        assert!(content.contains("segmentationTypeId=48"));
        assert!(content.contains("noRegionalBlackoutFlag=1"));
    }

    #[test]
    fn test_encryption_update_hex_rendering() {
        let dir = tempdir().unwrap();
        let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
        let id = notifier
            .register_stream(audio_media_info(), "audio.m3u8", "audio", "a")
            .unwrap();

        notifier
            .on_encryption_update(
                id,
                EncryptionMethod::SampleAes,
                "skd://key",
                &[0xAB, 0xCD],
                &[0x01, 0x02],
                "com.apple.streamingkeydelivery",
                "1",
            )
            .unwrap();
        notifier.flush().unwrap();

        let content = std::fs::read_to_string(dir.path().join("audio.m3u8")).unwrap();
        assert!(content.contains(
            "#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"skd://key\",KEYID=0xabcd,IV=0x0102,\
             KEYFORMATVERSIONS=\"1\",KEYFORMAT=\"com.apple.streamingkeydelivery\""
        ));
    }
}
