//! Playlist generation integration tests: the end-to-end scenarios driven
//! through the notifier and written to disk.

use std::fs;

use splicepack::prelude::*;
use splicepack_scte35::{
    SegmentationDescriptor, SegmentationUpid, SPLICE_DESCRIPTOR_IDENTIFIER,
};
use tempfile::tempdir;

const TS: i64 = 90_000;

fn video_media_info() -> MediaInfo {
    MediaInfo {
        video: Some(VideoInfo {
            time_scale: TS as u32,
            codec: "avc1.64001f".into(),
            ..VideoInfo::default()
        }),
        segment_template: Some("v-$Number$.m4s".into()),
        ..MediaInfo::default()
    }
}

fn scte35_event(type_id: u8, start_pts: i64, duration_pts: i64) -> Scte35Event {
    Scte35Event {
        start_time_pts: start_pts,
        duration: duration_pts,
        descriptor: SegmentationDescriptor {
            identifier: SPLICE_DESCRIPTOR_IDENTIFIER,
            event_id: 0x77,
            cancel: false,
            restrictions: None,
            components: None,
            duration: (duration_pts > 0).then_some(duration_pts as u64),
            upid: SegmentationUpid::default(),
            segmentation_type_id: type_id,
            segment_num: 0,
            segments_expected: 0,
            sub_segment_num: None,
            sub_segments_expected: None,
        },
    }
}

/// VOD, three 2-second segments, no ads.
#[test]
fn test_vod_three_segments() {
    let dir = tempdir().unwrap();
    let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
    let id = notifier
        .register_stream(video_media_info(), "video.m3u8", "video", "v")
        .unwrap();

    notifier.on_new_segment(id, "s1.m4s", 0, 2 * TS, 0, 500_000).unwrap();
    notifier
        .on_new_segment(id, "s2.m4s", 2 * TS, 2 * TS, 0, 510_000)
        .unwrap();
    notifier
        .on_new_segment(id, "s3.m4s", 4 * TS, 2 * TS, 0, 490_000)
        .unwrap();

    let content = fs::read_to_string(dir.path().join("video.m3u8")).unwrap();
    assert!(content.starts_with("#EXTM3U\n#EXT-X-VERSION:6\n"));
    assert!(content.contains("#EXT-X-TARGETDURATION:2\n"));
    assert_eq!(content.matches("#EXTINF:2.000,\n").count(), 3);
    assert!(content.contains("s1.m4s\n"));
    assert!(content.contains("s3.m4s\n"));
    assert!(content.ends_with("#EXT-X-ENDLIST\n"));
}

/// Live sliding window: 2-second segments, 10-second window. After the 11th
/// segment only the ones ending after 10 s remain and the sequence number
/// accounts for every removed segment.
#[test]
fn test_live_sliding_window() {
    let dir = tempdir().unwrap();
    let params = HlsParams::default()
        .with_playlist_type(HlsPlaylistType::Live)
        .with_time_shift_buffer_depth(10.0);
    let mut notifier = PlaylistNotifier::new(params, dir.path()).unwrap();
    let id = notifier
        .register_stream(video_media_info(), "video.m3u8", "video", "v")
        .unwrap();

    for i in 0..11i64 {
        let name = format!("s{i}.m4s");
        notifier
            .on_new_segment(id, &name, i * 2 * TS, 2 * TS, 0, 400_000)
            .unwrap();
    }

    let playlist = notifier.playlist(id).unwrap();
    assert_eq!(playlist.media_sequence_number() + playlist.num_entries() as u64, 11);

    let content = fs::read_to_string(dir.path().join("video.m3u8")).unwrap();
    assert!(content.contains("#EXT-X-MEDIA-SEQUENCE:5\n"));
    assert!(!content.contains("s4.m4s"));
    for i in 5..11 {
        assert!(content.contains(&format!("s{i}.m4s")), "missing segment {i}");
    }
    assert!(!content.contains("#EXT-X-ENDLIST"));
}

/// The first encryption change after unencrypted segments is preceded by a
/// discontinuity.
#[test]
fn test_discontinuity_on_encryption() {
    let dir = tempdir().unwrap();
    let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
    let id = notifier
        .register_stream(video_media_info(), "video.m3u8", "video", "v")
        .unwrap();

    notifier.on_new_segment(id, "s1.m4s", 0, 2 * TS, 0, 500_000).unwrap();
    notifier
        .on_new_segment(id, "s2.m4s", 2 * TS, 2 * TS, 0, 500_000)
        .unwrap();
    notifier
        .on_encryption_update(
            id,
            EncryptionMethod::Aes128,
            "https://k",
            &[],
            &[0x00],
            "identity",
            "",
        )
        .unwrap();
    notifier
        .on_new_segment(id, "s3.m4s", 4 * TS, 2 * TS, 0, 500_000)
        .unwrap();
    notifier
        .on_new_segment(id, "s4.m4s", 6 * TS, 2 * TS, 0, 500_000)
        .unwrap();

    let content = fs::read_to_string(dir.path().join("video.m3u8")).unwrap();
    let discontinuity = content.find("#EXT-X-DISCONTINUITY\n").unwrap();
    let key = content.find("#EXT-X-KEY:METHOD=AES-128,URI=\"https://k\"").unwrap();
    let s2 = content.find("s2.m4s").unwrap();
    let s3 = content.find("s3.m4s").unwrap();
    assert!(s2 < discontinuity && discontinuity < key && key < s3);
}

/// Signal-exit followed by five 6-second ad segments produces span markers
/// before segments 2..5 and a return on add_signal_return.
#[test]
fn test_signal_span_emission() {
    let dir = tempdir().unwrap();
    let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
    let id = notifier
        .register_stream(video_media_info(), "video.m3u8", "video", "v")
        .unwrap();

    // Ad break starts at 30 s and runs 30 s.
    notifier
        .on_cue_event(
            id,
            &CueEvent::from_scte35(scte35_event(0x30, 30 * TS, 30 * TS)),
        )
        .unwrap();
    for i in 0..5i64 {
        let name = format!("ad{i}.m4s");
        notifier
            .on_new_segment(id, &name, (30 + i * 6) * TS, 6 * TS, 0, 600_000)
            .unwrap();
    }
    notifier
        .on_cue_event(id, &CueEvent::from_scte35(scte35_event(0x31, 60 * TS, 0)))
        .unwrap();
    notifier.flush().unwrap();

    let content = fs::read_to_string(dir.path().join("video.m3u8")).unwrap();
    assert_eq!(content.matches("#EXT-X-SIGNAL-EXIT:30.000,").count(), 1);
    assert_eq!(content.matches("#EXT-X-SIGNAL-SPAN:").count(), 4);
    for position in ["6.000", "12.000", "18.000", "24.000"] {
        assert!(
            content.contains(&format!("#EXT-X-SIGNAL-SPAN:{position}/30.000,SpliceType=LiveDAI")),
            "missing span at {position}"
        );
    }
    assert!(content.contains("#EXT-X-SIGNAL-RETURN:SpliceType=LiveDAI"));

    // Span markers sit immediately before their segments.
    let span_6 = content.find("#EXT-X-SIGNAL-SPAN:6.000").unwrap();
    let ad0 = content.find("ad0.m4s").unwrap();
    let ad1 = content.find("ad1.m4s").unwrap();
    assert!(ad0 < span_6 && span_6 < ad1);
}

/// A placement-opportunity cue renders its marker tag.
#[test]
fn test_placement_opportunity_cue() {
    let dir = tempdir().unwrap();
    let mut notifier = PlaylistNotifier::new(HlsParams::default(), dir.path()).unwrap();
    let id = notifier
        .register_stream(video_media_info(), "video.m3u8", "video", "v")
        .unwrap();

    notifier.on_new_segment(id, "s1.m4s", 0, 2 * TS, 0, 400_000).unwrap();
    notifier
        .on_cue_event(id, &CueEvent::placement_opportunity(2.0, 0.0))
        .unwrap();
    notifier
        .on_new_segment(id, "s2.m4s", 2 * TS, 2 * TS, 0, 400_000)
        .unwrap();

    let content = fs::read_to_string(dir.path().join("video.m3u8")).unwrap();
    let marker = content.find("#EXT-X-PLACEMENT-OPPORTUNITY\n").unwrap();
    let s1 = content.find("s1.m4s").unwrap();
    let s2 = content.find("s2.m4s").unwrap();
    assert!(s1 < marker && marker < s2);
}

/// Target duration covers the longest segment, rounded up, when the
/// playlist renders for the first time.
#[test]
fn test_target_duration_invariant() {
    let mut playlist = MediaPlaylist::new(HlsParams::default(), "video.m3u8", "video", "v");
    playlist.set_media_info(video_media_info()).unwrap();

    playlist.add_segment("s1.m4s", 0, 2 * TS, 0, 400_000);
    // 2.5-second segment forces the target duration up to 3.
    playlist.add_segment("s2.m4s", 2 * TS, 2 * TS + TS / 2, 0, 400_000);

    let content = playlist.render();
    assert!(content.contains("#EXT-X-TARGETDURATION:3\n"));
    assert!(content.contains("#EXTINF:2.500,\n"));
}
