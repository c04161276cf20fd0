//! Tests for status normalization
//!
//! Tests normalization of complete probe results including:
//! - Track metadata presence by play state
//! - Flag, mute and repeat mode derivation
//! - Sentinels for failed OS probes
//! - Remaining job timers and throttling text
//! - Cadence updates through the normalizer

use std::sync::Arc;
use std::time::Duration;

use super::fixtures::{
    PLAYING_RESPONSE, STOPPED_RESPONSE, make_player_only, make_raw_status, now, time,
};
use crate::config::RefreshConfig;
use crate::status::{Attribute, Normalizer, RefreshCadence, normalize};

#[test]
fn test_playing_map_has_every_attribute() {
    let map = normalize(&make_raw_status(PLAYING_RESPONSE), now());

    assert_eq!(map.len(), Attribute::ALL.len());
    for attribute in Attribute::ALL {
        assert!(map.contains(attribute), "missing {attribute}");
    }
}

#[test]
fn test_playing_map_values() {
    let map = normalize(&make_raw_status(PLAYING_RESPONSE), now());

    assert_eq!(map.get(Attribute::State), Some("play"));
    assert_eq!(map.get(Attribute::Volume), Some("45"));
    assert_eq!(map.get(Attribute::Mute), Some("false"));
    assert_eq!(map.get(Attribute::Repeat), Some("true"));
    assert_eq!(map.get(Attribute::RepeatMode), Some("playlist"));
    assert_eq!(map.get(Attribute::Random), Some("false"));
    assert_eq!(map.get(Attribute::File), Some("Kids/Song Three.mp3"));
    assert_eq!(map.get(Attribute::Artist), Some("The Band"));
    assert_eq!(map.get(Attribute::AlbumArtist), Some("The Band"));
    assert_eq!(map.get(Attribute::Title), Some("Song Three"));
    assert_eq!(map.get(Attribute::Album), Some("First Album"));
    assert_eq!(map.get(Attribute::Track), Some("3"));
    assert_eq!(map.get(Attribute::TrackDate), Some("2019"));
    assert_eq!(map.get(Attribute::Elapsed), Some("00:01:13"));
    assert_eq!(map.get(Attribute::Duration), Some("00:03:35"));
    assert_eq!(map.get(Attribute::MaxVolume), Some("80"));
    assert_eq!(map.get(Attribute::VolStep), Some("5"));
    assert_eq!(map.get(Attribute::IdleTime), Some("15"));
    assert_eq!(map.get(Attribute::LastCard), Some("0012345678"));
    assert_eq!(map.get(Attribute::Rfid), Some("true"));
    assert_eq!(map.get(Attribute::Gpio), Some("false"));
    assert_eq!(map.get(Attribute::RemainingStopAfter), Some("30"));
    assert_eq!(map.get(Attribute::RemainingShutdownAfter), Some("0"));
    assert_eq!(map.get(Attribute::RemainingShutdownVolumeReduction), Some("0"));
    assert_eq!(map.get(Attribute::RemainingIdle), Some("0"));
    assert_eq!(map.get(Attribute::Throttling), Some("OK"));
    assert_eq!(map.get(Attribute::Temperature), Some("48.3'C"));
}

#[test]
fn test_stopped_map_omits_track_metadata() {
    let map = normalize(&make_raw_status(STOPPED_RESPONSE), now());

    for attribute in Attribute::ALL {
        assert_eq!(
            map.contains(attribute),
            !attribute.is_track_metadata(),
            "{attribute}"
        );
    }
    assert_eq!(map.get(Attribute::State), Some("stop"));
    assert_eq!(map.get(Attribute::Mute), Some("true"));
    assert_eq!(map.get(Attribute::RepeatMode), Some("off"));
    assert_eq!(map.get(Attribute::Random), Some("true"));
}

#[test]
fn test_stop_omits_metadata_for_any_fields() {
    let variants: [&[(&str, &str)]; 4] = [
        &[("state", "stop")],
        &[("state", "STOP"), ("file", "a.mp3"), ("Title", "A")],
        &[("state", "stop"), ("elapsed", "12.0"), ("duration", "100")],
        &[("state", "stop"), ("time", "1:2"), ("Artist", "X")],
    ];

    for fields in variants {
        let map = normalize(&make_player_only(fields), now());
        assert!(
            map.iter().all(|(attr, _)| !attr.is_track_metadata()),
            "{fields:?}"
        );
    }
}

#[test]
fn test_state_is_lowercased() {
    let map = normalize(&make_player_only(&[("state", "PAUSE")]), now());
    assert_eq!(map.get(Attribute::State), Some("pause"));
}

#[test]
fn test_missing_state_is_sentinel_and_keeps_metadata() {
    let map = normalize(&make_player_only(&[("volume", "10")]), now());
    assert_eq!(map.get(Attribute::State), Some("-"));
    assert_eq!(map.get(Attribute::File), Some("-"));
    assert_eq!(map.get(Attribute::Track), Some("0"));
    assert_eq!(map.get(Attribute::Elapsed), Some("00:00:00"));
}

#[test]
fn test_mute_is_exact_zero() {
    for (volume, mute) in [("0", "true"), ("00", "false"), ("5", "false"), ("100", "false")] {
        let map = normalize(&make_player_only(&[("volume", volume)]), now());
        assert_eq!(map.get(Attribute::Mute), Some(mute), "volume {volume}");
    }

    let map = normalize(&make_player_only(&[]), now());
    assert_eq!(map.get(Attribute::Volume), Some("-"));
    assert_eq!(map.get(Attribute::Mute), Some("false"));
}

#[test]
fn test_repeat_mode_combinations() {
    let cases = [
        ("0", "0", "off"),
        ("0", "1", "off"),
        ("1", "0", "playlist"),
        ("1", "1", "single"),
        ("1", "oneshot", "single"),
    ];

    for (repeat, single, expected) in cases {
        let map = normalize(
            &make_player_only(&[("repeat", repeat), ("single", single)]),
            now(),
        );
        assert_eq!(
            map.get(Attribute::RepeatMode),
            Some(expected),
            "repeat={repeat} single={single}"
        );
    }
}

#[test]
fn test_missing_flags_are_sentinels() {
    let map = normalize(&make_player_only(&[("state", "play")]), now());
    assert_eq!(map.get(Attribute::Repeat), Some("-"));
    assert_eq!(map.get(Attribute::Random), Some("-"));
    assert_eq!(map.get(Attribute::RepeatMode), Some("single"));
}

#[test]
fn test_title_falls_back_to_file() {
    let map = normalize(
        &make_player_only(&[("state", "play"), ("file", "stream.mp3")]),
        now(),
    );
    assert_eq!(map.get(Attribute::Title), Some("stream.mp3"));
    assert_eq!(map.get(Attribute::Artist), Some("-"));
}

#[test]
fn test_duration_falls_back_to_time_field() {
    let map = normalize(
        &make_player_only(&[("state", "play"), ("time", "12:3725")]),
        now(),
    );
    assert_eq!(map.get(Attribute::Duration), Some("01:02:05"));
    assert_eq!(map.get(Attribute::Elapsed), Some("00:00:00"));
}

#[test]
fn test_garbage_seconds_are_zero() {
    let map = normalize(
        &make_player_only(&[("state", "pause"), ("elapsed", "soon"), ("duration", "-4")]),
        now(),
    );
    assert_eq!(map.get(Attribute::Elapsed), Some("00:00:00"));
    assert_eq!(map.get(Attribute::Duration), Some("00:00:00"));
}

#[test]
fn test_missing_temperature_keeps_other_fields() {
    let mut raw = make_raw_status(PLAYING_RESPONSE);
    raw.temperature = None;

    let map = normalize(&raw, now());
    assert_eq!(map.get(Attribute::Temperature), Some("-"));
    assert_eq!(map.get(Attribute::Throttling), Some("OK"));
    assert_eq!(map.get(Attribute::Volume), Some("45"));
    assert_eq!(map.len(), Attribute::ALL.len());
}

#[test]
fn test_failed_os_probes_use_sentinels() {
    let map = normalize(&make_player_only(&[("state", "stop")]), now());

    assert_eq!(map.get(Attribute::MaxVolume), Some("-"));
    assert_eq!(map.get(Attribute::VolStep), Some("-"));
    assert_eq!(map.get(Attribute::IdleTime), Some("-"));
    assert_eq!(map.get(Attribute::LastCard), Some("-"));
    assert_eq!(map.get(Attribute::Rfid), Some("false"));
    assert_eq!(map.get(Attribute::Gpio), Some("false"));
    assert_eq!(map.get(Attribute::RemainingIdle), Some("0"));
    assert_eq!(map.get(Attribute::Throttling), Some("-"));
    assert_eq!(map.get(Attribute::Temperature), Some("-"));
}

#[test]
fn test_remaining_timers() {
    let mut raw = make_player_only(&[("state", "stop")]);
    raw.jobs.shutdown_after = Some(time(15, 30, 0));
    raw.jobs.shutdown_volume_reduction = Some(time(14, 0, 0));
    raw.jobs.idle = Some(time(13, 0, 0));

    let map = normalize(&raw, now());
    assert_eq!(map.get(Attribute::RemainingShutdownAfter), Some("90"));
    assert_eq!(map.get(Attribute::RemainingShutdownVolumeReduction), Some("0"));
    // Already past today, counted from yesterday
    assert_eq!(map.get(Attribute::RemainingIdle), Some("1380"));
}

#[test]
fn test_throttling_warning() {
    let mut raw = make_player_only(&[("state", "stop")]);
    raw.throttled = Some(0x5_0005);

    let map = normalize(&raw, now());
    assert_eq!(
        map.get(Attribute::Throttling),
        Some(
            "WARNING: under-voltage detected, currently throttled, \
             under-voltage has occurred, throttling has occurred"
        )
    );
}

#[test]
fn test_normalizer_updates_cadence() {
    let cadence = Arc::new(RefreshCadence::new(&RefreshConfig {
        playing_secs: 5,
        idle_secs: 30,
    }));
    let normalizer = Normalizer::new(Arc::clone(&cadence));

    normalizer.apply(&make_raw_status(STOPPED_RESPONSE), now());
    assert_eq!(cadence.current(), Duration::from_secs(30));

    normalizer.apply(&make_raw_status(PLAYING_RESPONSE), now());
    assert_eq!(cadence.current(), Duration::from_secs(5));

    normalizer.apply(&make_player_only(&[("state", "pause")]), now());
    assert!(!normalizer.cadence().is_playing());
}
