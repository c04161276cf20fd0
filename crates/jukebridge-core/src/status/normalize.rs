use std::sync::Arc;

use chrono::NaiveDateTime;

use super::jobs::minutes_until;
use super::player::PlayerStatus;
use super::probe::RawStatus;
use super::system::describe_throttling;
use super::{Attribute, AttributeMap, RefreshCadence, SENTINEL};

const STOPPED_STATE: &str = "stop";

const REPEAT_MODE_OFF: &str = "off";
const REPEAT_MODE_PLAYLIST: &str = "playlist";
const REPEAT_MODE_SINGLE: &str = "single";

/// Build the attribute map of one probe cycle.
///
/// Pure: the cadence side effect lives in [`Normalizer::apply`].
#[must_use]
pub fn normalize(raw: &RawStatus, now: NaiveDateTime) -> AttributeMap {
    let player = &raw.player;
    let mut map = AttributeMap::default();

    let state = player.get("state").unwrap_or(SENTINEL).to_lowercase();
    let volume = text(player, "volume", SENTINEL);
    let repeat = flag(player.get("repeat"));
    let mode = repeat_mode(&repeat, player.get("single"));

    map.insert(Attribute::Mute, (volume == "0").to_string());
    map.insert(Attribute::RepeatMode, mode);
    map.insert(Attribute::Repeat, repeat);
    map.insert(Attribute::Random, flag(player.get("random")));
    map.insert(Attribute::Volume, volume);

    if state != STOPPED_STATE {
        insert_track_metadata(&mut map, player);
    }
    map.insert(Attribute::State, state);

    map.insert(Attribute::MaxVolume, or_sentinel(raw.max_volume.as_deref()));
    map.insert(Attribute::VolStep, or_sentinel(raw.vol_step.as_deref()));
    map.insert(Attribute::IdleTime, or_sentinel(raw.idle_time.as_deref()));
    map.insert(Attribute::LastCard, or_sentinel(raw.last_card.as_deref()));

    map.insert(Attribute::Rfid, raw.rfid_running.to_string());
    map.insert(Attribute::Gpio, raw.gpio_running.to_string());

    let remaining = |job: Option<chrono::NaiveTime>| {
        job.map_or(0, |at| minutes_until(now, at)).to_string()
    };
    map.insert(
        Attribute::RemainingStopAfter,
        remaining(raw.jobs.stop_after),
    );
    map.insert(
        Attribute::RemainingShutdownAfter,
        remaining(raw.jobs.shutdown_after),
    );
    map.insert(
        Attribute::RemainingShutdownVolumeReduction,
        remaining(raw.jobs.shutdown_volume_reduction),
    );
    map.insert(Attribute::RemainingIdle, remaining(raw.jobs.idle));

    map.insert(
        Attribute::Throttling,
        raw.throttled
            .map_or_else(|| SENTINEL.to_string(), describe_throttling),
    );
    map.insert(
        Attribute::Temperature,
        or_sentinel(raw.temperature.as_deref()),
    );

    map
}

fn insert_track_metadata(map: &mut AttributeMap, player: &PlayerStatus) {
    let file = text(player, "file", SENTINEL);
    let title = player.get("Title").map_or_else(|| file.clone(), str::to_string);

    map.insert(Attribute::Artist, text(player, "Artist", SENTINEL));
    map.insert(Attribute::AlbumArtist, text(player, "AlbumArtist", SENTINEL));
    map.insert(Attribute::Title, title);
    map.insert(Attribute::Album, text(player, "Album", SENTINEL));
    map.insert(Attribute::Track, text(player, "Track", "0"));
    map.insert(Attribute::TrackDate, text(player, "Date", SENTINEL));
    map.insert(Attribute::File, file);

    map.insert(
        Attribute::Elapsed,
        format_hms(whole_seconds(player.get("elapsed"))),
    );
    map.insert(Attribute::Duration, format_hms(duration_seconds(player)));
}

/// Explicit `duration`, else the total part of `time: <elapsed>:<total>`.
fn duration_seconds(player: &PlayerStatus) -> u64 {
    let total = player.get("duration").or_else(|| {
        player
            .get("time")
            .and_then(|time| time.rsplit_once(':'))
            .map(|(_, total)| total)
    });
    whole_seconds(total)
}

/// Integer part of a float seconds value; missing, negative or garbage is 0.
// Truncation towards zero is the intended conversion
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(0, |secs| secs.trunc() as u64)
}

/// `HH:MM:SS`
#[must_use]
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

fn text(player: &PlayerStatus, key: &str, fallback: &str) -> String {
    player.get(key).unwrap_or(fallback).to_string()
}

fn or_sentinel(value: Option<&str>) -> String {
    value.unwrap_or(SENTINEL).to_string()
}

/// `"0"` is `false`, any other reported value is `true`.
fn flag(value: Option<&str>) -> String {
    match value {
        Some("0") => "false".to_string(),
        Some(_) => "true".to_string(),
        None => SENTINEL.to_string(),
    }
}

/// `off` unless repeating; then `playlist` only when `single` is exactly `"0"`.
fn repeat_mode(repeat: &str, single: Option<&str>) -> &'static str {
    if repeat == "false" {
        REPEAT_MODE_OFF
    } else if single == Some("0") {
        REPEAT_MODE_PLAYLIST
    } else {
        REPEAT_MODE_SINGLE
    }
}

/// Normalizes probe results and feeds the play state to the cadence.
#[derive(Debug, Clone)]
pub struct Normalizer {
    cadence: Arc<RefreshCadence>,
}

impl Normalizer {
    #[must_use]
    pub fn new(cadence: Arc<RefreshCadence>) -> Self {
        Self { cadence }
    }

    #[must_use]
    pub fn cadence(&self) -> &Arc<RefreshCadence> {
        &self.cadence
    }

    /// [`normalize`], then select the playing or idle cadence from the
    /// resulting `state`. Not pure: every call overwrites the shared cadence.
    pub fn apply(&self, raw: &RawStatus, now: NaiveDateTime) -> AttributeMap {
        let map = normalize(raw, now);
        self.cadence.observe_state(map.state());
        map
    }
}
