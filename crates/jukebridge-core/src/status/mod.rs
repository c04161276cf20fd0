//! Player and system status.
//!
//! A probe cycle gathers a [`RawStatus`] from the player and the OS, which
//! [`normalize`] turns into an [`AttributeMap`]: the canonical, ordered set of
//! string attributes published under `<base>/attribute/<name>`.

mod cadence;
mod codec;
mod jobs;
mod normalize;
mod player;
mod probe;
mod system;

use std::collections::BTreeMap;
use std::fmt;

pub use cadence::RefreshCadence;
pub use codec::{CodecError, PlayerCodec, PlayerCommand, PlayerLine};
pub use jobs::{JobQueue, minutes_until, parse_atq};
pub use normalize::{Normalizer, format_hms, normalize};
pub use player::{PlayerStatus, query_player};
pub use probe::{Prober, RawStatus, StatusSource, read_stamp};
pub use system::{describe_throttling, disk_stats, parse_temperature, parse_throttled, service_running};

/// Placeholder for a value the player or the OS did not report.
pub const SENTINEL: &str = "-";

/// One named facet of player or system status.
///
/// Declaration order is publication order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    State,
    Volume,
    Repeat,
    RepeatMode,
    Random,
    Mute,
    File,
    Artist,
    AlbumArtist,
    Title,
    Album,
    Track,
    TrackDate,
    Elapsed,
    Duration,
    MaxVolume,
    VolStep,
    IdleTime,
    LastCard,
    Rfid,
    Gpio,
    RemainingStopAfter,
    RemainingShutdownAfter,
    RemainingShutdownVolumeReduction,
    RemainingIdle,
    Throttling,
    Temperature,
}

impl Attribute {
    pub const ALL: [Attribute; 27] = [
        Attribute::State,
        Attribute::Volume,
        Attribute::Repeat,
        Attribute::RepeatMode,
        Attribute::Random,
        Attribute::Mute,
        Attribute::File,
        Attribute::Artist,
        Attribute::AlbumArtist,
        Attribute::Title,
        Attribute::Album,
        Attribute::Track,
        Attribute::TrackDate,
        Attribute::Elapsed,
        Attribute::Duration,
        Attribute::MaxVolume,
        Attribute::VolStep,
        Attribute::IdleTime,
        Attribute::LastCard,
        Attribute::Rfid,
        Attribute::Gpio,
        Attribute::RemainingStopAfter,
        Attribute::RemainingShutdownAfter,
        Attribute::RemainingShutdownVolumeReduction,
        Attribute::RemainingIdle,
        Attribute::Throttling,
        Attribute::Temperature,
    ];

    /// Name used in topics and in the `help` listing
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::State => "state",
            Attribute::Volume => "volume",
            Attribute::Repeat => "repeat",
            Attribute::RepeatMode => "repeat_mode",
            Attribute::Random => "random",
            Attribute::Mute => "mute",
            Attribute::File => "file",
            Attribute::Artist => "artist",
            Attribute::AlbumArtist => "albumartist",
            Attribute::Title => "title",
            Attribute::Album => "album",
            Attribute::Track => "track",
            Attribute::TrackDate => "trackdate",
            Attribute::Elapsed => "elapsed",
            Attribute::Duration => "duration",
            Attribute::MaxVolume => "maxvolume",
            Attribute::VolStep => "volstep",
            Attribute::IdleTime => "idletime",
            Attribute::LastCard => "last_card",
            Attribute::Rfid => "rfid",
            Attribute::Gpio => "gpio",
            Attribute::RemainingStopAfter => "remaining_stopafter",
            Attribute::RemainingShutdownAfter => "remaining_shutdownafter",
            Attribute::RemainingShutdownVolumeReduction => "remaining_shutdownvolumereduction",
            Attribute::RemainingIdle => "remaining_idle",
            Attribute::Throttling => "throttling",
            Attribute::Temperature => "temperature",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.as_str() == name)
    }

    /// Track attributes, only reported while the player is not stopped.
    #[must_use]
    pub fn is_track_metadata(self) -> bool {
        matches!(
            self,
            Attribute::File
                | Attribute::Artist
                | Attribute::AlbumArtist
                | Attribute::Title
                | Attribute::Album
                | Attribute::Track
                | Attribute::TrackDate
                | Attribute::Elapsed
                | Attribute::Duration
        )
    }

    /// Comma separated list of every attribute name.
    #[must_use]
    pub fn help_listing() -> String {
        Self::ALL.map(Attribute::as_str).join(", ")
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized status of one probe cycle.
///
/// Built once per cycle and never changed afterwards; a newer cycle produces
/// a new map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    values: BTreeMap<Attribute, String>,
}

impl AttributeMap {
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        self.values.get(&attribute).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, attribute: Attribute) -> bool {
        self.values.contains_key(&attribute)
    }

    /// Attributes in publication order
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &str)> {
        self.values.iter().map(|(attr, value)| (*attr, value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lower-cased player state, or the sentinel.
    #[must_use]
    pub fn state(&self) -> &str {
        self.get(Attribute::State).unwrap_or(SENTINEL)
    }

    pub(crate) fn insert(&mut self, attribute: Attribute, value: impl Into<String>) {
        self.values.insert(attribute, value.into());
    }
}

impl FromIterator<(Attribute, String)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (Attribute, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
