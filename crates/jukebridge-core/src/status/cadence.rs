use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::RefreshConfig;

const PLAYING_STATE: &str = "play";

/// Publication interval selected by the last observed play state.
///
/// Written after every successful normalization and read by the periodic
/// publisher between cycles, so a state change takes effect on the next wait.
#[derive(Debug)]
pub struct RefreshCadence {
    playing: AtomicBool,
    playing_interval: Duration,
    idle_interval: Duration,
}

impl RefreshCadence {
    /// Starts out at the playing interval until the first probe says otherwise.
    #[must_use]
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            playing: AtomicBool::new(true),
            playing_interval: config.playing(),
            idle_interval: config.idle(),
        }
    }

    pub fn observe_state(&self, state: &str) {
        self.playing
            .store(state == PLAYING_STATE, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current(&self) -> Duration {
        if self.is_playing() {
            self.playing_interval
        } else {
            self.idle_interval
        }
    }
}
