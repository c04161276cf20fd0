//! Jukebridge daemon library.
//!
//! Bridges the jukebox player to an MQTT broker: periodic status publication,
//! inbound command routing and card swipe events.

pub mod card_watcher;
pub mod error;
pub mod publisher;
pub mod router;
pub mod scheduler;
pub mod server;

pub use error::{DaemonError, Result};
pub use publisher::{MqttPublisher, Publisher};
pub use router::{Followup, Router};
pub use scheduler::Scheduler;
pub use server::run;
