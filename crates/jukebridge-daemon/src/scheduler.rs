//! Periodic and on-demand publication of the attribute map.

use std::sync::{Arc, RwLock};

use jukebridge_core::status::{AttributeMap, Normalizer, StatusSource};
use jukebridge_core::topic::Topics;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::publisher::Publisher;

/// Probes, normalizes and publishes status.
///
/// Refreshes may overlap; each one publishes the map of its own probe and the
/// most recent map to finish is kept as [`Scheduler::last_map`].
pub struct Scheduler<S, P> {
    source: S,
    publisher: Arc<P>,
    normalizer: Normalizer,
    topics: Topics,
    last: RwLock<Option<Arc<AttributeMap>>>,
}

impl<S, P> Scheduler<S, P>
where
    S: StatusSource,
    P: Publisher,
{
    pub fn new(source: S, publisher: Arc<P>, normalizer: Normalizer, topics: Topics) -> Self {
        Self {
            source,
            publisher,
            normalizer,
            topics,
            last: RwLock::new(None),
        }
    }

    /// Probe and normalize without publishing.
    ///
    /// # Errors
    ///
    /// Returns the probe error when the player cannot be reached.
    pub async fn snapshot(&self) -> jukebridge_core::Result<Arc<AttributeMap>> {
        let raw = self.source.probe().await?;
        let now = chrono::Local::now().naive_local();
        let map = Arc::new(self.normalizer.apply(&raw, now));

        match self.last.write() {
            Ok(mut last) => *last = Some(Arc::clone(&map)),
            Err(_) => error!("Last map lock poisoned, not caching"),
        }

        Ok(map)
    }

    /// Map of the most recent successful probe, if any.
    pub fn last_map(&self) -> Option<Arc<AttributeMap>> {
        self.last.read().ok().and_then(|last| last.clone())
    }

    /// Publish every attribute of `map` in order, not retained.
    ///
    /// # Errors
    ///
    /// Stops at the first message the transport refuses.
    pub async fn publish_map(&self, map: &AttributeMap) -> Result<()> {
        for (attribute, value) in map.iter() {
            self.publisher
                .publish(self.topics.attribute(attribute), value.to_string(), false)
                .await?;
        }
        Ok(())
    }

    /// One full probe and publish, outside the periodic timer.
    ///
    /// Failures are logged; a failed probe publishes nothing.
    pub async fn refresh_now(&self) {
        let map = match self.snapshot().await {
            Ok(map) => map,
            Err(e) => {
                warn!("Status refresh skipped: {}", e);
                return;
            }
        };

        debug!("Publishing {} attributes (state: {})", map.len(), map.state());
        if let Err(e) = self.publish_map(&map).await {
            warn!("Failed to publish status: {}", e);
        }
    }

    /// Refresh, then wait the interval chosen by the refresh, until cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Status publication started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = self.refresh_now() => {}
            }

            let wait = self.normalizer.cadence().current();
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = sleep(wait) => {}
            }
        }
        info!("Status publication stopped");
    }
}
