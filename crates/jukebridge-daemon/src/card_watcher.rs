//! Card swipe watcher.
//!
//! The reader writes each swiped token id to `Latest_RFID`. Every completed
//! write is announced on `event/card_swiped` and followed by a full refresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jukebridge_core::status::StatusSource;
use jukebridge_core::topic::Topics;
use notify::event::{AccessKind, AccessMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DaemonError, Result};
use crate::publisher::Publisher;
use crate::scheduler::Scheduler;

/// Keeps the underlying watcher alive; dropping it stops notifications.
pub struct CardWatcher {
    _watcher: RecommendedWatcher,
}

impl CardWatcher {
    /// Watch the directory holding `card_file` and send one `()` per
    /// close-after-write of that file.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no parent or the watch cannot be set.
    pub fn spawn(card_file: &Path, tx: mpsc::UnboundedSender<()>) -> Result<Self> {
        let parent = card_file.parent().ok_or_else(|| {
            DaemonError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Invalid card file path",
            ))
        })?;
        let file_name = card_file.file_name().map(ToOwned::to_owned);

        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    if is_close_write(&event.kind)
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref())
                    {
                        let _ = tx.send(());
                    }
                }
                Err(e) => error!("Card watcher error: {}", e),
            })?;

        watcher.watch(parent, RecursiveMode::NonRecursive)?;
        info!("Watching for card swipes in {:?}", parent);

        Ok(Self { _watcher: watcher })
    }
}

fn is_close_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Access(AccessKind::Close(AccessMode::Write)))
}

/// Read the swiped token, announce it and refresh.
///
/// Returns the token, or `None` when the file was empty or unreadable.
pub async fn handle_swipe<S, P>(
    card_file: &Path,
    topics: &Topics,
    publisher: &P,
    scheduler: &Scheduler<S, P>,
) -> Option<String>
where
    S: StatusSource,
    P: Publisher,
{
    let token = match tokio::fs::read_to_string(card_file).await {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            warn!("Failed to read {}: {}", card_file.display(), e);
            return None;
        }
    };
    if token.is_empty() {
        debug!("Ignoring empty card swipe");
        return None;
    }

    info!("Card swiped: {}", token);
    if let Err(e) = publisher
        .publish(topics.card_swiped(), token.clone(), false)
        .await
    {
        warn!("Failed to publish card swipe: {}", e);
    }
    scheduler.refresh_now().await;

    Some(token)
}

/// Handle swipe notifications until cancelled or the watcher goes away.
pub async fn forward_swipes<S, P>(
    mut rx: mpsc::UnboundedReceiver<()>,
    card_file: PathBuf,
    topics: Topics,
    publisher: Arc<P>,
    scheduler: Arc<Scheduler<S, P>>,
    shutdown: CancellationToken,
) where
    S: StatusSource,
    P: Publisher,
{
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            event = rx.recv() => {
                if event.is_none() {
                    debug!("Card watcher channel closed");
                    break;
                }
                handle_swipe(&card_file, &topics, publisher.as_ref(), scheduler.as_ref()).await;
            }
        }
    }
}
