//! Broker session for the jukebridge daemon.
//!
//! Wires the prober, scheduler, router and card watcher to one MQTT client
//! and runs them until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use jukebridge_core::command::ScriptRunner;
use jukebridge_core::config::{Config, MqttConfig, PathsConfig};
use jukebridge_core::status::{
    Normalizer, Prober, RefreshCadence, SENTINEL, disk_stats, read_stamp,
};
use jukebridge_core::topic::Topics;
use rumqttc::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use rumqttc::{
    AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration,
    Transport,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::card_watcher::{CardWatcher, forward_swipes};
use crate::error::{DaemonError, Result};
use crate::publisher::{MqttPublisher, Publisher};
use crate::router::Router;
use crate::scheduler::Scheduler;

const STATE_ONLINE: &str = "online";
const STATE_OFFLINE: &str = "offline";

const CLIENT_CAPACITY: usize = 64;
const SESSION_EVENT_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// What the event loop driver forwards to the session handler.
#[derive(Debug)]
enum SessionEvent {
    Connected,
    Message { topic: String, payload: Vec<u8> },
}

/// Build client options: keep-alive, credentials, offline last-will and TLS.
///
/// # Errors
///
/// Returns an error if certificate files cannot be read or the TLS settings
/// are inconsistent.
pub fn mqtt_options(config: &MqttConfig, topics: &Topics) -> Result<MqttOptions> {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    options.set_last_will(LastWill::new(
        topics.state(),
        STATE_OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));

    if let Some(transport) = transport(config)? {
        options.set_transport(transport);
    }

    Ok(options)
}

/// CA alone gives server-authenticated TLS, CA with certificate and key gives
/// mutual TLS, certificate and key alone give mutual TLS against the system
/// trust store, nothing gives plain TCP.
fn transport(config: &MqttConfig) -> Result<Option<Transport>> {
    match (&config.ca_file, &config.cert_file, &config.key_file) {
        (None, None, None) => Ok(None),
        (Some(ca), None, None) => {
            info!("Using TLS with CA {}", ca.display());
            Ok(Some(Transport::tls(std::fs::read(ca)?, None, None)))
        }
        (Some(ca), Some(cert), Some(key)) => {
            info!("Using mutual TLS with certificate {}", cert.display());
            let client_auth = (std::fs::read(cert)?, std::fs::read(key)?);
            Ok(Some(Transport::tls(
                std::fs::read(ca)?,
                Some(client_auth),
                None,
            )))
        }
        (None, Some(cert), Some(key)) => {
            info!(
                "Using mutual TLS with certificate {} and system roots",
                cert.display()
            );
            let client_config =
                system_client_config(&std::fs::read(cert)?, &std::fs::read(key)?)?;
            Ok(Some(Transport::tls_with_config(TlsConfiguration::Rustls(
                Arc::new(client_config),
            ))))
        }
        _ => Err(DaemonError::Tls(
            "certFile and keyFile must be set together".to_string(),
        )),
    }
}

/// Client config presenting the PEM `cert`/`key` pair and trusting the
/// platform's root certificates.
fn system_client_config(cert: &[u8], key: &[u8]) -> Result<ClientConfig> {
    let chain = rustls_pemfile::certs(&mut &cert[..]).collect::<std::io::Result<Vec<_>>>()?;
    if chain.is_empty() {
        return Err(DaemonError::Tls("no certificate in certFile".to_string()));
    }
    let key = rustls_pemfile::private_key(&mut &key[..])?
        .ok_or_else(|| DaemonError::Tls("no private key in keyFile".to_string()))?;

    let mut roots = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = roots.add_parsable_certificates(certs);
            debug!("Loaded {} system roots ({} ignored)", added, ignored);
        }
        Err(e) => warn!("Cannot load system root certificates: {}", e),
    }

    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| DaemonError::Tls(e.to_string()))
}

/// Publish the retained connect-time announcements.
///
/// # Errors
///
/// Stops at the first message the transport refuses.
pub async fn announce<P: Publisher>(
    publisher: &P,
    topics: &Topics,
    paths: &PathsConfig,
) -> Result<()> {
    let version = read_stamp(&paths.version_file());
    let edition = read_stamp(&paths.edition_file());

    let disk_path = paths.disk_path.clone();
    let (disk_total, disk_avail) = tokio::task::spawn_blocking(move || disk_stats(&disk_path))
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| (SENTINEL.to_string(), SENTINEL.to_string()));

    publisher
        .publish(topics.state(), STATE_ONLINE.to_string(), true)
        .await?;
    publisher.publish(topics.version(), version, true).await?;
    publisher.publish(topics.edition(), edition, true).await?;
    publisher.publish(topics.disk_total(), disk_total, true).await?;
    publisher.publish(topics.disk_avail(), disk_avail, true).await?;
    Ok(())
}

fn spawn_eventloop(
    mut eventloop: EventLoop,
    tx: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("Connected to broker ({:?})", ack.code);
                    let _ = tx.send(SessionEvent::Connected).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let event = SessionEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                    if tx.send(event).await.is_err() {
                        debug!("Session handler gone, dropping message");
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("Disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if shutdown.is_cancelled() {
                        break;
                    }
                    warn!("MQTT connection error, reconnecting: {}", e);
                    sleep(RECONNECT_DELAY).await;
                }
            }
        }
    })
}

async fn subscribe(client: &AsyncClient, topics: &Topics) {
    for filter in topics.subscriptions() {
        match client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
            Ok(()) => info!("Subscribed to {}", filter),
            Err(e) => error!("Failed to subscribe to {}: {}", filter, e),
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Run the daemon until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the broker options cannot be built.
pub async fn run(config: Config) -> Result<()> {
    let topics = Topics::new(config.mqtt.base_topic.as_str());
    let options = mqtt_options(&config.mqtt, &topics)?;
    info!(
        "Connecting to {}:{} as {}",
        config.mqtt.host, config.mqtt.port, config.mqtt.client_id
    );

    let (client, eventloop) = AsyncClient::new(options, CLIENT_CAPACITY);
    let publisher = Arc::new(MqttPublisher::new(client.clone()));
    let shutdown = CancellationToken::new();

    let cadence = Arc::new(RefreshCadence::new(&config.refresh));
    let scheduler = Arc::new(Scheduler::new(
        Prober::new(&config),
        Arc::clone(&publisher),
        Normalizer::new(cadence),
        topics.clone(),
    ));
    let router = Arc::new(Router::new(
        Arc::clone(&scheduler),
        Arc::clone(&publisher),
        ScriptRunner::spawn(&config),
        topics.clone(),
    ));

    let (event_tx, mut event_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
    let driver = spawn_eventloop(eventloop, event_tx, shutdown.clone());

    tokio::spawn(Arc::clone(&scheduler).run(shutdown.clone()));

    let card_file = config.paths.latest_card_file();
    let (swipe_tx, swipe_rx) = mpsc::unbounded_channel();
    let _card_watcher = match CardWatcher::spawn(&card_file, swipe_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Card swipes will not be reported: {}", e);
            None
        }
    };
    tokio::spawn(forward_swipes(
        swipe_rx,
        card_file,
        topics.clone(),
        Arc::clone(&publisher),
        Arc::clone(&scheduler),
        shutdown.clone(),
    ));

    let session_client = client.clone();
    let session_topics = topics.clone();
    let session_publisher = Arc::clone(&publisher);
    let paths = config.paths.clone();
    let session_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = session_shutdown.cancelled() => break,
                event = event_rx.recv() => event,
            };
            match event {
                Some(SessionEvent::Connected) => {
                    subscribe(&session_client, &session_topics).await;
                    if let Err(e) =
                        announce(session_publisher.as_ref(), &session_topics, &paths).await
                    {
                        warn!("Failed to announce: {}", e);
                    }
                }
                Some(SessionEvent::Message { topic, payload }) => {
                    // Actions start here, in delivery order; only the probe
                    // and publish work runs concurrently.
                    if let Some(followup) = router.accept(&topic, &payload) {
                        let router = Arc::clone(&router);
                        tokio::spawn(async move {
                            router.finish(followup).await;
                        });
                    }
                }
                None => break,
            }
        }
    });

    info!("Ready");
    shutdown_signal().await;
    info!("Shutdown requested");
    shutdown.cancel();

    if let Err(e) = publisher
        .publish(topics.state(), STATE_OFFLINE.to_string(), true)
        .await
    {
        warn!("Failed to publish offline state: {}", e);
    }
    if let Err(e) = client.disconnect().await {
        warn!("Failed to disconnect: {}", e);
    }
    if timeout(SHUTDOWN_FLUSH_TIMEOUT, driver).await.is_err() {
        debug!("Event loop did not finish within {:?}", SHUTDOWN_FLUSH_TIMEOUT);
    }

    Ok(())
}
