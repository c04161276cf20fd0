//! Error types for the jukebridge daemon.

/// Errors that can occur in the daemon
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] jukebridge_core::Error),

    /// Broker request could not be queued
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Inconsistent TLS settings
    #[error("TLS configuration error: {0}")]
    Tls(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
