//! Outbound publication seam.

use std::future::Future;

use rumqttc::{AsyncClient, QoS};
use tracing::trace;

use crate::error::Result;

/// Sink for outbound messages.
pub trait Publisher: Send + Sync {
    /// Queue one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be handed to the transport.
    fn publish(
        &self,
        topic: String,
        payload: String,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Publishes through the broker client.
///
/// Retained announcements go out at least once, live status at most once.
#[derive(Debug, Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    #[must_use]
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&self, topic: String, payload: String, retain: bool) -> Result<()> {
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        trace!("publish {} = {} (retain: {})", topic, payload, retain);
        self.client
            .publish(topic, qos, retain, payload.into_bytes())
            .await?;
        Ok(())
    }
}
