//! Serialises payloads and discovery documents onto the connection.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use hamqtt_domain::connection::{ConnectionState, OutboundMessage};
use hamqtt_domain::discovery::DiscoveryDocument;
use hamqtt_domain::error::PublishError;
use hamqtt_domain::topic;

use crate::ports::Connection;

/// Publishes on the shared connection with at-least-once delivery.
///
/// Cheap to clone; every clone talks to the same connection.
#[derive(Clone)]
pub struct Publisher {
    connection: Arc<dyn Connection>,
    discovery_prefix: Arc<str>,
}

impl Publisher {
    /// Create a publisher announcing discovery documents under `discovery_prefix`.
    pub fn new(connection: Arc<dyn Connection>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            connection,
            discovery_prefix: Arc::from(discovery_prefix.into()),
        }
    }

    #[must_use]
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.state() == ConnectionState::Connected
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Serialise `payload` as compact JSON and publish it to `topic`.
    ///
    /// Keys are never rewritten. Payload types carry the snake_case naming
    /// Home Assistant templates expect: plain Rust fields already are, and
    /// `#[serde(rename)]` attributes are emitted verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NotConnected`] outside the `Connected` state,
    /// [`PublishError::InvalidTopic`] for a topic containing wildcards,
    /// [`PublishError::Serialize`] if serialisation fails and
    /// [`PublishError::Transport`] if the transport rejects the message.
    #[tracing::instrument(skip(self, payload))]
    pub async fn publish<T>(&self, topic: &str, payload: &T) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.ensure_ready(topic)?;
        let payload = serde_json::to_vec(payload).map_err(PublishError::Serialize)?;
        self.send(OutboundMessage::new(topic, payload)).await
    }

    /// Publish a plain-text payload (a bare state value such as `ON`).
    ///
    /// # Errors
    ///
    /// Same as [`publish`](Self::publish), minus serialisation.
    #[tracing::instrument(skip(self, text))]
    pub async fn publish_text(&self, topic: &str, text: &str) -> Result<(), PublishError> {
        self.ensure_ready(topic)?;
        self.send(OutboundMessage::new(topic, text.as_bytes())).await
    }

    /// Finalise component identities and publish `document` (retained) to
    /// its discovery topic. Returns the topic it was published to.
    ///
    /// # Errors
    ///
    /// Same as [`publish`](Self::publish).
    #[tracing::instrument(skip_all, fields(device = document.device().name()))]
    pub async fn publish_discovery_document(
        &self,
        document: &mut DiscoveryDocument,
    ) -> Result<String, PublishError> {
        document.assign_unique_ids();
        let topic = document.topic(&self.discovery_prefix);
        self.ensure_ready(&topic)?;
        let payload = document.to_payload().map_err(PublishError::Serialize)?;
        self.send(OutboundMessage::new(topic.as_str(), payload).retained())
            .await?;
        Ok(topic)
    }

    fn ensure_ready(&self, topic: &str) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        if !topic::is_valid_topic(topic) {
            return Err(PublishError::InvalidTopic(topic.to_string()));
        }
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), PublishError> {
        let topic = message.topic.clone();
        self.connection.publish(message).await?;
        tracing::debug!(%topic, "published");
        Ok(())
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("discovery_prefix", &self.discovery_prefix)
            .field("state", &self.connection.state())
            .finish_non_exhaustive()
    }
}
