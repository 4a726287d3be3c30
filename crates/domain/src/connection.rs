//! Connection state and the messages exchanged with a broker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the process-wide broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

/// Edge notifications emitted by a connection.
///
/// `Connected` is emitted on *every* successful (re)connection, so a
/// subscriber sees each transition even when the state flips back and forth
/// faster than it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// MQTT quality of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// A message to hand to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

impl OutboundMessage {
    /// An at-least-once, non-retained message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: Qos::AtLeastOnce,
            retain: false,
        }
    }

    #[must_use]
    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    #[must_use]
    pub fn with_qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_outbound_message_to_at_least_once() {
        let msg = OutboundMessage::new("a/b", "x");
        assert_eq!(msg.qos, Qos::AtLeastOnce);
        assert!(!msg.retain);
    }

    #[test]
    fn should_mark_message_as_retained() {
        let msg = OutboundMessage::new("a/b", "x").retained();
        assert!(msg.retain);
    }

    #[test]
    fn should_decode_json_payload() {
        let msg = InboundMessage::new("door/command", r#"{"action":"open"}"#);
        let value: serde_json::Value = msg.json().unwrap();
        assert_eq!(value["action"], "open");
        assert_eq!(msg.payload_str(), Some(r#"{"action":"open"}"#));
    }

    #[test]
    fn should_order_qos_levels() {
        assert!(Qos::AtLeastOnce > Qos::AtMostOnce);
        assert!(Qos::ExactlyOnce > Qos::AtLeastOnce);
    }

    #[test]
    fn should_display_connection_state() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
