//! MQTT adapter error types.

use hamqtt_domain::error::{ConnectionError, HamqttError, ValidationError};

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The configuration was rejected before connecting.
    #[error("invalid MQTT configuration")]
    Config(#[source] ValidationError),
}

impl MqttError {
    /// Convert into a [`ConnectionError`] for propagation across the
    /// connection port.
    #[must_use]
    pub fn into_domain(self) -> ConnectionError {
        ConnectionError::Transport(Box::new(self))
    }
}

impl From<MqttError> for ConnectionError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<MqttError> for HamqttError {
    fn from(err: MqttError) -> Self {
        match err {
            MqttError::Config(validation) => HamqttError::Validation(validation),
            other => HamqttError::Connection(other.into_domain()),
        }
    }
}
