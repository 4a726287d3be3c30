//! # hamqtt-adapter-mqtt
//!
//! MQTT adapter — connects hamqtt to a broker via `rumqttc`.
//!
//! ## Responsibilities
//! - Configure and validate the broker connection ([`MqttConfig`])
//! - Implement the connection port ([`MqttConnection`]): track the session,
//!   announce node availability, deliver publications and route inbound
//!   messages to subscribers by topic filter
//! - Re-establish the session and its subscriptions after a drop
//!
//! ## Dependency rule
//! Depends on `hamqtt-app` and `hamqtt-domain`. Nothing depends on this crate
//! except the binary.

pub mod config;
pub mod connection;
pub mod error;
mod router;

pub use config::{MqttConfig, MqttConfigBuilder};
pub use connection::MqttConnection;
pub use error::MqttError;
