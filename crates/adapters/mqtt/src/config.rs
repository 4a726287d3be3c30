//! Broker connection configuration.

use serde::Deserialize;

use hamqtt_domain::discovery::DEFAULT_DISCOVERY_PREFIX;
use hamqtt_domain::error::ValidationError;
use hamqtt_domain::topic;

/// Configuration for the broker connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Identity of this node; used as client id and availability topic root.
    pub node_id: String,
    /// Broker hostname or IP address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client identifier; defaults to `node_id`.
    pub client_id: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Pause between failed connection attempts, in seconds.
    pub reconnect_delay_secs: u64,
    /// Prefix discovery documents are published under.
    pub discovery_prefix: String,
    /// Capacity of the client request queue.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            host: String::new(),
            port: 1883,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            channel_capacity: 64,
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn builder() -> MqttConfigBuilder {
        MqttConfigBuilder::default()
    }

    /// The client id presented to the broker.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.node_id)
    }

    /// `<node_id>/availability`, carrying `online` / `offline`.
    #[must_use]
    pub fn availability_topic(&self) -> String {
        topic::join([self.node_id.as_str(), "availability"])
    }

    /// Check that every required field is set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] naming the first missing
    /// field, or [`ValidationError::InvalidField`] for a value the broker
    /// could never accept.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.node_id.trim().is_empty() {
            return Err(ValidationError::MissingField("node_id"));
        }
        if !topic::is_valid_topic(&self.node_id) || self.node_id.contains('/') {
            return Err(ValidationError::InvalidField {
                field: "node_id",
                reason: "must be a single topic level without wildcards".to_string(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField("host"));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidField {
                field: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if self.username.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::MissingField("username"));
        }
        if self.password.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::MissingField("password"));
        }
        if self.discovery_prefix.is_empty() || !topic::is_valid_topic(&self.discovery_prefix) {
            return Err(ValidationError::InvalidField {
                field: "discovery_prefix",
                reason: "must be a non-empty topic without wildcards".to_string(),
            });
        }
        Ok(())
    }
}

/// Fluent builder for [`MqttConfig`].
///
/// ```
/// use hamqtt_adapter_mqtt::MqttConfig;
///
/// let config = MqttConfig::builder()
///     .node_id("attic")
///     .host("broker.local")
///     .credentials("hamqtt", "secret")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 1883);
/// ```
#[derive(Debug, Default)]
pub struct MqttConfigBuilder {
    config: MqttConfig,
}

impl MqttConfigBuilder {
    #[must_use]
    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.config.node_id = node_id.into();
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.discovery_prefix = prefix.into();
        self
    }

    /// Finish and validate.
    ///
    /// # Errors
    ///
    /// See [`MqttConfig::validate`].
    pub fn build(self) -> Result<MqttConfig, ValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> MqttConfig {
        MqttConfig::builder()
            .node_id("attic")
            .host("broker.local")
            .credentials("hamqtt", "secret")
            .build()
            .unwrap()
    }

    #[test]
    fn should_have_sensible_defaults() {
        let config = MqttConfig::default();
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive_secs, 30);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert_eq!(config.discovery_prefix, "homeassistant");
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            node_id = "attic"
            host = "mqtt.example.com"
            port = 8883
            username = "hamqtt"
            password = "secret"
            client_id = "attic-1"
            keep_alive_secs = 60
            discovery_prefix = "ha"
        "#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "mqtt.example.com");
        assert_eq!(config.port, 8883);
        assert_eq!(config.client_id(), "attic-1");
        assert_eq!(config.keep_alive_secs, 60);
        assert_eq!(config.discovery_prefix, "ha");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let toml = r#"host = "192.168.1.100""#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "192.168.1.100");
        assert_eq!(config.port, 1883);
        assert_eq!(config.reconnect_delay_secs, 5);
    }

    #[test]
    fn should_default_client_id_to_node_id() {
        assert_eq!(valid().client_id(), "attic");
    }

    #[test]
    fn should_derive_availability_topic_from_node_id() {
        assert_eq!(valid().availability_topic(), "attic/availability");
    }

    #[test]
    fn should_name_missing_field() {
        let missing_host = MqttConfig::builder()
            .node_id("attic")
            .credentials("hamqtt", "secret")
            .build();
        assert_eq!(missing_host, Err(ValidationError::MissingField("host")));

        let missing_credentials = MqttConfig::builder().node_id("attic").host("b").build();
        assert_eq!(
            missing_credentials,
            Err(ValidationError::MissingField("username"))
        );

        let missing_node = MqttConfig::builder().host("b").build();
        assert_eq!(missing_node, Err(ValidationError::MissingField("node_id")));
    }

    #[test]
    fn should_reject_node_id_spanning_topic_levels() {
        let mut config = valid();
        config.node_id = "attic/left".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidField { field: "node_id", .. })
        ));
    }

    #[test]
    fn should_reject_port_zero() {
        let result = MqttConfig::builder()
            .node_id("attic")
            .host("b")
            .port(0)
            .credentials("u", "p")
            .build();
        assert!(matches!(
            result,
            Err(ValidationError::InvalidField { field: "port", .. })
        ));
    }
}
