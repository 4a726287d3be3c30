//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hamqtt.toml` in the working directory, or at the path in
//! `HAMQTT_CONFIG`. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use serde::Deserialize;

use hamqtt_adapter_mqtt::MqttConfig;
use hamqtt_domain::error::ValidationError;

const DEFAULT_PATH: &str = "hamqtt.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    pub runtime: RuntimeConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Runtime switches.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Run against an in-process loopback connection instead of a broker.
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, an override
    /// cannot be parsed, or a required setting is missing.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HAMQTT_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = var("MQTT_NODE_ID") {
            self.mqtt.node_id = val;
        }
        if let Some(val) = var("MQTT_HOST") {
            self.mqtt.host = val;
        }
        if let Some(val) = var("MQTT_PORT") {
            self.mqtt.port = val.parse().map_err(|_| ValidationError::InvalidField {
                field: "port",
                reason: format!("{val:?} is not a port number"),
            })?;
        }
        if let Some(val) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Some(val) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Some(val) = var("MQTT_DISCOVERY_PREFIX") {
            self.mqtt.discovery_prefix = val;
        }
        if let Some(val) = var("HAMQTT_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("HAMQTT_DRY_RUN") {
            self.runtime.dry_run = matches!(
                val.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }

    /// Broker settings are only required when a broker is used.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.dry_run {
            if self.mqtt.node_id.trim().is_empty() {
                return Err(ValidationError::MissingField("node_id").into());
            }
            return Ok(());
        }
        self.mqtt.validate()?;
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hamqttd=info,hamqtt_app=info,hamqtt_adapter_mqtt=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn complete() -> Config {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("MQTT_NODE_ID", "attic"),
                ("MQTT_HOST", "broker.local"),
                ("MQTT_USERNAME", "hamqtt"),
                ("MQTT_PASSWORD", "secret"),
            ]))
            .unwrap();
        config
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.discovery_prefix, "homeassistant");
        assert!(!config.runtime.dry_run);
        assert!(config.logging.filter.contains("hamqttd=info"));
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [mqtt]
            node_id = 'attic'
            host = '192.168.1.10'
            port = 1884
            username = 'hamqtt'
            password = 'secret'
            discovery_prefix = 'ha'

            [logging]
            filter = 'debug'

            [runtime]
            dry_run = true
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.node_id, "attic");
        assert_eq!(config.mqtt.host, "192.168.1.10");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.discovery_prefix, "ha");
        assert_eq!(config.logging.filter, "debug");
        assert!(config.runtime.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let path = std::env::temp_dir().join(format!("hamqtt-invalid-{}.toml", std::process::id()));
        std::fs::write(&path, "invalid {{{").unwrap();

        let result = Config::from_file(path.to_str().unwrap());

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn should_apply_env_overrides() {
        let config = complete();
        assert_eq!(config.mqtt.node_id, "attic");
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.username.as_deref(), Some("hamqtt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_prefer_rust_log_over_hamqtt_log() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("HAMQTT_LOG", "warn"), ("RUST_LOG", "trace")]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_unparseable_port_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(env(&[("MQTT_PORT", "eighty")]));
        assert!(matches!(
            result,
            Err(ConfigError::Validation(ValidationError::InvalidField { field: "port", .. }))
        ));
    }

    #[test]
    fn should_name_missing_credentials() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("MQTT_NODE_ID", "attic"), ("MQTT_HOST", "b")]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(ValidationError::MissingField("username")))
        ));
    }

    #[test]
    fn should_only_require_node_id_in_dry_run() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("HAMQTT_DRY_RUN", "true"), ("MQTT_NODE_ID", "attic")]))
            .unwrap();
        assert!(config.runtime.dry_run);
        assert!(config.validate().is_ok());

        config.mqtt.node_id.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(ValidationError::MissingField("node_id")))
        ));
    }
}
