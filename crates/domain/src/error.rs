//! Common error types used across the workspace.
//!
//! Each failure class has its own typed error; [`HamqttError`] gathers them
//! with `#[from]` conversions for callers that only need to propagate.

/// Top-level error for the hamqtt runtime.
#[derive(Debug, thiserror::Error)]
pub enum HamqttError {
    #[error("invalid discovery document")]
    Schema(#[from] SchemaError),

    #[error("publish failed")]
    Publish(#[from] PublishError),

    #[error("conflicting trigger registration")]
    DuplicateTrigger(#[from] DuplicateTriggerError),

    #[error("invalid schedule")]
    ScheduleParse(#[from] ScheduleParseError),

    #[error("invalid configuration")]
    Validation(#[from] ValidationError),

    #[error("connection error")]
    Connection(#[from] ConnectionError),

    #[error("invalid topic filter {0:?}")]
    InvalidTopic(String),

    #[error("no integration named {0:?} is registered")]
    UnknownIntegration(String),
}

/// Failures reported by a connection implementation.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection is not in the `Connected` state.
    #[error("not connected")]
    NotConnected,

    /// The topic or topic filter is malformed.
    #[error("invalid topic {0:?}")]
    InvalidTopic(String),

    /// The underlying client failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A discovery document (or one of its parts) is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("discovery document has no device")]
    MissingDevice,

    #[error("discovery document has no components")]
    NoComponents,

    #[error("component key must not be empty")]
    EmptyComponentKey,

    #[error("component key {0:?} is used twice")]
    DuplicateComponentKey(String),

    /// `option` was used for a key the descriptor owns.
    #[error("component {component:?} sets reserved key {key:?} as an option")]
    ReservedOption { component: String, key: String },

    #[error("device name must not be empty")]
    EmptyDeviceName,

    #[error("device needs at least one identifier")]
    NoDeviceIdentifiers,
}

/// A message could not be handed to the broker.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The connection is not in the `Connected` state.
    #[error("no active connection")]
    NotConnected,

    /// The payload could not be serialised to JSON.
    #[error("failed to serialise payload")]
    Serialize(#[source] serde_json::Error),

    /// The topic is not a valid publish topic.
    #[error("invalid topic {0:?}")]
    InvalidTopic(String),

    /// The transport rejected the message.
    #[error("transport rejected the message")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ConnectionError> for PublishError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotConnected => Self::NotConnected,
            ConnectionError::InvalidTopic(topic) => Self::InvalidTopic(topic),
            ConnectionError::Transport(source) => Self::Transport(source),
        }
    }
}

/// Two registrations claim the same trigger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DuplicateTriggerError {
    #[error("topic {topic:?} is already claimed by integration {owner:?}")]
    Topic { topic: String, owner: String },

    #[error("an integration named {0:?} is already registered")]
    Name(String),
}

/// A cron expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleParseError {
    #[error("expected 5 cron fields, found {0}")]
    FieldCount(usize),

    #[error("invalid day-of-week value {0:?}")]
    DayOfWeek(String),

    #[error("invalid cron expression {expression:?}: {reason}")]
    Syntax { expression: String, reason: String },
}

/// Required configuration is missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must be set")]
    MissingField(&'static str),

    #[error("{field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_missing_field_in_message() {
        let err = ValidationError::MissingField("node_id");
        assert_eq!(err.to_string(), "node_id must be set");
    }

    #[test]
    fn should_convert_schema_error_into_hamqtt_error() {
        let err: HamqttError = SchemaError::MissingDevice.into();
        assert!(matches!(err, HamqttError::Schema(SchemaError::MissingDevice)));
    }

    #[test]
    fn should_describe_duplicate_topic_with_owner() {
        let err = DuplicateTriggerError::Topic {
            topic: "door/command".to_string(),
            owner: "door_sensor".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "topic \"door/command\" is already claimed by integration \"door_sensor\""
        );
    }

    #[test]
    fn should_map_connection_errors_onto_publish_errors() {
        let err: PublishError = ConnectionError::NotConnected.into();
        assert!(matches!(err, PublishError::NotConnected));

        let err: PublishError = ConnectionError::InvalidTopic("a/#".to_string()).into();
        assert!(matches!(err, PublishError::InvalidTopic(topic) if topic == "a/#"));
    }

    #[test]
    fn should_display_not_connected_error() {
        assert_eq!(PublishError::NotConnected.to_string(), "no active connection");
    }
}
