//! Component descriptors, one Home Assistant entity each.

use std::fmt;

use serde::Serialize;

/// Home Assistant entity platform of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Button,
    Climate,
    Cover,
    DeviceTracker,
    Fan,
    Light,
    Lock,
    Number,
    Select,
    Sensor,
    Switch,
    Text,
}

impl Platform {
    /// The platform name as used in discovery topics and payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BinarySensor => "binary_sensor",
            Self::Button => "button",
            Self::Climate => "climate",
            Self::Cover => "cover",
            Self::DeviceTracker => "device_tracker",
            Self::Fan => "fan",
            Self::Light => "light",
            Self::Lock => "lock",
            Self::Number => "number",
            Self::Select => "select",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys serialised from dedicated fields. Passing one to
/// [`ComponentDescriptor::option`] would emit it twice.
const RESERVED_KEYS: &[&str] = &[
    "platform",
    "unique_id",
    "name",
    "state_topic",
    "command_topic",
    "value_template",
    "device_class",
    "state_class",
    "unit_of_measurement",
    "icon",
    "json_attributes_topic",
    "entity_category",
];

/// Configuration of one component inside a discovery document.
///
/// Everything is set through the chained setters except `unique_id`, which
/// only the owning [`DiscoveryDocument`](super::DiscoveryDocument) assigns.
/// Platform-specific keys without a dedicated setter go through
/// [`option`](Self::option).
#[derive(Debug, PartialEq, Serialize)]
pub struct ComponentDescriptor {
    platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    unique_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_attributes_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_category: Option<String>,
    #[serde(flatten)]
    options: serde_json::Map<String, serde_json::Value>,
}

impl ComponentDescriptor {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            unique_id: None,
            name: None,
            state_topic: None,
            command_topic: None,
            value_template: None,
            device_class: None,
            state_class: None,
            unit_of_measurement: None,
            icon: None,
            json_attributes_topic: None,
            entity_category: None,
            options: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn sensor() -> Self {
        Self::new(Platform::Sensor)
    }

    #[must_use]
    pub fn binary_sensor() -> Self {
        Self::new(Platform::BinarySensor)
    }

    #[must_use]
    pub fn switch() -> Self {
        Self::new(Platform::Switch)
    }

    #[must_use]
    pub fn button() -> Self {
        Self::new(Platform::Button)
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn state_topic(mut self, topic: impl Into<String>) -> Self {
        self.state_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn command_topic(mut self, topic: impl Into<String>) -> Self {
        self.command_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn value_template(mut self, template: impl Into<String>) -> Self {
        self.value_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn device_class(mut self, class: impl Into<String>) -> Self {
        self.device_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn state_class(mut self, class: impl Into<String>) -> Self {
        self.state_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn unit_of_measurement(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn json_attributes_topic(mut self, topic: impl Into<String>) -> Self {
        self.json_attributes_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn entity_category(mut self, category: impl Into<String>) -> Self {
        self.entity_category = Some(category.into());
        self
    }

    /// Set an arbitrary platform-specific key (`min`, `options`, `payload_on`, …).
    ///
    /// Keys that have their own setter, plus `platform` and `unique_id`, are
    /// refused when the document is built.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// First option key that collides with a dedicated field.
    pub(super) fn reserved_option(&self) -> Option<&str> {
        self.options
            .keys()
            .map(String::as_str)
            .find(|key| RESERVED_KEYS.contains(key))
    }

    /// Fill the identity from the document key. An identity that is already
    /// set is left alone.
    pub(super) fn assign_unique_id(&mut self, key: &str) {
        if self.unique_id.is_none() {
            self.unique_id = Some(key.to_string());
        }
    }
}
