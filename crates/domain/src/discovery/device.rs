//! Device and origin blocks of a discovery document.

use serde::Serialize;

use crate::error::SchemaError;

/// The physical or logical device an integration exposes.
///
/// Immutable once built; use [`Device::builder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    name: String,
    identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    configuration_url: Option<String>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// The identifier used in discovery topics (the first one).
    #[must_use]
    pub fn primary_identifier(&self) -> &str {
        self.identifiers.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    name: Option<String>,
    identifiers: Vec<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    sw_version: Option<String>,
    hw_version: Option<String>,
    configuration_url: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a stable identifier. The first one also names the discovery topic.
    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifiers.push(identifier.into());
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn sw_version(mut self, version: impl Into<String>) -> Self {
        self.sw_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn hw_version(mut self, version: impl Into<String>) -> Self {
        self.hw_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn configuration_url(mut self, url: impl Into<String>) -> Self {
        self.configuration_url = Some(url.into());
        self
    }

    /// Consume the builder and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::EmptyDeviceName`] when the name is missing or
    /// empty and [`SchemaError::NoDeviceIdentifiers`] when no non-empty
    /// identifier was given.
    pub fn build(self) -> Result<Device, SchemaError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(SchemaError::EmptyDeviceName);
        }
        let identifiers: Vec<String> = self
            .identifiers
            .into_iter()
            .filter(|id| !id.is_empty())
            .collect();
        if identifiers.is_empty() {
            return Err(SchemaError::NoDeviceIdentifiers);
        }
        Ok(Device {
            name,
            identifiers,
            manufacturer: self.manufacturer,
            model: self.model,
            sw_version: self.sw_version,
            hw_version: self.hw_version,
            configuration_url: self.configuration_url,
        })
    }
}

/// The application that publishes a discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    support_url: Option<String>,
}

impl Origin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sw_version: None,
            support_url: None,
        }
    }

    #[must_use]
    pub fn sw_version(mut self, version: impl Into<String>) -> Self {
        self.sw_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn support_url(mut self, url: impl Into<String>) -> Self {
        self.support_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
