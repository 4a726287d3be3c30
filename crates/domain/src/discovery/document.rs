//! The discovery document published for one integration.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;

use super::component::ComponentDescriptor;
use super::device::{Device, Origin};
use crate::error::SchemaError;

/// Topic level used when a document's components span several platforms.
const MIXED_COMPONENT_TYPE: &str = "device";

/// A device and the components it exposes, ready to publish.
///
/// Built through [`DiscoveryDocument::builder`], which fills every
/// component's `unique_id` from its key.
#[derive(Debug, PartialEq, Serialize)]
pub struct DiscoveryDocument {
    device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_topic: Option<String>,
    components: BTreeMap<String, ComponentDescriptor>,
}

impl DiscoveryDocument {
    /// Create a builder for constructing a [`DiscoveryDocument`].
    #[must_use]
    pub fn builder() -> DiscoveryDocumentBuilder {
        DiscoveryDocumentBuilder::default()
    }

    /// Set every component's `unique_id` to its key where it is still unset.
    ///
    /// Calling it again changes nothing.
    pub fn assign_unique_ids(&mut self) -> &mut Self {
        for (key, descriptor) in &mut self.components {
            descriptor.assign_unique_id(key);
        }
        self
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Components in key order.
    pub fn components(&self) -> impl Iterator<Item = (&str, &ComponentDescriptor)> {
        self.components.iter().map(|(key, c)| (key.as_str(), c))
    }

    #[must_use]
    pub fn component(&self, key: &str) -> Option<&ComponentDescriptor> {
        self.components.get(key)
    }

    /// The component-type level of the discovery topic: the shared platform
    /// of all components, or `device` when they differ.
    #[must_use]
    pub fn component_type(&self) -> &'static str {
        let mut platforms = self.components.values().map(ComponentDescriptor::platform);
        match platforms.next() {
            Some(first) if platforms.all(|p| p == first) => first.as_str(),
            _ => MIXED_COMPONENT_TYPE,
        }
    }

    /// `<prefix>/<component-type>/<device-identifier>/config`.
    ///
    /// Characters Home Assistant does not accept in an object id are
    /// replaced by `_`.
    #[must_use]
    pub fn topic(&self, discovery_prefix: &str) -> String {
        let object_id = sanitize_object_id(self.device.primary_identifier());
        crate::topic::join([
            discovery_prefix,
            self.component_type(),
            object_id.as_str(),
            "config",
        ])
    }

    /// Compact JSON with snake_case keys.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if a platform option cannot be
    /// serialised.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn sanitize_object_id(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Step-by-step builder for [`DiscoveryDocument`].
#[derive(Debug, Default)]
pub struct DiscoveryDocumentBuilder {
    device: Option<Device>,
    origin: Option<Origin>,
    state_topic: Option<String>,
    components: Vec<(String, ComponentDescriptor)>,
}

impl DiscoveryDocumentBuilder {
    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Document-wide state topic shared by components that do not set one.
    #[must_use]
    pub fn state_topic(mut self, topic: impl Into<String>) -> Self {
        self.state_topic = Some(topic.into());
        self
    }

    /// Add a component under `key`. The descriptor is moved into the document.
    #[must_use]
    pub fn component(mut self, key: impl Into<String>, descriptor: ComponentDescriptor) -> Self {
        self.components.push((key.into(), descriptor));
        self
    }

    /// Consume the builder, assign component identities and return the document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingDevice`] without a device,
    /// [`SchemaError::NoComponents`] without components,
    /// [`SchemaError::EmptyComponentKey`] for an empty key and
    /// [`SchemaError::DuplicateComponentKey`] when a key repeats.
    pub fn build(self) -> Result<DiscoveryDocument, SchemaError> {
        let device = self.device.ok_or(SchemaError::MissingDevice)?;
        if self.components.is_empty() {
            return Err(SchemaError::NoComponents);
        }

        let mut components = BTreeMap::new();
        for (key, descriptor) in self.components {
            if key.is_empty() {
                return Err(SchemaError::EmptyComponentKey);
            }
            if let Some(reserved) = descriptor.reserved_option() {
                return Err(SchemaError::ReservedOption {
                    key: reserved.to_string(),
                    component: key,
                });
            }
            match components.entry(key) {
                Entry::Occupied(entry) => {
                    return Err(SchemaError::DuplicateComponentKey(entry.key().clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(descriptor);
                }
            }
        }

        let mut document = DiscoveryDocument {
            device,
            origin: self.origin,
            state_topic: self.state_topic,
            components,
        };
        document.assign_unique_ids();
        Ok(document)
    }
}
