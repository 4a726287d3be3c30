//! How a device and its components are announced to Home Assistant.
//!
//! A [`DiscoveryDocument`] owns one [`Device`], an optional [`Origin`] and a
//! keyed set of [`ComponentDescriptor`]s. Descriptors are built complete
//! except for their identity; the document fills every descriptor's
//! `unique_id` from the key it is stored under. Descriptors are moved into
//! the document and are not `Clone`, so one descriptor can never end up in
//! two documents.

mod component;
mod device;
mod document;

pub use component::{ComponentDescriptor, Platform};
pub use device::{Device, DeviceBuilder, Origin};
pub use document::{DiscoveryDocument, DiscoveryDocumentBuilder};

/// Default discovery prefix used by Home Assistant.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
