//! Demo integrations shipped with the daemon.

pub mod door_sensor;
pub mod weather;

use std::sync::Arc;

use hamqtt_app::trigger_registry::TriggerRegistry;
use hamqtt_domain::error::HamqttError;

pub use door_sensor::DoorSensor;
pub use weather::Weather;

/// Register every built-in integration with `registry`.
///
/// # Errors
///
/// Returns the first registration error.
pub fn register_all(registry: &TriggerRegistry) -> Result<(), HamqttError> {
    registry.register_scheduled(Arc::new(Weather))?;
    registry.register_subscribed(Arc::new(DoorSensor::default()))?;
    Ok(())
}
