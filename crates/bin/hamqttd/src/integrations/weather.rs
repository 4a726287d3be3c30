//! Hourly weather report from a simulated station.

use async_trait::async_trait;
use chrono::Timelike;
use serde::Serialize;

use hamqtt_app::ports::{Integration, InvocationContext, Scheduled};
use hamqtt_domain::discovery::{ComponentDescriptor, Device, DiscoveryDocument, Origin};
use hamqtt_domain::error::SchemaError;

pub const STATE_TOPIC: &str = "weather/state";
pub const DEVICE_IDENTIFIER: &str = "weather_device";

/// Publishes a temperature and humidity reading every hour, and once on
/// every connection.
#[derive(Debug, Default)]
pub struct Weather;

/// Payload of [`STATE_TOPIC`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReading {
    pub temperature: f64,
    pub humidity: u8,
}

impl WeatherReading {
    /// Deterministic daily curve: coldest and most humid at midnight.
    #[must_use]
    pub fn simulated(hour: u32) -> Self {
        let distance_from_noon = f64::from(12_u32.abs_diff(hour % 24));
        Self {
            temperature: 24.0 - distance_from_noon * 0.75,
            humidity: u8::try_from(45 + 2 * 12_u32.abs_diff(hour % 24)).unwrap_or(u8::MAX),
        }
    }
}

impl Integration for Weather {
    fn name(&self) -> &str {
        "Weather"
    }

    fn discovery(&self) -> Result<Option<DiscoveryDocument>, SchemaError> {
        let device = Device::builder()
            .name("Weather")
            .identifier(DEVICE_IDENTIFIER)
            .manufacturer("hamqtt")
            .model("Simulated weather station")
            .build()?;
        let document = DiscoveryDocument::builder()
            .device(device)
            .origin(Origin::new("hamqtt").sw_version(env!("CARGO_PKG_VERSION")))
            .state_topic(STATE_TOPIC)
            .component(
                "weather_temperature",
                ComponentDescriptor::sensor()
                    .name("Temperature")
                    .device_class("temperature")
                    .state_class("measurement")
                    .unit_of_measurement("°C")
                    .value_template("{{ value_json.temperature }}"),
            )
            .component(
                "weather_humidity",
                ComponentDescriptor::sensor()
                    .name("Humidity")
                    .device_class("humidity")
                    .state_class("measurement")
                    .unit_of_measurement("%")
                    .value_template("{{ value_json.humidity }}"),
            )
            .build()?;
        Ok(Some(document))
    }
}

#[async_trait]
impl Scheduled for Weather {
    fn cron_expression(&self) -> &str {
        "0 * * * *"
    }

    fn run_on_startup(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &InvocationContext) -> anyhow::Result<()> {
        let reading = WeatherReading::simulated(ctx.fired_at().hour());
        ctx.publisher().publish(STATE_TOPIC, &reading).await?;
        tracing::info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            "weather reported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_announce_sensors_under_weather_device() {
        let document = Weather.discovery().unwrap().unwrap();
        assert_eq!(
            document.topic("homeassistant"),
            "homeassistant/sensor/weather_device/config"
        );
        assert_eq!(document.components().count(), 2);
    }

    #[test]
    fn should_peak_at_noon() {
        assert!(WeatherReading::simulated(12).temperature > WeatherReading::simulated(0).temperature);
        assert_eq!(WeatherReading::simulated(12).humidity, 45);
        assert_eq!(WeatherReading::simulated(0).humidity, 69);
    }

    #[test]
    fn should_serialize_reading_with_snake_case_keys() {
        let json = serde_json::to_string(&WeatherReading {
            temperature: 21.5,
            humidity: 40,
        })
        .unwrap();
        assert_eq!(json, r#"{"temperature":21.5,"humidity":40}"#);
    }
}
