//! Door contact driven by commands on `door/command`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use hamqtt_app::ports::{Integration, InvocationContext, Subscribed};
use hamqtt_domain::connection::InboundMessage;
use hamqtt_domain::discovery::{ComponentDescriptor, Device, DiscoveryDocument};
use hamqtt_domain::error::SchemaError;

pub const COMMAND_TOPIC: &str = "door/command";
pub const STATE_TOPIC: &str = "door/state";
pub const DEVICE_IDENTIFIER: &str = "door_sensor";

const OPEN: &str = "open";
const CLOSED: &str = "closed";

/// Accepts `open`, `close` and `toggle` (case-insensitive) and publishes
/// the resulting state.
#[derive(Debug, Default)]
pub struct DoorSensor {
    open: AtomicBool,
}

impl DoorSensor {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Integration for DoorSensor {
    fn name(&self) -> &str {
        "DoorSensor"
    }

    fn discovery(&self) -> Result<Option<DiscoveryDocument>, SchemaError> {
        let device = Device::builder()
            .name("Door Sensor")
            .identifier(DEVICE_IDENTIFIER)
            .manufacturer("hamqtt")
            .build()?;
        let document = DiscoveryDocument::builder()
            .device(device)
            .component(
                "door_contact",
                ComponentDescriptor::binary_sensor()
                    .name("Door")
                    .device_class("door")
                    .state_topic(STATE_TOPIC)
                    .option("payload_on", OPEN)
                    .option("payload_off", CLOSED),
            )
            .component(
                "door_toggle",
                ComponentDescriptor::button()
                    .name("Toggle door")
                    .command_topic(COMMAND_TOPIC)
                    .option("payload_press", "toggle"),
            )
            .build()?;
        Ok(Some(document))
    }
}

#[async_trait]
impl Subscribed for DoorSensor {
    fn topic(&self) -> &str {
        COMMAND_TOPIC
    }

    async fn handle(&self, ctx: &InvocationContext, message: InboundMessage) -> anyhow::Result<()> {
        let command = message
            .payload_str()
            .map(str::trim)
            .ok_or_else(|| anyhow::anyhow!("door command is not UTF-8"))?;
        let open = match command.to_ascii_lowercase().as_str() {
            "open" => true,
            "close" | "closed" => false,
            "toggle" => !self.is_open(),
            other => anyhow::bail!("unknown door command {other:?}"),
        };
        self.open.store(open, Ordering::SeqCst);

        let state = if open { OPEN } else { CLOSED };
        ctx.publisher().publish_text(STATE_TOPIC, state).await?;
        tracing::info!(%state, "door state changed");
        Ok(())
    }
}
