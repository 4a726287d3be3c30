//! [`Connection`] implementation backed by a rumqttc client.
//!
//! One background task drives the rumqttc event loop. It flips the
//! connection state on `ConnAck` and on poll errors, announces `online` on
//! the node's availability topic, re-issues subscriptions after every
//! reconnect and routes inbound publications to local subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, Outgoing, Packet, QoS};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use hamqtt_app::ports::Connection;
use hamqtt_domain::connection::{
    ConnectionEvent, ConnectionState, InboundMessage, OutboundMessage, Qos,
};
use hamqtt_domain::error::ConnectionError;

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::router::SubscriptionRouter;

/// Payload of the availability topic while the node is up.
pub const ONLINE: &str = "online";
/// Payload of the availability topic once the node is gone.
pub const OFFLINE: &str = "offline";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct Shared {
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    router: SubscriptionRouter,
    stopping: AtomicBool,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `next` and return the previous state.
    fn set_state(&self, next: ConnectionState) -> ConnectionState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *state, next)
    }

    fn emit(&self, event: ConnectionEvent) {
        // No receiver is not an error.
        let _ = self.events.send(event);
    }
}

/// A broker connection shared by the whole process.
pub struct MqttConnection {
    client: AsyncClient,
    shared: Arc<Shared>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    availability_topic: String,
}

impl MqttConnection {
    /// Validate `config`, create the client and start its event loop.
    ///
    /// Returns immediately; the connection is established in the background
    /// and announced with [`ConnectionEvent::Connected`].
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Config`] when `config` is incomplete.
    pub fn start(config: &MqttConfig) -> Result<Self, MqttError> {
        config.validate().map_err(MqttError::Config)?;

        let availability_topic = config.availability_topic();
        let mut options = rumqttc::MqttOptions::new(config.client_id(), &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        options.set_last_will(LastWill::new(
            &availability_topic,
            OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity.max(1));
        let (events, _) = broadcast::channel(16);
        let shared = Arc::new(Shared {
            state: Mutex::new(ConnectionState::Connecting),
            events,
            router: SubscriptionRouter::default(),
            stopping: AtomicBool::new(false),
        });

        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id(),
            "connecting to MQTT broker"
        );
        let handle = tokio::spawn(drive(
            event_loop,
            client.clone(),
            shared.clone(),
            availability_topic.clone(),
            Duration::from_secs(config.reconnect_delay_secs),
        ));

        Ok(Self {
            client,
            shared,
            event_loop: Mutex::new(Some(handle)),
            availability_topic,
        })
    }

    /// Announce `offline`, close the session and stop the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the goodbye could not be queued. The
    /// event loop is stopped either way.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.shared.stopping.store(true, Ordering::SeqCst);

        let goodbye = if self.shared.state() == ConnectionState::Connected {
            match self
                .client
                .publish(&self.availability_topic, QoS::AtLeastOnce, true, OFFLINE)
                .await
            {
                Ok(()) => self.client.disconnect().await.map_err(MqttError::Client),
                Err(err) => Err(MqttError::Client(err)),
            }
        } else {
            Ok(())
        };

        let handle = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = handle
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err()
        {
            handle.abort();
        }

        if self.shared.set_state(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            self.shared.emit(ConnectionEvent::Disconnected);
        }
        tracing::info!("disconnected from MQTT broker");
        goodbye
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        if let Some(handle) = self
            .event_loop
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[async_trait]
impl Connection for MqttConnection {
    fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), ConnectionError> {
        if self.shared.state() != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected);
        }
        if message.topic.is_empty() || !rumqttc::valid_topic(&message.topic) {
            return Err(ConnectionError::InvalidTopic(message.topic));
        }
        self.client
            .publish(
                message.topic,
                to_rumqttc_qos(message.qos),
                message.retain,
                message.payload,
            )
            .await
            .map_err(|err| MqttError::Client(err).into_domain())
    }

    async fn subscribe(
        &self,
        filter: &str,
    ) -> Result<mpsc::UnboundedReceiver<InboundMessage>, ConnectionError> {
        if !rumqttc::valid_filter(filter) {
            return Err(ConnectionError::InvalidTopic(filter.to_string()));
        }
        let receiver = self.shared.router.add(filter);
        // Otherwise issued by the event loop on the next ConnAck.
        if self.shared.state() == ConnectionState::Connected {
            self.client
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .map_err(|err| MqttError::Client(err).into_domain())?;
        }
        tracing::debug!(%filter, "subscribed");
        Ok(receiver)
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), ConnectionError> {
        self.shared.router.remove(filter);
        if self.shared.state() == ConnectionState::Connected {
            self.client
                .unsubscribe(filter)
                .await
                .map_err(|err| MqttError::Client(err).into_domain())?;
        }
        Ok(())
    }
}

fn to_rumqttc_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

async fn drive(
    mut event_loop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    availability_topic: String,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) if ack.code == ConnectReturnCode::Success => {
                on_connack(&client, &shared, &availability_topic);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                let delivered = shared.router.dispatch(&message);
                tracing::trace!(topic = %message.topic, delivered, "message received");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                shared.set_state(ConnectionState::Disconnected);
                shared.emit(ConnectionEvent::Disconnected);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                if shared.stopping.load(Ordering::SeqCst) {
                    return;
                }
                if shared.set_state(ConnectionState::Disconnected) == ConnectionState::Connected {
                    shared.emit(ConnectionEvent::Disconnected);
                }
                tracing::warn!(
                    error = %err,
                    retry_in_secs = reconnect_delay.as_secs(),
                    "MQTT connection failed"
                );
                tokio::time::sleep(reconnect_delay).await;
                shared.set_state(ConnectionState::Connecting);
            }
        }
    }
}

/// Runs inside the event loop, so nothing here may wait on the request
/// queue the loop itself drains.
fn on_connack(client: &AsyncClient, shared: &Shared, availability_topic: &str) {
    shared.set_state(ConnectionState::Connected);
    tracing::info!("MQTT connected");

    if let Err(err) = client.try_publish(availability_topic, QoS::AtLeastOnce, true, ONLINE) {
        tracing::warn!(error = %err, "failed to announce availability");
    }
    for filter in shared.router.filters() {
        if let Err(err) = client.try_subscribe(&filter, QoS::AtLeastOnce) {
            tracing::warn!(%filter, error = %err, "failed to restore subscription");
        }
    }

    shared.emit(ConnectionEvent::Connected);
}
