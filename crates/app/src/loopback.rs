//! In-process connection that needs no broker.
//!
//! Messages published while connected are recorded and delivered to every
//! local subscription whose filter matches, the way a broker echoes a
//! client's own publications back to it. Used for dry runs and tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use hamqtt_domain::connection::{ConnectionEvent, ConnectionState, InboundMessage, OutboundMessage};
use hamqtt_domain::error::ConnectionError;
use hamqtt_domain::topic;

use crate::ports::Connection;

/// Broker-less [`Connection`] living entirely in this process.
pub struct LoopbackConnection {
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    routes: Mutex<Vec<Route>>,
    published: Mutex<Vec<OutboundMessage>>,
}

struct Route {
    filter: String,
    sender: mpsc::UnboundedSender<InboundMessage>,
}

impl Default for LoopbackConnection {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            events,
            routes: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }
}

impl LoopbackConnection {
    /// A disconnected loopback connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to `Connected` and emit [`ConnectionEvent::Connected`].
    pub fn connect(&self) {
        self.transition(ConnectionState::Connected, ConnectionEvent::Connected);
    }

    /// Transition to `Disconnected` and emit [`ConnectionEvent::Disconnected`].
    pub fn disconnect(&self) {
        self.transition(ConnectionState::Disconnected, ConnectionEvent::Disconnected);
    }

    fn transition(&self, state: ConnectionState, event: ConnectionEvent) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        // Fails only when nobody listens, which is fine.
        let _ = self.events.send(event);
        tracing::debug!(%state, "loopback connection state changed");
    }

    /// Every message published so far, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the record of published messages.
    pub fn take_published(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.published.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Deliver `message` to matching subscriptions as if another client had
    /// published it. Returns the number of subscriptions reached.
    pub fn inject(&self, message: InboundMessage) -> usize {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        routes.retain(|route| {
            if !topic::matches(&route.filter, &message.topic) {
                return !route.sender.is_closed();
            }
            let open = route.sender.send(message.clone()).is_ok();
            delivered += usize::from(open);
            open
        });
        delivered
    }

    /// Filters with a live route.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|route| !route.sender.is_closed())
            .map(|route| route.filter.clone())
            .collect()
    }
}

#[async_trait]
impl Connection for LoopbackConnection {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), ConnectionError> {
        if self.state() != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected);
        }
        if !topic::is_valid_topic(&message.topic) {
            return Err(ConnectionError::InvalidTopic(message.topic));
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        self.inject(InboundMessage::new(message.topic, message.payload));
        Ok(())
    }

    async fn subscribe(
        &self,
        filter: &str,
    ) -> Result<mpsc::UnboundedReceiver<InboundMessage>, ConnectionError> {
        if !topic::is_valid_filter(filter) {
            return Err(ConnectionError::InvalidTopic(filter.to_string()));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|route| route.filter != filter && !route.sender.is_closed());
        routes.push(Route {
            filter: filter.to_string(),
            sender,
        });
        Ok(receiver)
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), ConnectionError> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|route| route.filter != filter);
        Ok(())
    }
}
