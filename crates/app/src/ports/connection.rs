//! The broker link the runtime publishes and subscribes through.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use hamqtt_domain::connection::{ConnectionEvent, ConnectionState, InboundMessage, OutboundMessage};
use hamqtt_domain::error::ConnectionError;

/// A shared, process-wide broker connection.
///
/// Implementations must be safe to publish on from many tasks at once and
/// must serialise sends themselves; callers never coordinate.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Subscribe to connection edges. [`ConnectionEvent::Connected`] is sent
    /// on every successful (re)connection.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Hand a message to the transport. Returns once the transport has
    /// accepted it, not once subscribers received it.
    async fn publish(&self, message: OutboundMessage) -> Result<(), ConnectionError>;

    /// Route messages matching `filter` to the returned receiver.
    ///
    /// The queue is unbounded: a message accepted from the broker is never
    /// dropped because its subscriber is busy. Subscribing again with the
    /// same filter replaces the previous route.
    async fn subscribe(
        &self,
        filter: &str,
    ) -> Result<mpsc::UnboundedReceiver<InboundMessage>, ConnectionError>;

    /// Drop the route for `filter` and stop receiving it from the broker.
    async fn unsubscribe(&self, filter: &str) -> Result<(), ConnectionError>;
}
