//! Integration ports, the units of work user code plugs into the runtime.
//!
//! Every integration implements [`Integration`]. Its triggers are separate,
//! explicitly declared capabilities:
//!
//! - [`Scheduled`]: run on a cron schedule, optionally once on startup
//! - [`Subscribed`]: run on every message received on a topic
//!
//! An integration may implement either or both. Whether it publishes a
//! discovery document is decided by [`Integration::discovery`], independent
//! of its triggers.

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use hamqtt_domain::connection::InboundMessage;
use hamqtt_domain::discovery::DiscoveryDocument;
use hamqtt_domain::error::SchemaError;
use hamqtt_domain::time::Timestamp;

use crate::publisher::Publisher;

/// Base capability shared by every integration.
pub trait Integration: Send + Sync + 'static {
    /// Name used in logs and to detect duplicate registrations.
    ///
    /// Defaults to the implementing type's name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// The discovery document to publish on every connection, if any.
    ///
    /// Called once per connection cycle; build a fresh document each time.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the document cannot be built. The
    /// integration is then skipped for the current connection cycle.
    fn discovery(&self) -> Result<Option<DiscoveryDocument>, SchemaError> {
        Ok(None)
    }
}

/// Capability: run on a 5-field cron schedule.
#[async_trait]
pub trait Scheduled: Integration {
    /// `minute hour day-of-month month day-of-week`.
    fn cron_expression(&self) -> &str;

    /// Run once right after the discovery document was published.
    fn run_on_startup(&self) -> bool {
        false
    }

    /// One unit of work.
    async fn run(&self, ctx: &InvocationContext) -> anyhow::Result<()>;
}

/// Capability: run on every message received on a topic filter.
#[async_trait]
pub trait Subscribed: Integration {
    /// Topic filter; may contain `+` and `#` wildcards.
    fn topic(&self) -> &str;

    /// Handle one inbound message.
    async fn handle(&self, ctx: &InvocationContext, message: InboundMessage)
    -> anyhow::Result<()>;
}

/// Why an integration is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationCause {
    Startup,
    Schedule,
    Message,
}

impl fmt::Display for InvocationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::Schedule => f.write_str("schedule"),
            Self::Message => f.write_str("message"),
        }
    }
}

/// What an integration gets on each invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    publisher: Publisher,
    invocation_id: Uuid,
    cause: InvocationCause,
    fired_at: Timestamp,
}

impl InvocationContext {
    /// Create a context with a fresh invocation id.
    #[must_use]
    pub fn new(publisher: Publisher, cause: InvocationCause, fired_at: Timestamp) -> Self {
        Self {
            publisher,
            invocation_id: Uuid::new_v4(),
            cause,
            fired_at,
        }
    }

    /// Publisher bound to the shared connection.
    #[must_use]
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    #[must_use]
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    #[must_use]
    pub fn cause(&self) -> InvocationCause {
        self.cause
    }

    /// Scheduled fire time for ticks; dispatch time otherwise.
    #[must_use]
    pub fn fired_at(&self) -> Timestamp {
        self.fired_at
    }
}

/// `my_crate::weather::WeatherIntegration<T>` → `WeatherIntegration`.
fn short_type_name(full: &'static str) -> &'static str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
