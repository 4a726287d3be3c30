//! Reacts to connection edges.
//!
//! On every successful (re)connection it publishes each integration's
//! discovery document, arms its trigger and performs the run-on-startup
//! invocation, in registration order. Everything armed by a previous
//! connection is cancelled first.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use hamqtt_domain::connection::{ConnectionEvent, ConnectionState};

use crate::ports::Connection;
use crate::publisher::Publisher;
use crate::trigger_registry::TriggerRegistry;

/// What one connection cycle did, by integration name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationReport {
    /// Discovery document published.
    pub published: Vec<String>,
    /// Trigger armed.
    pub armed: Vec<String>,
    /// Run-on-startup invocation started.
    pub started: Vec<String>,
    /// Skipped for this cycle after a failure.
    pub skipped: Vec<String>,
}

/// Drives the trigger registry from the connection lifecycle.
pub struct Orchestrator {
    connection: Arc<dyn Connection>,
    registry: Arc<TriggerRegistry>,
    publisher: Publisher,
}

impl Orchestrator {
    pub fn new(
        connection: Arc<dyn Connection>,
        registry: Arc<TriggerRegistry>,
        discovery_prefix: impl Into<String>,
    ) -> Self {
        let publisher = Publisher::new(connection.clone(), discovery_prefix);
        Self {
            connection,
            registry,
            publisher,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TriggerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Announce and arm every registered integration.
    ///
    /// A failure to publish an integration's discovery document or to arm
    /// its trigger is logged and only that integration is skipped. The
    /// startup invocation is spawned once the document is out, so it can
    /// never precede it.
    #[tracing::instrument(skip(self))]
    pub async fn on_connected(&self) -> OrchestrationReport {
        self.registry.disarm_all();

        let mut report = OrchestrationReport::default();
        for registration in self.registry.entries() {
            let name = registration.name();

            match registration.integration().discovery() {
                Ok(Some(mut document)) => {
                    match self.publisher.publish_discovery_document(&mut document).await {
                        Ok(topic) => {
                            tracing::info!(integration = %name, %topic, "discovery document published");
                            report.published.push(name.to_string());
                        }
                        Err(err) => {
                            tracing::error!(integration = %name, error = %err, "failed to publish discovery document");
                            report.skipped.push(name.to_string());
                            continue;
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(integration = %name, error = %err, "invalid discovery document");
                    report.skipped.push(name.to_string());
                    continue;
                }
            }

            if let Err(err) = self.registry.arm(name, &self.publisher).await {
                tracing::error!(integration = %name, error = %err, "failed to arm trigger");
                report.skipped.push(name.to_string());
                continue;
            }
            report.armed.push(name.to_string());

            match self.registry.invoke_startup(name, &self.publisher) {
                Ok(Some(_)) => report.started.push(name.to_string()),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(integration = %name, error = %err, "startup invocation not started");
                }
            }
        }

        tracing::info!(
            published = report.published.len(),
            armed = report.armed.len(),
            skipped = report.skipped.len(),
            "connection cycle ready"
        );
        report
    }

    /// Follow connection events until the event stream closes.
    ///
    /// Also handles a connection that is already up when called.
    pub async fn run(&self) {
        let mut events = BroadcastStream::new(self.connection.events());
        if self.connection.state() == ConnectionState::Connected {
            self.on_connected().await;
        }

        while let Some(event) = events.next().await {
            match event {
                Ok(ConnectionEvent::Connected) => {
                    self.on_connected().await;
                }
                Ok(ConnectionEvent::Disconnected) => {
                    tracing::warn!("connection lost, waiting for reconnect");
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "connection events lagged");
                    if self.connection.state() == ConnectionState::Connected {
                        self.on_connected().await;
                    }
                }
            }
        }
        tracing::debug!("connection event stream closed");
    }

    /// Cancel every armed trigger. In-flight invocations are not awaited.
    pub fn shutdown(&self) {
        self.registry.disarm_all();
        tracing::info!("triggers disarmed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::loopback::LoopbackConnection;
    use crate::ports::{Integration, InvocationContext, Scheduled};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use hamqtt_domain::discovery::{ComponentDescriptor, Device, DiscoveryDocument};
    use hamqtt_domain::error::SchemaError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Weather {
        runs: AtomicUsize,
        run_on_startup: bool,
    }

    impl Weather {
        fn new(run_on_startup: bool) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                run_on_startup,
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl Integration for Weather {
        fn discovery(&self) -> Result<Option<DiscoveryDocument>, SchemaError> {
            let document = DiscoveryDocument::builder()
                .device(
                    Device::builder()
                        .name("Weather")
                        .identifier("weather_device")
                        .build()?,
                )
                .component(
                    "weather_temperature",
                    ComponentDescriptor::sensor()
                        .state_topic("weather/state")
                        .unit_of_measurement("°C"),
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
            self.run_on_startup
        }

        async fn run(&self, ctx: &InvocationContext) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ctx.publisher()
                .publish("weather/state", &serde_json::json!({ "temperature": 21.5 }))
                .await?;
            Ok(())
        }
    }

    struct Broken;

    impl Integration for Broken {
        fn discovery(&self) -> Result<Option<DiscoveryDocument>, SchemaError> {
            Err(SchemaError::NoComponents)
        }
    }

    #[async_trait]
    impl Scheduled for Broken {
        fn cron_expression(&self) -> &str {
            "*/5 * * * *"
        }

        async fn run(&self, _ctx: &InvocationContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Heartbeat;

    impl Integration for Heartbeat {}

    #[async_trait]
    impl Scheduled for Heartbeat {
        fn cron_expression(&self) -> &str {
            "*/15 * * * *"
        }

        async fn run(&self, _ctx: &InvocationContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (Arc<LoopbackConnection>, Arc<Orchestrator>) {
        let origin = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
        let registry = Arc::new(TriggerRegistry::with_clock(Arc::new(
            TokioClock::starting_at(origin),
        )));
        let connection = Arc::new(LoopbackConnection::new());
        let orchestrator = Arc::new(Orchestrator::new(
            connection.clone(),
            registry,
            "homeassistant",
        ));
        (connection, orchestrator)
    }

    fn topics(connection: &LoopbackConnection) -> Vec<String> {
        connection
            .published()
            .into_iter()
            .map(|message| message.topic)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_startup_invocation_after_discovery() {
        let (connection, orchestrator) = setup();
        let weather = Weather::new(true);
        orchestrator.registry().register_scheduled(weather.clone()).unwrap();
        connection.connect();

        let report = orchestrator.on_connected().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(report.published, vec!["Weather".to_string()]);
        assert_eq!(report.started, vec!["Weather".to_string()]);
        assert_eq!(weather.runs(), 1);
        assert_eq!(
            topics(&connection),
            vec![
                "homeassistant/sensor/weather_device/config".to_string(),
                "weather/state".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_publish_weather_discovery_then_report_hourly() {
        let (connection, orchestrator) = setup();
        let weather = Weather::new(true);
        orchestrator.registry().register_scheduled(weather.clone()).unwrap();
        connection.connect();

        orchestrator.on_connected().await;
        // 10:15 start, then 11:00, 12:00 and 13:00.
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;

        assert_eq!(weather.runs(), 4);
        let published = connection.published();
        assert!(published[0].retain);
        assert_eq!(published[0].topic, "homeassistant/sensor/weather_device/config");
        assert!(published[1..].iter().all(|m| m.topic == "weather/state"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_one_timer_across_reconnects() {
        let (connection, orchestrator) = setup();
        let weather = Weather::new(false);
        orchestrator.registry().register_scheduled(weather.clone()).unwrap();
        let runner = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.run().await }
        });
        tokio::task::yield_now().await;

        for _ in 0..3 {
            connection.connect();
            tokio::time::sleep(Duration::from_secs(1)).await;
            connection.disconnect();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        connection.connect();
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;

        assert_eq!(weather.runs(), 3);
        let discovery = topics(&connection)
            .into_iter()
            .filter(|topic| topic.ends_with("/config"))
            .count();
        assert_eq!(discovery, 4);
        runner.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn should_isolate_failing_integration() {
        let (connection, orchestrator) = setup();
        orchestrator.registry().register_scheduled(Arc::new(Broken)).unwrap();
        orchestrator.registry().register_scheduled(Weather::new(false)).unwrap();
        connection.connect();

        let report = orchestrator.on_connected().await;

        assert_eq!(report.skipped, vec!["Broken".to_string()]);
        assert_eq!(report.armed, vec!["Weather".to_string()]);
        assert!(!orchestrator.registry().is_armed("Broken"));
        assert!(orchestrator.registry().is_armed("Weather"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_arm_integration_without_discovery_document() {
        let (connection, orchestrator) = setup();
        orchestrator.registry().register_scheduled(Arc::new(Heartbeat)).unwrap();
        connection.connect();

        let report = orchestrator.on_connected().await;

        assert!(report.published.is_empty());
        assert_eq!(report.armed, vec!["Heartbeat".to_string()]);
        assert!(connection.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_everything_with_a_document_when_disconnected() {
        let (_connection, orchestrator) = setup();
        orchestrator.registry().register_scheduled(Weather::new(true)).unwrap();

        let report = orchestrator.on_connected().await;

        assert_eq!(report.skipped, vec!["Weather".to_string()]);
        assert!(report.started.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_disarm_on_shutdown() {
        let (connection, orchestrator) = setup();
        orchestrator.registry().register_scheduled(Arc::new(Heartbeat)).unwrap();
        connection.connect();
        orchestrator.on_connected().await;

        orchestrator.shutdown();

        assert!(!orchestrator.registry().is_armed("Heartbeat"));
    }
}
