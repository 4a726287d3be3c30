//! # hamqttd — hamqtt daemon
//!
//! Composition root that wires the broker connection, the trigger registry
//! and the built-in integrations together and runs them.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and validate it before any
//!   connection attempt
//! - Initialise `tracing` with the configured filter
//! - Register the integrations
//! - Connect to the broker, or to an in-process loopback in dry-run mode
//! - Hand connection events to the orchestrator
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no runtime logic belongs here.

use std::sync::Arc;

use hamqtt_adapter_mqtt::MqttConnection;
use hamqtt_app::loopback::LoopbackConnection;
use hamqtt_app::orchestrator::Orchestrator;
use hamqtt_app::trigger_registry::TriggerRegistry;
use hamqttd::config::Config;
use hamqttd::integrations;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(TriggerRegistry::new());
    integrations::register_all(&registry)?;

    if config.runtime.dry_run {
        tracing::info!(node_id = %config.mqtt.node_id, "dry run, no broker");
        let connection = Arc::new(LoopbackConnection::new());
        let orchestrator = Arc::new(Orchestrator::new(
            connection.clone(),
            registry,
            config.mqtt.discovery_prefix.as_str(),
        ));
        let runner = spawn_runner(orchestrator.clone());
        connection.connect();

        shutdown_signal().await;
        orchestrator.shutdown();
        runner.abort();
        for message in connection.take_published() {
            tracing::info!(
                topic = %message.topic,
                retain = message.retain,
                payload = %String::from_utf8_lossy(&message.payload),
                "would have published"
            );
        }
    } else {
        let connection = Arc::new(MqttConnection::start(&config.mqtt)?);
        let orchestrator = Arc::new(Orchestrator::new(
            connection.clone(),
            registry,
            config.mqtt.discovery_prefix.as_str(),
        ));
        let runner = spawn_runner(orchestrator.clone());

        shutdown_signal().await;
        orchestrator.shutdown();
        runner.abort();
        if let Err(err) = connection.disconnect().await {
            tracing::warn!(error = %err, "unclean disconnect");
        }
    }

    tracing::info!("hamqttd stopped");
    Ok(())
}

fn spawn_runner(orchestrator: Arc<Orchestrator>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { orchestrator.run().await })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
