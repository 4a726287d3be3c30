//! # hamqtt-app
//!
//! Application layer — **port definitions** (traits) and the runtime that
//! drives integrations.
//!
//! ## Responsibilities
//! - Define the **connection port** ([`ports::Connection`]) that broker
//!   adapters implement
//! - Define the **integration ports** ([`ports::Integration`],
//!   [`ports::Scheduled`], [`ports::Subscribed`]) that user code implements
//! - [`publisher::Publisher`]: serialise and deliver payloads and discovery
//!   documents over the active connection
//! - [`trigger_registry::TriggerRegistry`]: map integrations to their
//!   triggers and dispatch schedule ticks and inbound messages
//! - [`orchestrator::Orchestrator`]: on every connection, publish discovery
//!   documents and (re-)arm triggers
//! - Provide an **in-process connection** ([`loopback::LoopbackConnection`])
//!   that needs no broker
//!
//! ## Dependency rule
//! Depends on `hamqtt-domain` plus runtime crates (`tokio`, `tracing`,
//! `serde_json`). Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod clock;
pub mod loopback;
pub mod orchestrator;
pub mod ports;
pub mod publisher;
pub mod trigger_registry;
