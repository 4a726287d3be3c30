//! # hamqtt-domain
//!
//! Pure domain model for the hamqtt integration runtime.
//!
//! ## Responsibilities
//! - Foundational types: error taxonomy, timestamps
//! - Describe **Discovery documents** (a device and the components it exposes
//!   to Home Assistant) independently of any transport
//! - Describe **Triggers** (cron schedules and topic subscriptions)
//! - Describe **Messages** and **Connection state** exchanged with a broker
//! - MQTT **topic filter** validation and matching
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod connection;
pub mod discovery;
pub mod schedule;
pub mod topic;
pub mod trigger;
