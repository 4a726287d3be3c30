//! # hamqttd — hamqtt daemon
//!
//! Library half of the daemon: configuration and the built-in
//! integrations, shared by `main.rs` and the integration tests.

pub mod config;
pub mod integrations;
