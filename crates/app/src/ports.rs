//! Port definitions: traits that adapters and integrations implement.
//!
//! Ports are the boundaries between the runtime and the outside world.
//! They are defined here (in `app`) so that both the runtime and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod connection;
pub mod integration;

pub use connection::Connection;
pub use integration::{InvocationCause, InvocationContext, Integration, Scheduled, Subscribed};
