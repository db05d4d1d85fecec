//! Open Service Broker v2 surface.
//!
//! A second, independently-routed HTTP tree served from the same container
//! as the resource API. Provisioning a service instance creates a
//! `MobileApp` through the server's own loopback client; binding hands out
//! the app's credentials. Only the synchronous subset of the protocol is
//! implemented.

pub mod dto;
pub mod operations;
pub mod routes;

pub use operations::{BrokerOperations, OpsError};
pub use routes::router;

/// Default path prefix the broker tree is mounted under.
pub const BROKER_API_PREFIX: &str = "/broker";
