//! # Bridge Cache Agent Library
//!
//! Authenticated access to a rate-limited cloud thermostat API, with one shared
//! cache of resource payloads refreshed on a fixed tick for all subscribers.
//!
//! Modules:
//! - `auth`: OAuth2 token model, store and token endpoint exchanges
//! - `gateway`: authenticated GET/POST with the 401 / transport retry state machine
//! - `cache`: shared resource cache and its subscribers
//! - `scheduler`: periodic refresh driver
//! - `resources`: vendor resource url catalogue
//! - `config`: YAML service configuration, loading and validation

pub mod auth;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod helpers;
pub mod observability;
pub mod resources;
pub mod scheduler;
pub mod server;
pub mod sinks;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::resource_cache::ResourceCache;
pub use crate::config::service::ServiceConfig;
pub use crate::gateway::error::{ApiError, ConnectionStatus};
pub use crate::gateway::http_gateway::HttpGateway;
