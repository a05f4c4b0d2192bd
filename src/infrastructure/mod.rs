//! Infrastructure layer - External concerns and adapters
//!
//! This module contains the gateway, notification, storage and coordination
//! adapters, service wiring, and HTTP handling.

pub mod adapters;
pub mod bootstrap;
pub mod http;

pub use bootstrap::{connect_redis, ServiceContainer};
