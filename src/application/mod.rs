//! Application layer - Use cases and application services
//!
//! This module contains the services that orchestrate domain logic for
//! payment methods, mandates, reconciliation and failed-collection fallback.

pub mod services;
pub mod use_cases;

pub use services::*;
pub use use_cases::*;
