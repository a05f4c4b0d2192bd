//! Mandate Core - recurring-payment authorization and reconciliation
//!
//! Stores customer payment methods encrypted at rest, drives debit-order
//! mandate requests through the gateway, reconciles their postbacks and
//! falls back to one-time Pay Now links when a scheduled debit fails.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;


pub use config::AppConfig;
pub use infrastructure::http::HttpServer;
pub use shared::error::{AppError, AppResult};

/// Application result type
pub type Result<T> = std::result::Result<T, shared::error::AppError>;
