//! Infrastructure adapters module
//!
//! This module contains adapters for external services and infrastructure concerns.

pub mod account_lock;
pub mod authentication;
pub mod encryption;
pub mod event_store;
pub mod netcash_gateway;
pub mod notifier;
pub mod repository;
pub mod webhook_verifier;

pub use account_lock::{AccountLock, AccountLockGuard};
pub use authentication::TokenAuthenticator;
pub use encryption::Encryptor;
pub use event_store::ProcessedEventStore;
pub use netcash_gateway::{LoadReport, LoadReportError, LoadReportResult, MandateGateway, NetcashGateway};
pub use notifier::{HttpNotifier, Notifier};
pub use repository::{BillingRepository, InMemoryBillingRepository, MandateTransition, OrderUpdate};
pub use webhook_verifier::{WebhookVerifier, SIGNATURE_HEADER};
