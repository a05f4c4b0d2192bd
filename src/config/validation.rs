//! Configuration validation module
//!
//! This module provides additional validation logic for configuration
//! beyond the basic validator crate validation.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::app_config::AuthConfig;
use crate::config::AppConfig;
use crate::shared::error::AppError;

/// Headroom the account lock keeps over the slowest gateway call
pub const LOCK_TTL_MARGIN_MS: u64 = 10_000;

/// Configuration validator for additional validation logic
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the complete configuration
    pub fn validate_config(config: &AppConfig) -> crate::Result<()> {
        Self::validate_gateway_url(&config.netcash.web_service_url)?;
        Self::validate_gateway_url(&config.netcash.paynow_url)?;
        Self::validate_encryption_key(&config.encryption.key)?;
        Self::validate_billing_days(&config.mandates.allowed_billing_days)?;
        Self::validate_lock_ttl(config.mandates.account_lock_ttl_ms, config.netcash.timeout_seconds)?;

        if config.auth.jwt_secret == AuthConfig::default().jwt_secret {
            if config.development_mode {
                tracing::warn!("Using the built-in JWT secret - development mode only");
            } else {
                return Err(AppError::Validation(
                    "auth.jwt_secret must be set outside development mode".to_string()
                ));
            }
        }

        if config.netcash.webhook_secret.is_empty() {
            if config.development_mode {
                tracing::warn!("Webhook secret is empty - postbacks are accepted unsigned in development mode");
            } else {
                return Err(AppError::Validation(
                    "netcash.webhook_secret is required outside development mode".to_string()
                ));
            }
        }

        Ok(())
    }

    /// Gateway URLs must be HTTPS unless they point at a local stub
    fn validate_gateway_url(url: &str) -> crate::Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "Gateway URL must start with http:// or https://".to_string()
            ));
        }

        if url.contains("localhost") || url.contains("127.0.0.1") {
            Ok(())
        } else if !url.starts_with("https://") {
            Err(AppError::Validation(
                "Production gateway URL must use HTTPS".to_string()
            ))
        } else {
            Ok(())
        }
    }

    /// The key must decode to exactly 32 bytes
    fn validate_encryption_key(key: &str) -> crate::Result<()> {
        let bytes = STANDARD
            .decode(key)
            .map_err(|_| AppError::Validation("Encryption key is not valid base64".to_string()))?;
        if bytes.len() != 32 {
            return Err(AppError::Validation(format!(
                "Encryption key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(())
    }

    /// The per-account lock is held across the gateway submit, so it must
    /// outlive the gateway timeout by at least `LOCK_TTL_MARGIN_MS`
    fn validate_lock_ttl(lock_ttl_ms: u64, gateway_timeout_seconds: u64) -> crate::Result<()> {
        let required = gateway_timeout_seconds * 1000 + LOCK_TTL_MARGIN_MS;
        if lock_ttl_ms < required {
            return Err(AppError::Validation(format!(
                "mandates.account_lock_ttl_ms must be at least {} for a {}s gateway timeout",
                required, gateway_timeout_seconds
            )));
        }
        Ok(())
    }

    fn validate_billing_days(days: &[u8]) -> crate::Result<()> {
        if let Some(day) = days.iter().find(|d| **d == 0 || **d > 31) {
            return Err(AppError::Validation(format!("Invalid billing day: {}", day)));
        }
        Ok(())
    }
}
