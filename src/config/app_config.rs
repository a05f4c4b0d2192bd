//! Application configuration structures
//!
//! This module contains the main configuration structures for the application.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use validator::Validate;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server address to bind to
    pub bind_address: IpAddr,

    /// Server port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Maximum request size in bytes
    #[validate(range(min = 1024, max = 10485760))] // 1KB to 10MB
    pub max_request_size: usize,
}

/// Payment detail encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte AES-256-GCM key
    #[validate(length(min = 43))]
    pub key: String,
}

/// NetCash gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetcashConfig {
    /// NIWS web service URL used for batch uploads
    #[validate(url)]
    pub web_service_url: String,

    /// Debit order service key
    pub debit_order_service_key: String,

    /// Software vendor key sent in batch headers
    pub software_vendor_key: String,

    /// Hosted Pay Now page
    #[validate(url)]
    pub paynow_url: String,

    /// Pay Now service key (m1)
    pub paynow_service_key: String,

    /// PCI vault key (m2)
    pub pci_vault_key: String,

    /// Where the customer lands after paying
    #[validate(url)]
    pub return_url: String,

    /// Where the customer lands after cancelling
    #[validate(url)]
    pub cancel_url: String,

    /// Outbound request budget in seconds
    #[validate(range(min = 1, max = 120))]
    pub timeout_seconds: u64,

    /// Shared secret for postback signatures
    pub webhook_secret: String,
}

/// Mandate lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MandateConfig {
    /// Days the customer has to sign before the request expires
    #[validate(range(min = 1, max = 60))]
    pub signing_window_days: i64,

    /// Debit days the business accepts; anything else falls back to the 1st
    #[validate(length(min = 1))]
    pub allowed_billing_days: Vec<u8>,

    /// Base for customer-facing signing links
    #[validate(url)]
    pub signing_url_base: String,

    /// Sweep interval for the expiry job, in seconds
    #[validate(range(min = 10, max = 86400))]
    pub sweep_interval_seconds: u64,

    /// How long a per-account lock may be held, in milliseconds
    #[validate(range(min = 1000, max = 300000))]
    pub account_lock_ttl_ms: u64,
}

/// Notification provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationConfig {
    /// Transactional email API endpoint
    #[validate(url)]
    pub email_api_url: String,

    /// Email API key
    pub email_api_key: String,

    /// Sender address
    #[validate(email)]
    pub email_from: String,

    /// SMS API endpoint
    #[validate(url)]
    pub sms_api_url: String,

    /// SMS API key
    pub sms_api_key: String,

    /// Request budget per channel, in seconds
    #[validate(range(min = 1, max = 60))]
    pub timeout_seconds: u64,
}

/// Redis configuration for locks and webhook dedupe
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedisConfig {
    /// Use Redis; when false both concerns fall back to process memory
    pub enabled: bool,

    /// Redis connection URL
    #[validate(url)]
    pub url: String,

    /// How long processed webhook keys are remembered, in seconds
    #[validate(range(min = 60, max = 2592000))]
    pub dedupe_ttl_seconds: u64,
}

/// Bearer token configuration for customer and service callers
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the customer portal
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Expected `iss` claim
    #[validate(length(min = 1))]
    pub issuer: String,

    /// Expected `aud` claim
    #[validate(length(min = 1))]
    pub audience: String,

    /// Lifetime of tokens minted for internal jobs, in seconds
    #[validate(range(min = 60, max = 86400))]
    pub service_token_ttl_seconds: u64,
}

/// Per-client rate limiting on the public webhook endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,

    /// Sustained requests per minute per client address
    #[validate(range(min = 1, max = 100000))]
    pub webhook_requests_per_minute: u32,

    /// Burst allowance per client address
    #[validate(range(min = 1, max = 10000))]
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[validate(length(min = 1))]
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Encryption configuration
    pub encryption: EncryptionConfig,

    /// Gateway configuration
    pub netcash: NetcashConfig,

    /// Mandate configuration
    pub mandates: MandateConfig,

    /// Notification configuration
    pub notifications: NotificationConfig,

    /// Redis configuration
    pub redis: RedisConfig,

    /// Caller authentication
    pub auth: AuthConfig,

    /// Webhook rate limiting
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Development mode - permits an empty webhook secret
    pub development_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            max_request_size: 64 * 1024,
        }
    }
}

impl Default for NetcashConfig {
    fn default() -> Self {
        Self {
            web_service_url: "https://ws.netcash.co.za/NIWS/niws_nif.svc".to_string(),
            debit_order_service_key: String::new(),
            software_vendor_key: "24ade73c-98cf-47b3-99be-cc7b867b3080".to_string(),
            paynow_url: "https://paynow.netcash.co.za/site/paynow.aspx".to_string(),
            paynow_service_key: String::new(),
            pci_vault_key: String::new(),
            return_url: "http://localhost:3000/payment/success".to_string(),
            cancel_url: "http://localhost:3000/payment/cancelled".to_string(),
            timeout_seconds: 30,
            webhook_secret: String::new(),
        }
    }
}

impl Default for MandateConfig {
    fn default() -> Self {
        Self {
            signing_window_days: 7,
            allowed_billing_days: vec![1, 5, 25, 30],
            signing_url_base: "http://localhost:3000".to_string(),
            sweep_interval_seconds: 900,
            account_lock_ttl_ms: 45_000,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email_api_url: "https://api.resend.com/emails".to_string(),
            email_api_key: String::new(),
            email_from: "billing@example.com".to_string(),
            sms_api_url: "https://platform.clickatell.com/messages".to_string(),
            sms_api_key: String::new(),
            timeout_seconds: 10,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://127.0.0.1:6379".to_string(),
            dedupe_ttl_seconds: 7 * 24 * 3600,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "development-only-jwt-secret-change-me-0000".to_string(),
            issuer: "customer-portal".to_string(),
            audience: "mandate-core".to_string(),
            service_token_ttl_seconds: 300,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_requests_per_minute: 100,
            burst_size: 20,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            encryption: EncryptionConfig {
                // 32 zero bytes; replace in any real deployment
                key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string(),
            },
            netcash: NetcashConfig::default(),
            mandates: MandateConfig::default(),
            notifications: NotificationConfig::default(),
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
            development_mode: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> crate::Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to seed defaults: {}", e)))?;

        let config = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("Conf").required(false))
            .add_source(
                config::Environment::with_prefix("MANDATE_CORE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("mandates.allowed_billing_days")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config.try_deserialize()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate_config()
            .map_err(|e| crate::shared::error::AppError::Validation(format!("Configuration validation failed: {}", e)))?;

        crate::config::ConfigValidator::validate_config(&config)?;

        Ok(config)
    }

    /// Validate every section
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.encryption.validate()?;
        self.netcash.validate()?;
        self.mandates.validate()?;
        self.notifications.validate()?;
        self.redis.validate()?;
        self.auth.validate()?;
        self.rate_limit.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
