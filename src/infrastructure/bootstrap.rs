//! Service wiring shared by the HTTP server and the sweeper

use std::sync::Arc;

use redis::{aio::ConnectionManager, Client};
use tracing::{info, warn};

use crate::application::services::{
    FallbackEngine, MandateOrchestrator, MandateReconciler, PaymentMethodStore, WebhookIngress,
};
use crate::application::use_cases::HealthCheckUseCase;
use crate::config::app_config::{AppConfig, RedisConfig};
use crate::infrastructure::adapters::{
    AccountLock, BillingRepository, Encryptor, MandateGateway, Notifier, ProcessedEventStore, TokenAuthenticator,
    WebhookVerifier,
};
use crate::infrastructure::http::rate_limit::WebhookRateLimiter;
use crate::shared::error::{AppError, AppResult};
use crate::shared::metrics::MetricsUtils;

/// Every service the HTTP surface needs, built once
#[derive(Clone)]
pub struct ServiceContainer {
    pub store: Arc<PaymentMethodStore>,
    pub orchestrator: Arc<MandateOrchestrator>,
    pub reconciler: Arc<MandateReconciler>,
    pub fallback: Arc<FallbackEngine>,
    pub ingress: Arc<WebhookIngress>,
    pub health: Arc<HealthCheckUseCase>,
    pub metrics: MetricsUtils,
    pub authenticator: TokenAuthenticator,
    pub webhook_limiter: WebhookRateLimiter,
}

impl ServiceContainer {
    pub fn build(
        config: &AppConfig,
        repo: Arc<dyn BillingRepository>,
        gateway: Arc<dyn MandateGateway>,
        notifier: Arc<dyn Notifier>,
        redis: Option<Arc<ConnectionManager>>,
    ) -> AppResult<Self> {
        let metrics = MetricsUtils::new();
        let encryptor = Encryptor::from_base64_key(&config.encryption.key)?;
        let lock = AccountLock::new(redis.clone(), config.mandates.account_lock_ttl_ms);
        let events = ProcessedEventStore::new(redis.clone(), config.redis.dedupe_ttl_seconds);
        let verifier = WebhookVerifier::new(config.netcash.webhook_secret.as_bytes());
        if !verifier.is_enforced() {
            warn!("Webhook secret is empty, postback signatures are not checked");
        }

        let store = Arc::new(PaymentMethodStore::new(repo.clone(), encryptor));
        let orchestrator = Arc::new(MandateOrchestrator::new(
            Arc::new(config.mandates.clone()),
            repo.clone(),
            store.clone(),
            gateway.clone(),
            lock.clone(),
            metrics.clone(),
        ));
        let reconciler = Arc::new(MandateReconciler::new(repo.clone(), store.clone(), metrics.clone()));
        let fallback = Arc::new(FallbackEngine::new(
            repo,
            store.clone(),
            gateway,
            notifier,
            lock,
            metrics.clone(),
        ));
        let ingress = Arc::new(WebhookIngress::new(
            verifier,
            events,
            reconciler.clone(),
            fallback.clone(),
            metrics.clone(),
        ));
        let health = Arc::new(HealthCheckUseCase::new(redis));
        let authenticator = TokenAuthenticator::new(&config.auth);
        let webhook_limiter = WebhookRateLimiter::new(&config.rate_limit);

        Ok(Self {
            store,
            orchestrator,
            reconciler,
            fallback,
            ingress,
            health,
            metrics,
            authenticator,
            webhook_limiter,
        })
    }
}

/// Connect to Redis when enabled; fall back to process memory if it is unreachable
pub async fn connect_redis(config: &RedisConfig) -> Option<Arc<ConnectionManager>> {
    if !config.enabled {
        info!("Redis is disabled, using in-memory locks and webhook dedupe");
        return None;
    }
    match create_redis_manager(&config.url).await {
        Ok(manager) => {
            info!("Redis connection established");
            Some(Arc::new(manager))
        }
        Err(e) => {
            warn!("Failed to connect to Redis: {}. Using in-memory fallback only.", e);
            None
        }
    }
}

async fn create_redis_manager(redis_url: &str) -> AppResult<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

    ConnectionManager::new(client)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create Redis connection manager: {}", e)))
}
