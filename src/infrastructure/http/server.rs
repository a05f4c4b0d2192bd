//! HTTP server implementation for reverse proxy deployment
//!
//! TLS and CORS are left to the proxy in front of the service. Gateway
//! webhooks must reach the service with their bodies unmodified.

use std::sync::Arc;

use tracing::{info, instrument};
use warp::Filter;

use crate::config::AppConfig;
use crate::infrastructure::adapters::{HttpNotifier, InMemoryBillingRepository, NetcashGateway};
use crate::infrastructure::bootstrap::{connect_redis, ServiceContainer};
use crate::infrastructure::http::routes::RouteBuilder;
use crate::shared::error::{AppError, AppResult};

/// HTTP server implementation optimized for reverse proxy deployment
pub struct HttpServer {
    config: AppConfig,
    services: ServiceContainer,
}

impl HttpServer {
    /// Wire the production adapters and build every service
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let redis = connect_redis(&config.redis).await;
        let repo = Arc::new(InMemoryBillingRepository::new());
        let gateway = Arc::new(NetcashGateway::new(Arc::new(config.netcash.clone()))?);
        let notifier = Arc::new(HttpNotifier::new(Arc::new(config.notifications.clone()))?);

        let services = ServiceContainer::build(&config, repo, gateway, notifier, redis)?;
        Ok(Self { config, services })
    }

    /// Build a server around already-wired services
    pub fn with_services(config: AppConfig, services: ServiceContainer) -> Self {
        Self { config, services }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    /// Run the HTTP server
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let addr: std::net::SocketAddr = self
            .config
            .server_address()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid server address: {}", e)))?;

        let routes = self.create_routes();

        info!("Starting HTTP server on {}", addr);
        warp::serve(routes).run(addr).await;

        Ok(())
    }

    fn create_routes(self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        RouteBuilder::build_routes(&self.config, self.services)
    }
}
