use crate::{domain::health::*, shared::error::AppResult};
use redis::aio::ConnectionManager;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Health check use case
pub struct HealthCheckUseCase {
    started: Instant,
    redis: Option<Arc<ConnectionManager>>,
}

impl HealthCheckUseCase {
    /// `redis` is `None` when locks and webhook dedupe run in process memory
    pub fn new(redis: Option<Arc<ConnectionManager>>) -> Self {
        Self {
            started: Instant::now(),
            redis,
        }
    }

    /// Execute health check, pinging Redis when it is configured
    pub async fn execute(&self) -> AppResult<HealthResponse> {
        let mut details = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "uptime": self.uptime(),
        });

        let status = match &self.redis {
            Some(redis) => {
                let mut conn = (**redis).clone();
                let ping: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match ping {
                    Ok(_) => {
                        details["coordination"] = json!({ "backend": "redis", "status": "connected" });
                        HealthStatus::Healthy
                    }
                    Err(e) => {
                        details["coordination"] = json!({
                            "backend": "redis",
                            "status": "disconnected",
                            "error": e.to_string(),
                        });
                        HealthStatus::Unhealthy
                    }
                }
            }
            None => {
                details["coordination"] = json!({ "backend": "memory", "status": "local" });
                details["warnings"] = json!([
                    "Account locks and webhook dedupe are process-local",
                    "Run a single instance or enable Redis"
                ]);
                HealthStatus::Degraded
            }
        };

        Ok(HealthResponse::new(status, details))
    }

    fn uptime(&self) -> String {
        let secs = self.started.elapsed().as_secs();
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        let minutes = (secs % 3600) / 60;
        format!("{}d {}h {}m", days, hours, minutes)
    }
}
