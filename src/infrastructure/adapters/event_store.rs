//! Processed webhook event store
//!
//! Redis holds the claims when it is configured, with the TTL enforced by
//! Redis itself. Without Redis the claims live in process memory and expire
//! after the same TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::shared::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ProcessedEventStore {
    redis: Option<Arc<ConnectionManager>>,
    memory: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl ProcessedEventStore {
    pub fn new(redis: Option<Arc<ConnectionManager>>, ttl_seconds: u64) -> Self {
        Self::with_ttl(redis, Duration::from_secs(ttl_seconds))
    }

    pub fn with_ttl(redis: Option<Arc<ConnectionManager>>, ttl: Duration) -> Self {
        Self {
            redis,
            memory: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// `{kind}:{reference}:{status}`
    pub fn event_key(kind: &str, reference: &str, status: &str) -> String {
        format!("{}:{}:{}", kind, reference, status)
    }

    fn key(event: &str) -> String {
        format!("webhook:processed:{}", event)
    }

    /// Claim an event. Returns `false` when it was already claimed.
    pub async fn mark_processed(&self, event: &str) -> AppResult<bool> {
        if let Some(redis) = &self.redis {
            let mut conn = (**redis).clone();
            let claimed: Option<String> = redis::cmd("SET")
                .arg(Self::key(event))
                .arg(1u8)
                .arg("NX")
                .arg("EX")
                .arg(self.ttl.as_secs().max(1))
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::storage("redis set", e))?;
            return Ok(claimed.is_some());
        }

        let mut memory = self.memory.lock().await;
        let ttl = self.ttl;
        memory.retain(|_, claimed_at| claimed_at.elapsed() < ttl);
        if memory.contains_key(event) {
            return Ok(false);
        }
        memory.insert(event.to_string(), Instant::now());
        Ok(true)
    }

    /// Release a claim so a redelivery can retry after a failed apply
    pub async fn forget(&self, event: &str) -> AppResult<()> {
        if let Some(redis) = &self.redis {
            let mut conn = (**redis).clone();
            let _: i64 = redis::cmd("DEL")
                .arg(Self::key(event))
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::storage("redis del", e))?;
            return Ok(());
        }
        self.memory.lock().await.remove(event);
        Ok(())
    }

    pub async fn is_processed(&self, event: &str) -> AppResult<bool> {
        if let Some(redis) = &self.redis {
            let mut conn = (**redis).clone();
            let exists: bool = redis::cmd("EXISTS")
                .arg(Self::key(event))
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::storage("redis exists", e))?;
            return Ok(exists);
        }
        Ok(self
            .memory
            .lock()
            .await
            .get(event)
            .is_some_and(|claimed_at| claimed_at.elapsed() < self.ttl))
    }

    /// Claims currently held in process memory
    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }
}
