//! Per-account-reference lock (Redis-backed with memory fallback)
//!
//! Serialises every flow that creates gateway artifacts for the same
//! account reference, across instances when Redis is configured.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::shared::error::{AppError, AppResult};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct AccountLock {
    redis: Option<Arc<ConnectionManager>>,
    memory: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    ttl: Duration,
}

/// Proof of holding the lock for one account reference
pub struct AccountLockGuard {
    key: String,
    held: Held,
}

enum Held {
    Redis { token: String },
    Memory(OwnedMutexGuard<()>),
}

impl AccountLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl AccountLock {
    pub fn new(redis: Option<Arc<ConnectionManager>>, ttl_ms: u64) -> Self {
        Self {
            redis,
            memory: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    fn key(reference: &str) -> String {
        format!("mandate:lock:{}", reference)
    }

    /// Wait for the lock, giving up after one TTL
    pub async fn acquire(&self, reference: &str) -> AppResult<AccountLockGuard> {
        let key = Self::key(reference);

        if let Some(redis) = &self.redis {
            let token = hex::encode(rand::random::<[u8; 16]>());
            let deadline = Instant::now() + self.ttl;
            loop {
                let mut conn = (**redis).clone();
                let acquired: Option<String> = redis::cmd("SET")
                    .arg(&key)
                    .arg(&token)
                    .arg("NX")
                    .arg("PX")
                    .arg(self.ttl.as_millis() as u64)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| AppError::storage("redis lock", e))?;
                if acquired.is_some() {
                    debug!(key = %key, "Account lock acquired");
                    return Ok(AccountLockGuard {
                        key,
                        held: Held::Redis { token },
                    });
                }
                if Instant::now() >= deadline {
                    return Err(AppError::Storage(format!("account lock busy: {}", reference)));
                }
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }

        let slot = {
            let mut slots = self.memory.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };
        let guard = tokio::time::timeout(self.ttl, slot.lock_owned())
            .await
            .map_err(|_| AppError::Storage(format!("account lock busy: {}", reference)))?;
        debug!(key = %key, "Account lock acquired");
        Ok(AccountLockGuard {
            key,
            held: Held::Memory(guard),
        })
    }

    /// Release a held lock. A Redis lock that already expired is left alone.
    pub async fn release(&self, guard: AccountLockGuard) -> AppResult<()> {
        let AccountLockGuard { key, held } = guard;
        match held {
            Held::Redis { token } => {
                if let Some(redis) = &self.redis {
                    let mut conn = (**redis).clone();
                    let _: i64 = redis::Script::new(RELEASE_SCRIPT)
                        .key(&key)
                        .arg(&token)
                        .invoke_async(&mut conn)
                        .await
                        .map_err(|e| AppError::storage("redis unlock", e))?;
                }
            }
            Held::Memory(inner) => {
                drop(inner);
                let mut slots = self.memory.lock().await;
                if slots.get(&key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                    slots.remove(&key);
                }
            }
        }
        debug!(key = %key, "Account lock released");
        Ok(())
    }
}
