//! In-memory store backend
//!
//! Entries expire lazily on read and eagerly through a background sweep task.
//! The sweep holds only a weak reference to the map, so dropping the last
//! `MemoryStore` handle stops the sweeper.

use crate::traits::{EntryStatus, KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    consumed: bool,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// TTL applied to markers created by `consume_if_unused` on absent keys.
    /// `None` keeps markers until explicitly deleted.
    pub marker_ttl: Option<Duration>,
    /// Interval between background sweeps of expired entries.
    pub sweep_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        MemoryStoreConfig {
            marker_ttl: None,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// In-memory key-value store with per-item expiration.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    config: MemoryStoreConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        let entries: Arc<RwLock<HashMap<String, Entry>>> = Arc::new(RwLock::new(HashMap::new()));

        if !config.sweep_interval.is_zero() {
            Self::spawn_sweeper(Arc::downgrade(&entries), config.sweep_interval);
        }

        MemoryStore { entries, config }
    }

    fn spawn_sweeper(entries: Weak<RwLock<HashMap<String, Entry>>>, sweep_interval: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let now = Instant::now();
                let mut map = entries.write().await;
                let before = map.len();
                map.retain(|_, entry| !entry.is_expired(now));
                let removed = before - map.len();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired store entries");
                }
            }
        });
    }

    /// Number of live entries, for tests and diagnostics.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let map = self.entries.read().await;
        map.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        let entry = Entry {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
            consumed: false,
        };
        let mut map = self.entries.write().await;
        map.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = Instant::now();
        let map = self.entries.read().await;
        Ok(map
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut map = self.entries.write().await;
        map.remove(key);
        Ok(())
    }

    async fn consume_if_unused(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let mut map = self.entries.write().await;

        let expired = map.get(key).is_some_and(|entry| entry.is_expired(now));
        if expired {
            map.remove(key);
        }

        match map.get_mut(key) {
            Some(entry) => {
                if entry.consumed {
                    Ok(false)
                } else {
                    entry.consumed = true;
                    Ok(true)
                }
            }
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Null,
                        expires_at: self.config.marker_ttl.map(|d| now + d),
                        consumed: true,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn status(&self, key: &str) -> StoreResult<Option<EntryStatus>> {
        let now = Instant::now();
        let map = self.entries.read().await;
        Ok(map
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| EntryStatus {
                consumed: entry.consumed,
            }))
    }
}
