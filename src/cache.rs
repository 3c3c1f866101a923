use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// A cached payload together with the wall-clock time it was populated.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub fetched_at: DateTime<Utc>,
    /// Window a sub-metric with its own refresh policy was fetched for.
    pub auxiliary_window_tag: Option<String>,
}

impl<T> CacheEntry<T> {
    pub fn new(payload: T, auxiliary_window_tag: Option<String>) -> Self {
        Self {
            payload,
            fetched_at: Utc::now(),
            auxiliary_window_tag,
        }
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }

    /// Valid for reads while `now - fetched_at < ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Process-wide keyed store. Entries are never expired here: callers
/// compare `fetched_at` against their own TTL, and an expired entry stays
/// readable as a fallback.
pub struct TimedStore<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
}

impl<T: Clone + Send + Sync> TimedStore<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get an entry regardless of its age
    pub async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    /// Get an entry only while it is within the store TTL
    pub async fn get_fresh(&self, key: &str) -> Option<CacheEntry<T>> {
        self.get(key)
            .await
            .filter(|entry| entry.is_fresh(self.ttl))
    }

    /// Store an entry, overwriting any previous one
    pub async fn set(&self, key: &str, entry: CacheEntry<T>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
    }

    /// Update an existing entry in place, keeping its `fetched_at`
    pub async fn patch<F>(&self, key: &str, update: F) -> Option<CacheEntry<T>>
    where
        F: FnOnce(&mut CacheEntry<T>),
    {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(key)?;
        update(entry);
        Some(entry.clone())
    }

    /// Drop every entry
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T> std::fmt::Debug for TimedStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedStore")
            .field("ttl", &self.ttl)
            .finish()
    }
}
