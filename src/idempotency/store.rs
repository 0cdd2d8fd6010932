//! Short-lived storage for idempotency records.

use super::errors::IdempotencyResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Lifetime used when the requested one cannot be represented
const MAX_TTL_DAYS: i64 = 365;

/// Fingerprint bound to a key, plus the response once one succeeded.
///
/// A record is written when a key is first admitted, with no response, so the
/// key stays tied to its request body even if the operation fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub request_fingerprint: String,
    pub cached_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Record reserving `key` for `request_fingerprint` with no response yet
    pub fn reservation(
        key: impl Into<String>,
        request_fingerprint: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self::new(key, request_fingerprint, None, ttl)
    }

    pub fn new(
        key: impl Into<String>,
        request_fingerprint: impl Into<String>,
        cached_response: Option<Value>,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(MAX_TTL_DAYS));
        let expires_at = created_at
            .checked_add_signed(ttl)
            .unwrap_or_else(|| created_at + ChronoDuration::days(MAX_TTL_DAYS));
        Self {
            key: key.into(),
            request_fingerprint: request_fingerprint.into(),
            cached_response,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether no response has been cached under this record yet
    pub fn is_pending(&self) -> bool {
        self.cached_response.is_none()
    }
}

/// Exclusive hold on one idempotency key; released on drop
#[derive(Debug)]
pub struct KeyLease {
    _guard: OwnedMutexGuard<()>,
}

impl KeyLease {
    pub fn new(guard: OwnedMutexGuard<()>) -> Self {
        Self { _guard: guard }
    }
}

/// Backing store for the idempotency guard.
///
/// `get` must never return an expired record. `lock_key` serializes callers
/// sharing a key; callers with different keys must not contend.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Wait for exclusive use of `key`
    async fn lock_key(&self, key: &str) -> IdempotencyResult<KeyLease>;

    /// Live record for `key`, if any
    async fn get(&self, key: &str) -> IdempotencyResult<Option<IdempotencyRecord>>;

    /// Store `record` unless a live record already holds its key. Returns whether
    /// the record was written.
    async fn insert_if_absent(&self, record: IdempotencyRecord) -> IdempotencyResult<bool>;

    /// Store `record`, replacing any previous record for its key
    async fn put(&self, record: IdempotencyRecord) -> IdempotencyResult<()>;

    /// Drop the record for `key`. Returns whether one existed.
    async fn expire(&self, key: &str) -> IdempotencyResult<bool>;

    /// Remove every expired record. Returns how many were removed.
    async fn purge_expired(&self) -> IdempotencyResult<usize>;

    /// Number of stored records, expired ones included until purged
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn a background task calling `purge_expired` every `every`.
///
/// The task holds only a weak reference and exits once the store is dropped.
/// Abort the returned handle to stop it earlier.
pub fn spawn_purge_task<S>(store: &Arc<S>, every: Duration) -> JoinHandle<()>
where
    S: IdempotencyStore + 'static,
{
    let store = Arc::downgrade(store);
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                debug!("Idempotency store dropped, purge task exiting");
                break;
            };
            if let Err(e) = store.purge_expired().await {
                warn!(error = %e, "Idempotency purge failed");
            }
        }
    })
}

/// In-process store backed by `DashMap`, with one async mutex per key.
///
/// Expired records are evicted lazily by `get`; everything else stays until
/// `purge_expired` runs, so long-lived hosts should run [`spawn_purge_task`].
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: DashMap<String, IdempotencyRecord>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of key locks currently tracked
    pub fn lock_count(&self) -> usize {
        self.key_locks.len()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn lock_key(&self, key: &str) -> IdempotencyResult<KeyLease> {
        // Clone the Arc out so the shard lock is not held across the await
        let lock = self
            .key_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Ok(KeyLease::new(lock.lock_owned().await))
    }

    async fn get(&self, key: &str) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let now = Utc::now();
        let record = self.records.get(key).map(|entry| entry.value().clone());
        match record {
            Some(record) if record.is_expired_at(now) => {
                self.records
                    .remove_if(key, |_, stored| stored.is_expired_at(now));
                debug!(key = %key, "Evicted expired idempotency record");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn insert_if_absent(&self, record: IdempotencyRecord) -> IdempotencyResult<bool> {
        match self.records.entry(record.key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(record);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(true)
            }
        }
    }

    async fn put(&self, record: IdempotencyRecord) -> IdempotencyResult<()> {
        self.records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn expire(&self, key: &str) -> IdempotencyResult<bool> {
        Ok(self.records.remove(key).is_some())
    }

    async fn purge_expired(&self) -> IdempotencyResult<usize> {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired_at(now));
        let purged = before.saturating_sub(self.records.len());

        // A lock only referenced by the map has no holder or waiter
        self.key_locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        if purged > 0 {
            debug!(purged, remaining = self.records.len(), "Purged expired idempotency records");
        }
        Ok(purged)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(key: &str, ttl: Duration) -> IdempotencyRecord {
        IdempotencyRecord::new(key, "fp", Some(json!({"ok": true})), ttl)
    }

    fn expired(key: &str) -> IdempotencyRecord {
        let mut record = record(key, Duration::from_secs(60));
        record.expires_at = record.created_at - ChronoDuration::seconds(1);
        record
    }

    #[tokio::test]
    async fn test_get_hides_expired_records() {
        let store = InMemoryIdempotencyStore::new();
        store.put(expired("k1")).await.unwrap();
        store.put(record("k2", Duration::from_secs(60))).await.unwrap();

        assert!(store.get("k1").await.unwrap().is_none());
        assert!(store.get("k2").await.unwrap().is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = InMemoryIdempotencyStore::new();
        assert!(store.insert_if_absent(record("k", Duration::from_secs(60))).await.unwrap());
        assert!(!store.insert_if_absent(record("k", Duration::from_secs(60))).await.unwrap());

        store.put(expired("old")).await.unwrap();
        assert!(store.insert_if_absent(record("old", Duration::from_secs(60))).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_and_purge() {
        let store = InMemoryIdempotencyStore::new();
        store.put(record("live", Duration::from_secs(60))).await.unwrap();
        store.put(expired("stale-1")).await.unwrap();
        store.put(expired("stale-2")).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert_eq!(store.len(), 1);

        assert!(store.expire("live").await.unwrap());
        assert!(!store.expire("live").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_idle_locks_are_purged() {
        let store = InMemoryIdempotencyStore::new();
        {
            let _lease = store.lock_key("a").await.unwrap();
            let _other = store.lock_key("b").await.unwrap();
            assert_eq!(store.lock_count(), 2);
            store.purge_expired().await.unwrap();
            assert_eq!(store.lock_count(), 2);
        }
        store.purge_expired().await.unwrap();
        assert_eq!(store.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_purge_task_sweeps_and_stops_with_store() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        store.put(expired("stale")).await.unwrap();
        drop(store.lock_key("idle").await.unwrap());

        let handle = spawn_purge_task(&store, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(store.is_empty());
        assert_eq!(store.lock_count(), 0);

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("purge task should exit once the store is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn test_same_key_lock_is_exclusive() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let lease = store.lock_key("k").await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move { store.lock_key("k").await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(lease);
        contender.await.unwrap().unwrap();
    }
}
