//! # Idempotency Key Guard
//!
//! Request-scoped gate in front of a mutating operation. For a given key the
//! guard either runs the operation and caches its response, replays the cached
//! response without running anything, or rejects a reused key whose request
//! body changed.
//!
//! ```text
//! no key ──────────────────────────────────────────────────▶ run (Bypassed)
//! key ──▶ live record? ── no ──▶ lock, reserve fingerprint ──▶ run (Executed)
//!                     └── yes ─▶ same fingerprint? ── no ──▶ IDEMPOTENCY_KEY_MISMATCH
//!                                                  └─ yes ─▶ response cached? ── yes ─▶ replay (Replayed)
//!                                                                              └─ no ──▶ lock, run (Executed)
//! ```
//!
//! The fingerprint is reserved before the operation runs, so a key stays bound
//! to its request body until it expires, even when the operation fails. Only
//! successful responses are cached; a failed call may be retried with the same
//! body.
//!
//! Concurrent calls sharing a key are serialized by the store's per-key lock:
//! the first caller executes, later callers wake up to a cached record and
//! replay it.

use super::errors::{IdempotencyError, IdempotencyResult};
use super::fingerprint::request_fingerprint;
use super::store::{spawn_purge_task, IdempotencyRecord, IdempotencyStore, KeyLease};
use crate::config::IdempotencyConfig;
use crate::orchestration::OrchestrationResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// How a guarded response was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyOutcome {
    /// No key supplied (or guard disabled); executed without caching
    Bypassed,
    /// Cache miss; the operation ran
    Executed,
    /// Cache hit; the stored response was returned without running anything
    Replayed,
}

impl IdempotencyOutcome {
    /// Marker suitable for a response header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bypassed => "bypassed",
            Self::Executed => "miss",
            Self::Replayed => "hit",
        }
    }
}

impl fmt::Display for IdempotencyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response together with its idempotency outcome marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotentResponse<T> {
    pub response: T,
    pub outcome: IdempotencyOutcome,
}

impl<T> IdempotentResponse<T> {
    pub fn is_replay(&self) -> bool {
        self.outcome == IdempotencyOutcome::Replayed
    }

    pub fn into_inner(self) -> T {
        self.response
    }
}

/// Result of checking a key before execution
enum Admission<T> {
    Bypass,
    Replay(T),
    Proceed(Reservation),
}

/// Held while the guarded operation runs; dropping it releases the key lock
/// but leaves the fingerprint reservation in place
struct Reservation {
    storage_key: String,
    fingerprint: String,
    _lease: KeyLease,
}

/// Deduplicates side-effecting calls by idempotency key and request fingerprint
pub struct IdempotencyGuard<S: IdempotencyStore> {
    store: Arc<S>,
    config: IdempotencyConfig,
}

impl<S: IdempotencyStore> Clone for IdempotencyGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: IdempotencyStore> fmt::Debug for IdempotencyGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyGuard")
            .field("config", &self.config)
            .field("records", &self.store.len())
            .finish()
    }
}

impl<S: IdempotencyStore> IdempotencyGuard<S> {
    pub fn new(store: Arc<S>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Run `operation` under `key`. Only `Ok` responses are cached.
    ///
    /// Guard failures (key mismatch, serialization) convert into the caller's
    /// error type; the operation's own error passes through unchanged.
    pub async fn execute<Req, Resp, E, F, Fut>(
        &self,
        key: Option<&str>,
        request: &Req,
        operation: F,
    ) -> Result<IdempotentResponse<Resp>, E>
    where
        Req: Serialize + ?Sized,
        Resp: Serialize + DeserializeOwned,
        E: From<IdempotencyError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
    {
        match self.admit::<Req, Resp>(key, request).await? {
            Admission::Bypass => Ok(IdempotentResponse {
                response: operation().await?,
                outcome: IdempotencyOutcome::Bypassed,
            }),
            Admission::Replay(response) => Ok(IdempotentResponse {
                response,
                outcome: IdempotencyOutcome::Replayed,
            }),
            Admission::Proceed(reservation) => {
                let response = operation().await?;
                self.commit(reservation, &response).await;
                Ok(IdempotentResponse {
                    response,
                    outcome: IdempotencyOutcome::Executed,
                })
            }
        }
    }

    /// Run an orchestrated operation under `key`. Only successful
    /// [`OrchestrationResult`]s are cached; failures are returned but the key
    /// stays free for a retry.
    pub async fn execute_orchestrated<Req, T, F, Fut>(
        &self,
        key: Option<&str>,
        request: &Req,
        operation: F,
    ) -> IdempotencyResult<IdempotentResponse<OrchestrationResult<T>>>
    where
        Req: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OrchestrationResult<T>>,
    {
        match self.admit::<Req, OrchestrationResult<T>>(key, request).await? {
            Admission::Bypass => Ok(IdempotentResponse {
                response: operation().await,
                outcome: IdempotencyOutcome::Bypassed,
            }),
            Admission::Replay(response) => Ok(IdempotentResponse {
                response,
                outcome: IdempotencyOutcome::Replayed,
            }),
            Admission::Proceed(reservation) => {
                let response = operation().await;
                if response.success {
                    self.commit(reservation, &response).await;
                } else {
                    debug!(
                        key = %reservation.storage_key,
                        correlation_id = %response.correlation_id,
                        "Failed orchestration result not cached"
                    );
                }
                Ok(IdempotentResponse {
                    response,
                    outcome: IdempotencyOutcome::Executed,
                })
            }
        }
    }

    /// Namespaced key used in the store
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Background sweep of expired records, every `purge_interval_seconds`
    pub fn spawn_purge_task(&self) -> JoinHandle<()>
    where
        S: 'static,
    {
        spawn_purge_task(&self.store, self.config.purge_interval())
    }

    async fn admit<Req, Resp>(
        &self,
        key: Option<&str>,
        request: &Req,
    ) -> IdempotencyResult<Admission<Resp>>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let Some(key) = key.filter(|k| !k.trim().is_empty()) else {
            return Ok(Admission::Bypass);
        };
        if !self.config.enabled {
            return Ok(Admission::Bypass);
        }

        let storage_key = self.storage_key(key);
        let fingerprint = request_fingerprint(request)?;

        // Fast path: mismatches and cached responses need no lock
        if let Some(record) = self.store.get(&storage_key).await? {
            if let Some(response) = self.resolve_existing(key, &fingerprint, record)? {
                return Ok(Admission::Replay(response));
            }
        }

        let lease = self.store.lock_key(&storage_key).await?;

        // Another caller may have finished while we waited for the lock
        let existing = match self.store.get(&storage_key).await? {
            Some(record) => Some(record),
            None => self.reserve(&storage_key, &fingerprint).await?,
        };
        if let Some(record) = existing {
            if let Some(response) = self.resolve_existing(key, &fingerprint, record)? {
                return Ok(Admission::Replay(response));
            }
        }

        debug!(key = %storage_key, "Idempotency cache miss");
        Ok(Admission::Proceed(Reservation {
            storage_key,
            fingerprint,
            _lease: lease,
        }))
    }

    /// Bind `storage_key` to `fingerprint`. Returns the record that won instead
    /// when one appeared without taking the key lock.
    async fn reserve(
        &self,
        storage_key: &str,
        fingerprint: &str,
    ) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let reservation =
            IdempotencyRecord::reservation(storage_key, fingerprint, self.config.expiration());
        if self.store.insert_if_absent(reservation).await? {
            debug!(key = %storage_key, "Idempotency key reserved");
            Ok(None)
        } else {
            self.store.get(storage_key).await
        }
    }

    /// `Err` on a fingerprint mismatch, `Some` when a response can be replayed,
    /// `None` when the key is reserved for this body but nothing is cached yet
    fn resolve_existing<Resp: DeserializeOwned>(
        &self,
        key: &str,
        fingerprint: &str,
        record: IdempotencyRecord,
    ) -> IdempotencyResult<Option<Resp>> {
        if record.request_fingerprint != fingerprint {
            warn!(
                key = %record.key,
                "Idempotency key reused with a different request body"
            );
            return Err(IdempotencyError::KeyMismatch {
                key: key.to_string(),
            });
        }

        let Some(cached_response) = record.cached_response else {
            return Ok(None);
        };
        debug!(key = %record.key, "Idempotency cache hit");
        let response = serde_json::from_value(cached_response)
            .map_err(|e| IdempotencyError::serialization("cached response", e))?;
        Ok(Some(response))
    }

    /// Cache a successful response over the reservation. The key lease is
    /// still held, so no other caller can write this key concurrently. Failing
    /// to cache only weakens later deduplication, so it is logged rather than
    /// returned.
    async fn commit<Resp: Serialize>(&self, reservation: Reservation, response: &Resp) {
        let cached_response = match serde_json::to_value(response) {
            Ok(value) => value,
            Err(e) => {
                error!(key = %reservation.storage_key, error = %e, "Response could not be cached");
                return;
            }
        };

        let record = IdempotencyRecord::new(
            reservation.storage_key.clone(),
            reservation.fingerprint.clone(),
            Some(cached_response),
            self.config.expiration(),
        );

        match self.store.put(record).await {
            Ok(()) => debug!(key = %reservation.storage_key, "Idempotency record stored"),
            Err(e) => error!(
                key = %reservation.storage_key,
                error = %e,
                "Idempotency store rejected record"
            ),
        }
    }
}
