//! # Idempotency
//!
//! Deduplication of side-effecting calls keyed by a caller-supplied idempotency
//! key and a fingerprint of the request body.
//!
//! ## Usage
//!
//! ```rust
//! use issuance_core::idempotency::{IdempotencyGuard, IdempotencyError, InMemoryIdempotencyStore};
//! use issuance_core::IssuanceConfig;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let guard = IdempotencyGuard::new(
//!     Arc::new(InMemoryIdempotencyStore::new()),
//!     IssuanceConfig::default().idempotency,
//! );
//! let request = serde_json::json!({"symbol": "ACME", "supply": 1_000_000});
//!
//! let first = guard
//!     .execute(Some("req-1"), &request, || async { Ok::<_, IdempotencyError>(42) })
//!     .await?;
//! let again = guard
//!     .execute(Some("req-1"), &request, || async { Ok::<_, IdempotencyError>(7) })
//!     .await?;
//!
//! assert_eq!(again.response, first.response);
//! assert!(again.is_replay());
//! # Ok::<(), IdempotencyError>(())
//! # });
//! ```

pub mod errors;
pub mod fingerprint;
pub mod guard;
pub mod store;

pub use errors::{IdempotencyError, IdempotencyResult};
pub use fingerprint::{canonical_json, request_fingerprint};
pub use guard::{IdempotencyGuard, IdempotencyOutcome, IdempotentResponse};
pub use store::{
    spawn_purge_task, IdempotencyRecord, IdempotencyStore, InMemoryIdempotencyStore, KeyLease,
};
