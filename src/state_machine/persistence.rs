//! Deployment persistence boundary.
//!
//! The core only decides legality; the store is responsible for making a
//! read-then-write sequence atomic per deployment. `append_transition` therefore
//! carries the status the caller observed, and implementations must reject the write
//! when the record moved underneath it.

use super::errors::{PersistenceError, PersistenceResult};
use super::states::DeploymentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One entry of a deployment's status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTransition {
    pub deployment_id: String,
    pub from_status: DeploymentStatus,
    pub to_status: DeploymentStatus,
    pub event: String,
    pub error_code: Option<String>,
    pub correlation_id: Option<String>,
    pub sort_key: u32,
    pub created_at: DateTime<Utc>,
}

/// Trait for persisting deployment status changes
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Register a new deployment in its initial status
    async fn create(&self, deployment_id: &str, status: DeploymentStatus) -> PersistenceResult<()>;

    /// Resolve the current status of a deployment
    async fn current_status(&self, deployment_id: &str) -> PersistenceResult<DeploymentStatus>;

    /// Persist a transition if the record is still in `transition.from_status`
    async fn append_transition(&self, transition: DeploymentTransition) -> PersistenceResult<()>;

    /// Full status history in sort-key order
    async fn history(&self, deployment_id: &str) -> PersistenceResult<Vec<DeploymentTransition>>;
}

/// 1-based position of the next history entry
fn next_sort_key(deployment_id: &str, history_len: usize) -> PersistenceResult<u32> {
    history_len
        .checked_add(1)
        .and_then(|next| u32::try_from(next).ok())
        .ok_or_else(|| PersistenceError::HistoryFull {
            deployment_id: deployment_id.to_string(),
        })
}

#[derive(Debug, Clone)]
struct DeploymentRecord {
    status: DeploymentStatus,
    history: Vec<DeploymentTransition>,
}

/// In-process store; the DashMap shard lock makes check-and-append atomic per record
#[derive(Debug, Default)]
pub struct InMemoryDeploymentStore {
    records: DashMap<String, DeploymentRecord>,
}

impl InMemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DeploymentStore for InMemoryDeploymentStore {
    async fn create(&self, deployment_id: &str, status: DeploymentStatus) -> PersistenceResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.records.entry(deployment_id.to_string()) {
            Entry::Occupied(_) => Err(PersistenceError::AlreadyExists {
                deployment_id: deployment_id.to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(DeploymentRecord {
                    status,
                    history: Vec::new(),
                });
                debug!(deployment_id = %deployment_id, status = %status, "Deployment record created");
                Ok(())
            }
        }
    }

    async fn current_status(&self, deployment_id: &str) -> PersistenceResult<DeploymentStatus> {
        self.records
            .get(deployment_id)
            .map(|record| record.status)
            .ok_or_else(|| PersistenceError::NotFound {
                deployment_id: deployment_id.to_string(),
            })
    }

    async fn append_transition(&self, mut transition: DeploymentTransition) -> PersistenceResult<()> {
        let mut record = self
            .records
            .get_mut(&transition.deployment_id)
            .ok_or_else(|| PersistenceError::NotFound {
                deployment_id: transition.deployment_id.clone(),
            })?;

        if record.status != transition.from_status {
            return Err(PersistenceError::ConcurrentModification {
                deployment_id: transition.deployment_id.clone(),
                expected: transition.from_status,
                actual: record.status,
            });
        }

        transition.sort_key = next_sort_key(&transition.deployment_id, record.history.len())?;
        record.status = transition.to_status;
        record.history.push(transition);
        Ok(())
    }

    async fn history(&self, deployment_id: &str) -> PersistenceResult<Vec<DeploymentTransition>> {
        self.records
            .get(deployment_id)
            .map(|record| record.history.clone())
            .ok_or_else(|| PersistenceError::NotFound {
                deployment_id: deployment_id.to_string(),
            })
    }
}
