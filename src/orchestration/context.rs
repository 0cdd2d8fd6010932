//! # Orchestration Context
//!
//! Immutable per-invocation record carried through every pipeline stage.

use crate::constants::system;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Identity of one orchestrated call. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationContext {
    operation_type: String,
    correlation_id: String,
    idempotency_key: Option<String>,
    user_id: Option<String>,
    initiated_at: DateTime<Utc>,
}

impl OrchestrationContext {
    pub fn builder(operation_type: impl Into<String>) -> OrchestrationContextBuilder {
        OrchestrationContextBuilder::new(operation_type)
    }

    pub fn operation_type(&self) -> &str {
        &self.operation_type
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn initiated_at(&self) -> DateTime<Utc> {
        self.initiated_at
    }
}

/// Builder normalizing caller input into an [`OrchestrationContext`]
///
/// Blank operation types fall back to a default token, blank correlation ids
/// are replaced by a fresh UUID v4, and blank optional fields become `None`.
#[derive(Debug, Clone)]
pub struct OrchestrationContextBuilder {
    operation_type: String,
    correlation_id: Option<String>,
    idempotency_key: Option<String>,
    user_id: Option<String>,
    default_operation_type: String,
}

impl OrchestrationContextBuilder {
    pub fn new(operation_type: impl Into<String>) -> Self {
        Self {
            operation_type: operation_type.into(),
            correlation_id: None,
            idempotency_key: None,
            user_id: None,
            default_operation_type: system::UNSPECIFIED_OPERATION.to_string(),
        }
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn idempotency_key(mut self, idempotency_key: impl Into<String>) -> Self {
        self.idempotency_key = Some(idempotency_key.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Token substituted for a blank operation type
    pub fn default_operation_type(mut self, default_operation_type: impl Into<String>) -> Self {
        self.default_operation_type = default_operation_type.into();
        self
    }

    pub fn build(self) -> OrchestrationContext {
        let correlation_id = non_blank(self.correlation_id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let operation_type = if self.operation_type.trim().is_empty() {
            warn!(
                correlation_id = %correlation_id,
                fallback = %self.default_operation_type,
                "Orchestration context built without an operation type"
            );
            self.default_operation_type
        } else {
            self.operation_type
        };

        OrchestrationContext {
            operation_type,
            correlation_id,
            idempotency_key: non_blank(self.idempotency_key),
            user_id: non_blank(self.user_id),
            initiated_at: Utc::now(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
