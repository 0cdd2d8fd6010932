use super::{
    errors::{StateMachineError, StateMachineResult},
    events::DeploymentEvent,
    guards::{StateTransitionGuard, TransitionResult, IDEMPOTENT_UPDATE},
    persistence::{DeploymentStore, DeploymentTransition},
    states::DeploymentStatus,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deployment lifecycle driver: read current status, consult the guard, persist
pub struct DeploymentStateMachine<S: DeploymentStore> {
    store: Arc<S>,
}

impl<S: DeploymentStore> Clone for DeploymentStateMachine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DeploymentStore> DeploymentStateMachine<S> {
    /// Create a new deployment state machine over a store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the current status of a deployment
    pub async fn current_status(&self, deployment_id: &str) -> StateMachineResult<DeploymentStatus> {
        Ok(self.store.current_status(deployment_id).await?)
    }

    /// Apply a lifecycle event
    pub async fn apply_event(
        &self,
        deployment_id: &str,
        event: DeploymentEvent,
        correlation_id: Option<&str>,
    ) -> StateMachineResult<TransitionResult> {
        self.transition_inner(deployment_id, event.target_status(), &event, correlation_id)
            .await
    }

    /// Move a deployment to `to` if the lifecycle allows it.
    ///
    /// Same-state updates succeed with `IDEMPOTENT_UPDATE` and write no history, so
    /// re-delivered status notifications are harmless.
    pub async fn transition(
        &self,
        deployment_id: &str,
        to: DeploymentStatus,
        correlation_id: Option<&str>,
    ) -> StateMachineResult<TransitionResult> {
        let event = match to {
            DeploymentStatus::Queued => DeploymentEvent::Retry,
            DeploymentStatus::Submitted => DeploymentEvent::Submit,
            DeploymentStatus::Pending => DeploymentEvent::MarkPending,
            DeploymentStatus::Confirmed => DeploymentEvent::Confirm,
            DeploymentStatus::Indexed => DeploymentEvent::Index,
            DeploymentStatus::Completed => DeploymentEvent::Complete,
            DeploymentStatus::Failed => DeploymentEvent::Fail(String::new()),
            DeploymentStatus::Cancelled => DeploymentEvent::Cancel,
        };
        self.transition_inner(deployment_id, to, &event, correlation_id)
            .await
    }

    async fn transition_inner(
        &self,
        deployment_id: &str,
        to: DeploymentStatus,
        event: &DeploymentEvent,
        correlation_id: Option<&str>,
    ) -> StateMachineResult<TransitionResult> {
        let from = self.store.current_status(deployment_id).await?;
        let decision = StateTransitionGuard::validate_transition(from, to);

        if !decision.is_allowed {
            warn!(
                deployment_id = %deployment_id,
                from = %from,
                to = %to,
                reason_code = decision.reason_code,
                correlation_id = correlation_id,
                "Deployment transition denied"
            );
            return Err(StateMachineError::TransitionDenied {
                deployment_id: deployment_id.to_string(),
                from,
                to,
                reason_code: decision.reason_code,
            });
        }

        if decision.reason_code == IDEMPOTENT_UPDATE {
            debug!(
                deployment_id = %deployment_id,
                status = %to,
                correlation_id = correlation_id,
                "Idempotent status update, nothing persisted"
            );
            return Ok(decision);
        }

        self.store
            .append_transition(DeploymentTransition {
                deployment_id: deployment_id.to_string(),
                from_status: from,
                to_status: to,
                event: event.event_type().to_string(),
                error_code: event
                    .error_code()
                    .filter(|code| !code.is_empty())
                    .map(str::to_string),
                correlation_id: correlation_id.map(str::to_string),
                sort_key: 0,
                created_at: Utc::now(),
            })
            .await?;

        info!(
            deployment_id = %deployment_id,
            from = %from,
            to = %to,
            event = event.event_type(),
            correlation_id = correlation_id,
            "Deployment transitioned"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::errors::PersistenceError;
    use crate::state_machine::guards::{INVALID_TRANSITION, TERMINAL_STATE_VIOLATION, VALID_TRANSITION};
    use crate::state_machine::persistence::InMemoryDeploymentStore;

    async fn machine_with(status: DeploymentStatus) -> DeploymentStateMachine<InMemoryDeploymentStore> {
        let store = Arc::new(InMemoryDeploymentStore::new());
        store.create("dep-1", status).await.unwrap();
        DeploymentStateMachine::new(store)
    }

    #[tokio::test]
    async fn test_full_lifecycle_records_history() {
        let machine = machine_with(DeploymentStatus::Queued).await;

        for event in [
            DeploymentEvent::Submit,
            DeploymentEvent::MarkPending,
            DeploymentEvent::Confirm,
            DeploymentEvent::Index,
            DeploymentEvent::Complete,
        ] {
            let result = machine.apply_event("dep-1", event, Some("corr-1")).await.unwrap();
            assert_eq!(result.reason_code, VALID_TRANSITION);
        }

        let history = machine.store().history("dep-1").await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().unwrap().to_status, DeploymentStatus::Completed);
        assert!(history
            .iter()
            .all(|t| t.correlation_id.as_deref() == Some("corr-1")));
    }

    #[tokio::test]
    async fn test_idempotent_update_writes_nothing() {
        let machine = machine_with(DeploymentStatus::Pending).await;

        let result = machine
            .transition("dep-1", DeploymentStatus::Pending, None)
            .await
            .unwrap();

        assert_eq!(result.reason_code, IDEMPOTENT_UPDATE);
        assert!(machine.store().history("dep-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denied_transition_is_not_persisted() {
        let machine = machine_with(DeploymentStatus::Queued).await;

        let err = machine
            .transition("dep-1", DeploymentStatus::Completed, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StateMachineError::TransitionDenied {
                reason_code: INVALID_TRANSITION,
                ..
            }
        ));
        assert_eq!(
            machine.current_status("dep-1").await.unwrap(),
            DeploymentStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_terminal_deployment_cannot_be_requeued() {
        let machine = machine_with(DeploymentStatus::Cancelled).await;

        let err = machine
            .apply_event("dep-1", DeploymentEvent::Retry, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StateMachineError::TransitionDenied {
                reason_code: TERMINAL_STATE_VIOLATION,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failure_records_error_code_and_retry_path() {
        let machine = machine_with(DeploymentStatus::Submitted).await;

        machine
            .apply_event("dep-1", DeploymentEvent::Fail("NETWORK_ERROR".to_string()), None)
            .await
            .unwrap();
        machine
            .apply_event("dep-1", DeploymentEvent::Retry, None)
            .await
            .unwrap();

        let history = machine.store().history("dep-1").await.unwrap();
        assert_eq!(history[0].error_code.as_deref(), Some("NETWORK_ERROR"));
        assert_eq!(history[1].to_status, DeploymentStatus::Queued);
    }

    #[tokio::test]
    async fn test_unknown_deployment_surfaces_persistence_error() {
        let store = Arc::new(InMemoryDeploymentStore::new());
        let machine = DeploymentStateMachine::new(store);

        let err = machine
            .transition("missing", DeploymentStatus::Submitted, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StateMachineError::Persistence(PersistenceError::NotFound { .. })
        ));
    }
}
